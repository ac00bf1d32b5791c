use crate::{
    db::DbPool,
    entities::{
        audit_log::{self, AuditAction, AuditEntityType, Entity as AuditLogEntity},
        user::{self, Entity as UserEntity, UserRole},
    },
    errors::ServiceError,
    services::{features::FeatureFlags, Page, PageRequest},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<AuditEntityType>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub log: audit_log::Model,
    pub user: Option<AuditUser>,
}

/// A single mutation to record.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub changed_fields: Option<Value>,
    pub user_id: Option<Uuid>,
}

/// Append-only audit trail
#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
    features: FeatureFlags,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>, features: FeatureFlags) -> Self {
        Self { db_pool, features }
    }

    /// Best-effort write; failures are logged and never surface to the caller.
    #[instrument(skip(self, record), fields(entity_type = %record.entity_type, entity_id = %record.entity_id, action = %record.action))]
    pub async fn record(&self, record: AuditRecord) {
        if !self.features.snapshot().await.enable_audit_logs {
            debug!("Audit logging disabled; skipping entry");
            return;
        }

        let entry = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            entity_type: Set(record.entity_type),
            entity_id: Set(record.entity_id),
            action: Set(record.action),
            changed_fields: Set(record.changed_fields),
            user_id: Set(record.user_id),
            timestamp: Set(Utc::now()),
        };
        if let Err(e) = entry.insert(&*self.db_pool).await {
            warn!(error = %e, "Failed to write audit log entry");
        }
    }

    async fn with_users(
        &self,
        logs: Vec<audit_log::Model>,
    ) -> Result<Vec<AuditEntry>, ServiceError> {
        let user_ids: Vec<Uuid> = logs.iter().filter_map(|l| l.user_id).collect();
        let users: HashMap<Uuid, AuditUser> = UserEntity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|u| {
                (
                    u.id,
                    AuditUser {
                        id: u.id,
                        name: u.name,
                        email: u.email,
                        role: u.role,
                    },
                )
            })
            .collect();

        Ok(logs
            .into_iter()
            .map(|log| AuditEntry {
                user: log.user_id.and_then(|id| users.get(&id).cloned()),
                log,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: AuditFilter,
        paging: PageRequest,
    ) -> Result<Page<AuditEntry>, ServiceError> {
        let mut query = AuditLogEntity::find();
        if let Some(entity_type) = filter.entity_type {
            query = query.filter(audit_log::Column::EntityType.eq(entity_type));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(audit_log::Column::UserId.eq(user_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(audit_log::Column::Timestamp.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(audit_log::Column::Timestamp.lte(to));
        }

        let paginator = query
            .order_by_desc(audit_log::Column::Timestamp)
            .paginate(&*self.db_pool, paging.limit);
        let total = paginator.num_items().await?;
        let logs = paginator.fetch_page(paging.index()).await?;
        let entries = self.with_users(logs).await?;
        Ok(Page::new(entries, total, paging.page, paging.limit))
    }

    #[instrument(skip(self))]
    pub async fn for_entity(
        &self,
        entity_type: AuditEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditEntry>, ServiceError> {
        let logs = AuditLogEntity::find()
            .filter(audit_log::Column::EntityType.eq(entity_type))
            .filter(audit_log::Column::EntityId.eq(entity_id))
            .order_by_desc(audit_log::Column::Timestamp)
            .all(&*self.db_pool)
            .await?;
        self.with_users(logs).await
    }
}

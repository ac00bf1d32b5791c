use crate::{
    entities::audit_log::AuditEntityType,
    errors::ServiceError,
    services::{
        audit::{AuditEntry, AuditFilter},
        PageRequest,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditListQuery {
    pub entity_type: Option<AuditEntityType>,
    pub user_id: Option<Uuid>,
    /// RFC 3339 lower bound (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// RFC 3339 upper bound (inclusive)
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/audit",
    params(AuditListQuery),
    responses((status = 200, description = "Audit entries, newest first", body = ApiResponse<Vec<AuditEntry>>)),
    security(("Bearer" = [])),
    tag = "audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditListQuery>,
) -> Result<Json<ApiResponse<Vec<AuditEntry>>>, ServiceError> {
    let paging = PageRequest::new(query.page, state.config.page_size(query.limit));
    let filter = AuditFilter {
        entity_type: query.entity_type,
        user_id: query.user_id,
        from: query.from,
        to: query.to,
    };
    let page = state.services.audit.list(filter, paging).await?;
    Ok(Json(ApiResponse::paginated(page)))
}

#[utoipa::path(
    get,
    path = "/api/audit/{entity_type}/{entity_id}",
    params(
        ("entity_type" = AuditEntityType, Path, description = "Entity kind, e.g. Order"),
        ("entity_id" = Uuid, Path, description = "Entity id"),
    ),
    responses((status = 200, description = "History of one entity", body = ApiResponse<Vec<AuditEntry>>)),
    security(("Bearer" = [])),
    tag = "audit"
)]
pub async fn entity_history(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(AuditEntityType, Uuid)>,
) -> Result<Json<ApiResponse<Vec<AuditEntry>>>, ServiceError> {
    let entries = state
        .services
        .audit
        .for_entity(entity_type, entity_id)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

use crate::{
    db::DbPool,
    entities::{
        batch::{self, Entity as BatchEntity},
        product::{self, Entity as ProductEntity, UnitOfMeasure},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Window used by the `expiring_soon` filter.
pub const EXPIRING_SOON_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBatchRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "Batch number is required"))]
    pub batch_number: String,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    pub expiration_date: Option<DateTime<Utc>>,
    pub warehouse_location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateBatchRequest {
    #[validate(length(min = 1, message = "Batch number cannot be empty"))]
    pub batch_number: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub warehouse_location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub product_id: Option<Uuid>,
    pub expiring_soon: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub cas_number: Option<String>,
    pub unit_of_measure: UnitOfMeasure,
}

/// A batch together with the product it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: batch::Model,
    pub product: Option<ProductSummary>,
}

impl From<(batch::Model, Option<product::Model>)> for BatchView {
    fn from((batch, product): (batch::Model, Option<product::Model>)) -> Self {
        Self {
            batch,
            product: product.map(|p| ProductSummary {
                id: p.id,
                name: p.name,
                cas_number: p.cas_number,
                unit_of_measure: p.unit_of_measure,
            }),
        }
    }
}

/// Adds `delta` to a product's on-hand level. Negative deltas are clamped at zero.
pub(crate) async fn adjust_inventory<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    delta: i32,
) -> Result<(), ServiceError> {
    if delta == 0 {
        return Ok(());
    }
    if delta > 0 {
        ProductEntity::update_many()
            .col_expr(
                product::Column::InventoryLevel,
                Expr::col(product::Column::InventoryLevel).add(delta),
            )
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;
        return Ok(());
    }

    let removed = -delta;
    let guarded = ProductEntity::update_many()
        .col_expr(
            product::Column::InventoryLevel,
            Expr::col(product::Column::InventoryLevel).sub(removed),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::InventoryLevel.gte(removed))
        .exec(conn)
        .await?;
    if guarded.rows_affected == 0 {
        warn!(%product_id, removed, "Inventory below removed quantity; clamping to zero");
        ProductEntity::update_many()
            .col_expr(product::Column::InventoryLevel, Expr::value(0))
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

/// Batch tracking. Every quantity change on a batch is mirrored onto its product's inventory.
#[derive(Clone)]
pub struct BatchService {
    db_pool: Arc<DbPool>,
}

impl BatchService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_batches(&self, filter: BatchFilter) -> Result<Vec<BatchView>, ServiceError> {
        let mut query = BatchEntity::find().find_also_related(ProductEntity);
        if let Some(product_id) = filter.product_id {
            query = query.filter(batch::Column::ProductId.eq(product_id));
        }
        if filter.expiring_soon {
            let now = Utc::now();
            query = query
                .filter(batch::Column::ExpirationDate.gte(now))
                .filter(batch::Column::ExpirationDate.lte(now + Duration::days(EXPIRING_SOON_DAYS)));
        }

        let rows = query
            .order_by_asc(batch::Column::ExpirationDate)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(BatchView::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, id: Uuid) -> Result<BatchView, ServiceError> {
        BatchEntity::find_by_id(id)
            .find_also_related(ProductEntity)
            .one(&*self.db_pool)
            .await?
            .map(BatchView::from)
            .ok_or_else(|| ServiceError::NotFound("Batch not found".to_string()))
    }

    async fn find_batch(&self, id: Uuid) -> Result<batch::Model, ServiceError> {
        BatchEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Batch not found".to_string()))
    }

    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn create_batch(
        &self,
        request: CreateBatchRequest,
    ) -> Result<batch::Model, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await?;
        ProductEntity::find_by_id(request.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;

        let now = Utc::now();
        let model = batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(request.product_id),
            batch_number: Set(request.batch_number.trim().to_string()),
            quantity: Set(request.quantity),
            expiration_date: Set(request.expiration_date),
            warehouse_location: Set(request.warehouse_location),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert batch");
            ServiceError::DatabaseError(e)
        })?;

        adjust_inventory(&txn, model.product_id, model.quantity).await?;
        txn.commit().await?;

        info!(batch_id = %model.id, quantity = model.quantity, "Batch received");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_batch(
        &self,
        id: Uuid,
        request: UpdateBatchRequest,
    ) -> Result<batch::Model, ServiceError> {
        request.validate()?;
        let existing = self.find_batch(id).await?;
        let delta = request
            .quantity
            .map(|q| q - existing.quantity)
            .unwrap_or(0);
        let product_id = existing.product_id;

        let txn = self.db_pool.begin().await?;
        let mut active: batch::ActiveModel = existing.into();
        if let Some(v) = request.batch_number {
            active.batch_number = Set(v.trim().to_string());
        }
        if let Some(v) = request.quantity {
            active.quantity = Set(v);
        }
        if let Some(v) = request.expiration_date {
            active.expiration_date = Set(Some(v));
        }
        if let Some(v) = request.warehouse_location {
            active.warehouse_location = Set(Some(v));
        }
        let updated = active.update(&txn).await?;
        adjust_inventory(&txn, product_id, delta).await?;
        txn.commit().await?;

        Ok(updated)
    }

    /// Deletes a batch and removes its remaining quantity from the product.
    #[instrument(skip(self))]
    pub async fn delete_batch(&self, id: Uuid) -> Result<batch::Model, ServiceError> {
        let existing = self.find_batch(id).await?;

        let txn = self.db_pool.begin().await?;
        BatchEntity::delete_by_id(id).exec(&txn).await?;
        adjust_inventory(&txn, existing.product_id, -existing.quantity).await?;
        txn.commit().await?;

        info!(batch_id = %id, quantity = existing.quantity, "Batch deleted");
        Ok(existing)
    }
}

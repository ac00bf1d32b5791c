use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender, LowStockProduct},
};
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Non-archived products at or below their reorder threshold.
pub(crate) async fn low_stock_products<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<product::Model>, ServiceError> {
    let products = ProductEntity::find()
        .filter(product::Column::IsArchived.eq(false))
        .filter(
            Expr::col(product::Column::InventoryLevel)
                .lte(Expr::col(product::Column::ReorderThreshold)),
        )
        .order_by_asc(product::Column::InventoryLevel)
        .all(conn)
        .await?;
    Ok(products)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AlertSummary {
    pub low_stock: Vec<product::Model>,
}

#[derive(Clone)]
pub struct AlertService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AlertService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub async fn summary(&self) -> Result<AlertSummary, ServiceError> {
        Ok(AlertSummary {
            low_stock: low_stock_products(&*self.db_pool).await?,
        })
    }

    /// Emits `product.low_stock` when anything is at or below threshold.
    #[instrument(skip(self))]
    pub async fn check_low_stock(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = low_stock_products(&*self.db_pool).await?;
        if !products.is_empty() {
            info!(count = products.len(), "Low stock detected");
            self.event_sender
                .emit(Event::LowStock {
                    products: products
                        .iter()
                        .map(|p| LowStockProduct {
                            id: p.id,
                            name: p.name.clone(),
                            inventory_level: p.inventory_level,
                            reorder_threshold: p.reorder_threshold,
                        })
                        .collect(),
                })
                .await;
        }
        Ok(products)
    }
}

use crate::{
    db::DbPool,
    documents,
    entities::{
        batch::{self, Entity as BatchEntity},
        product::{self, Entity as ProductEntity, UnitOfMeasure},
    },
    errors::ServiceError,
    services::{Page, PageRequest},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn validate_non_negative_price(price: &Decimal) -> Result<(), validator::ValidationError> {
    if price.is_sign_negative() {
        return Err(validator::ValidationError::new("price_negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    pub cas_number: Option<String>,
    pub un_number: Option<String>,
    pub hazard_classification: Option<String>,
    pub storage_requirements: Option<String>,
    #[validate(url(message = "SDS document URL must be a valid URL"))]
    pub sds_document_url: Option<String>,
    pub unit_of_measure: Option<UnitOfMeasure>,
    #[validate(range(min = 0, message = "Inventory level cannot be negative"))]
    pub inventory_level: Option<i32>,
    #[validate(range(min = 0, message = "Reorder threshold cannot be negative"))]
    pub reorder_threshold: Option<i32>,
    #[validate(custom = "validate_non_negative_price")]
    pub price: Decimal,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub is_hazardous: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub name: Option<String>,
    pub cas_number: Option<String>,
    pub un_number: Option<String>,
    pub hazard_classification: Option<String>,
    pub storage_requirements: Option<String>,
    #[validate(url(message = "SDS document URL must be a valid URL"))]
    pub sds_document_url: Option<String>,
    pub unit_of_measure: Option<UnitOfMeasure>,
    #[validate(range(min = 0, message = "Inventory level cannot be negative"))]
    pub inventory_level: Option<i32>,
    #[validate(range(min = 0, message = "Reorder threshold cannot be negative"))]
    pub reorder_threshold: Option<i32>,
    #[validate(custom = "validate_non_negative_price")]
    pub price: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub is_hazardous: Option<bool>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub hazardous: Option<bool>,
    pub include_archived: bool,
}

/// Column layout shared by CSV export and import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCsvRow {
    pub name: String,
    pub cas_number: Option<String>,
    pub un_number: Option<String>,
    pub hazard_classification: Option<String>,
    pub storage_requirements: Option<String>,
    pub unit_of_measure: Option<UnitOfMeasure>,
    pub inventory_level: Option<i32>,
    pub reorder_threshold: Option<i32>,
    pub price: Decimal,
    pub currency: Option<String>,
    pub is_hazardous: Option<bool>,
}

impl From<&product::Model> for ProductCsvRow {
    fn from(p: &product::Model) -> Self {
        Self {
            name: p.name.clone(),
            cas_number: p.cas_number.clone(),
            un_number: p.un_number.clone(),
            hazard_classification: p.hazard_classification.clone(),
            storage_requirements: p.storage_requirements.clone(),
            unit_of_measure: Some(p.unit_of_measure),
            inventory_level: Some(p.inventory_level),
            reorder_threshold: Some(p.reorder_threshold),
            price: p.price,
            currency: Some(p.currency.clone()),
            is_hazardous: Some(p.is_hazardous),
        }
    }
}

impl From<ProductCsvRow> for CreateProductRequest {
    fn from(row: ProductCsvRow) -> Self {
        Self {
            name: row.name,
            cas_number: row.cas_number,
            un_number: row.un_number,
            hazard_classification: row.hazard_classification,
            storage_requirements: row.storage_requirements,
            sds_document_url: None,
            unit_of_measure: row.unit_of_measure,
            inventory_level: row.inventory_level,
            reorder_threshold: row.reorder_threshold,
            price: row.price,
            currency: row.currency,
            is_hazardous: row.is_hazardous,
        }
    }
}

const DEFAULT_REORDER_THRESHOLD: i32 = 10;

/// Product catalog management
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    default_currency: String,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, default_currency: String) -> Self {
        Self {
            db_pool,
            default_currency,
        }
    }

    fn active_model(&self, request: CreateProductRequest) -> product::ActiveModel {
        let now = chrono::Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            cas_number: Set(request.cas_number),
            un_number: Set(request.un_number),
            hazard_classification: Set(request.hazard_classification),
            storage_requirements: Set(request.storage_requirements),
            sds_document_url: Set(request.sds_document_url),
            unit_of_measure: Set(request.unit_of_measure.unwrap_or_default()),
            inventory_level: Set(request.inventory_level.unwrap_or(0)),
            reorder_threshold: Set(request
                .reorder_threshold
                .unwrap_or(DEFAULT_REORDER_THRESHOLD)),
            price: Set(request.price),
            currency: Set(request
                .currency
                .unwrap_or_else(|| self.default_currency.clone())
                .to_uppercase()),
            is_hazardous: Set(request.is_hazardous.unwrap_or(false)),
            is_archived: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        paging: PageRequest,
    ) -> Result<Page<product::Model>, ServiceError> {
        let mut query = ProductEntity::find();
        if !filter.include_archived {
            query = query.filter(product::Column::IsArchived.eq(false));
        }
        if let Some(hazardous) = filter.hazardous {
            query = query.filter(product::Column::IsHazardous.eq(hazardous));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::CasNumber.contains(term))
                    .add(product::Column::UnNumber.contains(term)),
            );
        }

        let paginator = query
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db_pool, paging.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(paging.index()).await.map_err(|e| {
            error!(error = %e, "Failed to list products");
            ServiceError::DatabaseError(e)
        })?;

        Ok(Page::new(items, total, paging.page, paging.limit))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let model = self
            .active_model(request)
            .insert(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to create product");
                ServiceError::DatabaseError(e)
            })?;
        info!(product_id = %model.id, "Product created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_product(id).await?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(v) = request.cas_number {
            active.cas_number = Set(Some(v));
        }
        if let Some(v) = request.un_number {
            active.un_number = Set(Some(v));
        }
        if let Some(v) = request.hazard_classification {
            active.hazard_classification = Set(Some(v));
        }
        if let Some(v) = request.storage_requirements {
            active.storage_requirements = Set(Some(v));
        }
        if let Some(v) = request.sds_document_url {
            active.sds_document_url = Set(Some(v));
        }
        if let Some(v) = request.unit_of_measure {
            active.unit_of_measure = Set(v);
        }
        if let Some(v) = request.inventory_level {
            active.inventory_level = Set(v);
        }
        if let Some(v) = request.reorder_threshold {
            active.reorder_threshold = Set(v);
        }
        if let Some(v) = request.price {
            active.price = Set(v);
        }
        if let Some(v) = request.currency {
            active.currency = Set(v.to_uppercase());
        }
        if let Some(v) = request.is_hazardous {
            active.is_hazardous = Set(v);
        }
        if let Some(v) = request.is_archived {
            active.is_archived = Set(v);
        }

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, product_id = %id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;
        Ok(updated)
    }

    /// Soft delete: archived products drop out of listings, exports and alerts.
    #[instrument(skip(self))]
    pub async fn archive_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        let existing = self.get_product(id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.is_archived = Set(true);
        let archived = active.update(&*self.db_pool).await?;
        info!(product_id = %id, "Product archived");
        Ok(archived)
    }

    #[instrument(skip(self))]
    pub async fn batches_for_product(&self, id: Uuid) -> Result<Vec<batch::Model>, ServiceError> {
        self.get_product(id).await?;
        let batches = BatchEntity::find()
            .filter(batch::Column::ProductId.eq(id))
            .order_by_asc(batch::Column::ExpirationDate)
            .all(&*self.db_pool)
            .await?;
        Ok(batches)
    }

    /// Imports every row or none of them.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn import_csv(&self, data: &[u8]) -> Result<Vec<product::Model>, ServiceError> {
        let rows: Vec<ProductCsvRow> = documents::csv::read_records(data)?;
        let requests: Vec<CreateProductRequest> = rows.into_iter().map(Into::into).collect();
        for (index, request) in requests.iter().enumerate() {
            request.validate().map_err(|e| {
                ServiceError::ValidationError(format!(
                    "Row {}: {}",
                    index + 2,
                    crate::handlers::common::format_validation_errors(&e)
                ))
            })?;
        }

        let txn = self.db_pool.begin().await?;
        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            created.push(self.active_model(request).insert(&txn).await?);
        }
        txn.commit().await?;

        info!(count = created.len(), "Imported products from CSV");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn export_csv(&self) -> Result<Vec<u8>, ServiceError> {
        let products = ProductEntity::find()
            .filter(product::Column::IsArchived.eq(false))
            .order_by_asc(product::Column::Name)
            .all(&*self.db_pool)
            .await?;
        let rows: Vec<ProductCsvRow> = products.iter().map(ProductCsvRow::from).collect();
        documents::csv::write_records(&rows)
    }
}

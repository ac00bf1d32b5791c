use crate::{
    db::DbPool,
    documents,
    entities::{
        customer::{self, ComplianceStatus},
        product::{self, Entity as ProductEntity, UnitOfMeasure},
    },
    errors::ServiceError,
    services::customers::CustomerService,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SdsProduct {
    pub id: Uuid,
    pub name: String,
    pub cas_number: Option<String>,
    pub hazard_classification: Option<String>,
    pub sds_document_url: Option<String>,
    pub is_hazardous: bool,
}

/// Safety data sheet coverage of hazardous stock.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SdsTracker {
    pub total: usize,
    pub with_sds: usize,
    pub without_sds: usize,
    pub products: Vec<SdsProduct>,
}

impl SdsTracker {
    pub fn from_products(products: Vec<product::Model>) -> Self {
        let products: Vec<SdsProduct> = products
            .into_iter()
            .map(|p| SdsProduct {
                id: p.id,
                name: p.name,
                cas_number: p.cas_number,
                hazard_classification: p.hazard_classification,
                sds_document_url: p.sds_document_url.filter(|url| !url.trim().is_empty()),
                is_hazardous: p.is_hazardous,
            })
            .collect();
        let with_sds = products.iter().filter(|p| p.sds_document_url.is_some()).count();
        Self {
            total: products.len(),
            with_sds,
            without_sds: products.len() - with_sds,
            products,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegulatoryRow {
    pub name: String,
    pub cas_number: Option<String>,
    pub un_number: Option<String>,
    pub hazard_classification: Option<String>,
    pub storage_requirements: Option<String>,
    pub sds_document_url: Option<String>,
    pub unit_of_measure: UnitOfMeasure,
}

impl From<product::Model> for RegulatoryRow {
    fn from(p: product::Model) -> Self {
        Self {
            name: p.name,
            cas_number: p.cas_number,
            un_number: p.un_number,
            hazard_classification: p.hazard_classification,
            storage_requirements: p.storage_requirements,
            sds_document_url: p.sds_document_url,
            unit_of_measure: p.unit_of_measure,
        }
    }
}

pub const REGULATORY_EXPORT_FILENAME: &str = "regulatory_export.csv";

#[derive(Clone)]
pub struct ComplianceService {
    db_pool: Arc<DbPool>,
    customers: Arc<CustomerService>,
}

impl ComplianceService {
    pub fn new(db_pool: Arc<DbPool>, customers: Arc<CustomerService>) -> Self {
        Self { db_pool, customers }
    }

    async fn active_products(&self, hazardous_only: bool) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = ProductEntity::find().filter(product::Column::IsArchived.eq(false));
        if hazardous_only {
            query = query.filter(product::Column::IsHazardous.eq(true));
        }
        Ok(query
            .order_by_asc(product::Column::Name)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn sds_tracker(&self) -> Result<SdsTracker, ServiceError> {
        Ok(SdsTracker::from_products(self.active_products(true).await?))
    }

    /// Regulatory listing of every active product as CSV.
    #[instrument(skip(self))]
    pub async fn regulatory_export_csv(&self) -> Result<Vec<u8>, ServiceError> {
        let rows: Vec<RegulatoryRow> = self
            .active_products(false)
            .await?
            .into_iter()
            .map(RegulatoryRow::from)
            .collect();
        documents::csv::write_records(&rows)
    }

    pub async fn set_customer_status(
        &self,
        customer_id: Uuid,
        status: ComplianceStatus,
    ) -> Result<customer::Model, ServiceError> {
        self.customers.set_compliance_status(customer_id, status).await
    }
}

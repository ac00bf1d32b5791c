use crate::{
    db::DbPool,
    documents,
    entities::{
        customer::{self, ComplianceStatus, Entity as CustomerEntity},
        order::{self, Entity as OrderEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{Page, PageRequest},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn validate_credit_limit(limit: &Decimal) -> Result<(), validator::ValidationError> {
    if limit.is_sign_negative() {
        return Err(validator::ValidationError::new("credit_limit_negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, message = "Company name is required"))]
    pub company_name: String,
    pub tax_id: Option<String>,
    #[validate(custom = "validate_credit_limit")]
    pub credit_limit: Option<Decimal>,
    pub compliance_status: Option<ComplianceStatus>,
    pub address: Option<Address>,
    pub contact_name: Option<String>,
    #[validate(email(message = "Contact email must be a valid email address"))]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, message = "Company name cannot be empty"))]
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    #[validate(custom = "validate_credit_limit")]
    pub credit_limit: Option<Decimal>,
    pub compliance_status: Option<ComplianceStatus>,
    pub address: Option<Address>,
    pub contact_name: Option<String>,
    #[validate(email(message = "Contact email must be a valid email address"))]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub compliance_status: Option<ComplianceStatus>,
}

/// Column layout shared by CSV export and import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerCsvRow {
    pub company_name: String,
    pub tax_id: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub compliance_status: Option<ComplianceStatus>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub currency: Option<String>,
}

impl From<&customer::Model> for CustomerCsvRow {
    fn from(c: &customer::Model) -> Self {
        Self {
            company_name: c.company_name.clone(),
            tax_id: c.tax_id.clone(),
            credit_limit: Some(c.credit_limit),
            compliance_status: Some(c.compliance_status),
            contact_name: c.contact_name.clone(),
            contact_email: c.contact_email.clone(),
            contact_phone: c.contact_phone.clone(),
            currency: Some(c.currency.clone()),
        }
    }
}

impl From<CustomerCsvRow> for CreateCustomerRequest {
    fn from(row: CustomerCsvRow) -> Self {
        Self {
            company_name: row.company_name,
            tax_id: row.tax_id,
            credit_limit: row.credit_limit,
            compliance_status: row.compliance_status,
            address: None,
            contact_name: row.contact_name,
            contact_email: row.contact_email,
            contact_phone: row.contact_phone,
            currency: row.currency,
            notes: None,
        }
    }
}

/// Customer records and their compliance state
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    default_currency: String,
}

impl CustomerService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        default_currency: String,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            default_currency,
        }
    }

    fn active_model(&self, request: CreateCustomerRequest) -> customer::ActiveModel {
        let now = chrono::Utc::now();
        let address = request.address.unwrap_or_default();
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_name: Set(request.company_name.trim().to_string()),
            tax_id: Set(request.tax_id),
            credit_limit: Set(request.credit_limit.unwrap_or(Decimal::ZERO)),
            compliance_status: Set(request.compliance_status.unwrap_or_default()),
            street: Set(address.street),
            city: Set(address.city),
            state: Set(address.state),
            postal_code: Set(address.postal_code),
            country: Set(address.country),
            contact_name: Set(request.contact_name),
            contact_email: Set(request.contact_email),
            contact_phone: Set(request.contact_phone),
            currency: Set(request
                .currency
                .unwrap_or_else(|| self.default_currency.clone())
                .to_uppercase()),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        filter: CustomerFilter,
        paging: PageRequest,
    ) -> Result<Page<customer::Model>, ServiceError> {
        let mut query = CustomerEntity::find();
        if let Some(status) = filter.compliance_status {
            query = query.filter(customer::Column::ComplianceStatus.eq(status));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(customer::Column::CompanyName.contains(term));
        }

        let paginator = query
            .order_by_asc(customer::Column::CompanyName)
            .paginate(&*self.db_pool, paging.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(paging.index()).await?;
        Ok(Page::new(items, total, paging.page, paging.limit))
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        CustomerEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Customer not found".to_string()))
    }

    #[instrument(skip(self, request), fields(company = %request.company_name))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;
        let model = self
            .active_model(request)
            .insert(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to create customer");
                ServiceError::DatabaseError(e)
            })?;
        info!(customer_id = %model.id, "Customer created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_customer(
        &self,
        id: Uuid,
        request: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_customer(id).await?;
        let previous_status = existing.compliance_status;
        let mut active: customer::ActiveModel = existing.into();

        if let Some(v) = request.company_name {
            active.company_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.tax_id {
            active.tax_id = Set(Some(v));
        }
        if let Some(v) = request.credit_limit {
            active.credit_limit = Set(v);
        }
        if let Some(v) = request.compliance_status {
            active.compliance_status = Set(v);
        }
        if let Some(address) = request.address {
            if let Some(v) = address.street {
                active.street = Set(Some(v));
            }
            if let Some(v) = address.city {
                active.city = Set(Some(v));
            }
            if let Some(v) = address.state {
                active.state = Set(Some(v));
            }
            if let Some(v) = address.postal_code {
                active.postal_code = Set(Some(v));
            }
            if let Some(v) = address.country {
                active.country = Set(Some(v));
            }
        }
        if let Some(v) = request.contact_name {
            active.contact_name = Set(Some(v));
        }
        if let Some(v) = request.contact_email {
            active.contact_email = Set(Some(v));
        }
        if let Some(v) = request.contact_phone {
            active.contact_phone = Set(Some(v));
        }
        if let Some(v) = request.currency {
            active.currency = Set(v.to_uppercase());
        }
        if let Some(v) = request.notes {
            active.notes = Set(Some(v));
        }

        let updated = active.update(&*self.db_pool).await?;
        if updated.compliance_status != previous_status {
            self.compliance_changed(&updated).await;
        }
        Ok(updated)
    }

    /// Sets only the compliance status; emits `customer.compliance_changed` when it moves.
    #[instrument(skip(self))]
    pub async fn set_compliance_status(
        &self,
        id: Uuid,
        status: ComplianceStatus,
    ) -> Result<customer::Model, ServiceError> {
        let existing = self.get_customer(id).await?;
        if existing.compliance_status == status {
            return Ok(existing);
        }
        let mut active: customer::ActiveModel = existing.into();
        active.compliance_status = Set(status);
        let updated = active.update(&*self.db_pool).await?;
        self.compliance_changed(&updated).await;
        Ok(updated)
    }

    async fn compliance_changed(&self, customer: &customer::Model) {
        info!(
            customer_id = %customer.id,
            status = %customer.compliance_status,
            "Customer compliance status changed"
        );
        self.event_sender
            .emit(Event::CustomerComplianceChanged {
                customer_id: customer.id,
                status: customer.compliance_status,
            })
            .await;
    }

    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        let existing = self.get_customer(id).await?;
        let order_count = OrderEntity::find()
            .filter(order::Column::CustomerId.eq(id))
            .count(&*self.db_pool)
            .await?;
        if order_count > 0 {
            return Err(ServiceError::Conflict(
                "Customer has orders and cannot be deleted".to_string(),
            ));
        }
        CustomerEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        info!(customer_id = %id, "Customer deleted");
        Ok(existing)
    }

    /// Imports every row or none of them.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn import_csv(&self, data: &[u8]) -> Result<Vec<customer::Model>, ServiceError> {
        let rows: Vec<CustomerCsvRow> = documents::csv::read_records(data)?;
        let requests: Vec<CreateCustomerRequest> = rows.into_iter().map(Into::into).collect();
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

        info!(count = created.len(), "Imported customers from CSV");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn export_csv(&self) -> Result<Vec<u8>, ServiceError> {
        let customers = CustomerEntity::find()
            .order_by_asc(customer::Column::CompanyName)
            .all(&*self.db_pool)
            .await?;
        let rows: Vec<CustomerCsvRow> = customers.iter().map(CustomerCsvRow::from).collect();
        documents::csv::write_records(&rows)
    }
}

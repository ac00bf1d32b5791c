use crate::{
    entities::customer::{self, ComplianceStatus},
    errors::{ErrorResponse, ServiceError},
    handlers::common::{uploaded_file, Attachment},
    services::{
        customers::{CreateCustomerRequest, CustomerFilter, UpdateCustomerRequest},
        PageRequest,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CustomerListQuery {
    /// Company name contains
    pub search: Option<String>,
    pub compliance_status: Option<ComplianceStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/customers",
    params(CustomerListQuery),
    responses((status = 200, description = "Customers by company name", body = ApiResponse<Vec<customer::Model>>)),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<ApiResponse<Vec<customer::Model>>>, ServiceError> {
    let paging = PageRequest::new(query.page, state.config.page_size(query.limit));
    let filter = CustomerFilter {
        search: query.search,
        compliance_status: query.compliance_status,
    };
    let page = state.services.customers.list_customers(filter, paging).await?;
    Ok(Json(ApiResponse::paginated(page)))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = ApiResponse<customer::Model>),
        (status = 404, description = "Customer not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<customer::Model>>, ServiceError> {
    let customer = state.services.customers.get_customer(id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = ApiResponse<customer::Model>),
        (status = 400, description = "Validation failed", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.create_customer(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(customer))))
}

#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<customer::Model>),
        (status = 404, description = "Customer not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<Json<ApiResponse<customer::Model>>, ServiceError> {
    let customer = state.services.customers.update_customer(id, payload).await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer deleted", body = ApiResponse<customer::Model>),
        (status = 404, description = "Customer not found", body = ErrorResponse),
        (status = 409, description = "Customer has orders", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<customer::Model>>, ServiceError> {
    let customer = state.services.customers.delete_customer(id).await?;
    Ok(Json(ApiResponse::with_message(customer, "Customer deleted")))
}

#[utoipa::path(
    post,
    path = "/api/customers/import",
    request_body(content_type = "multipart/form-data", description = "CSV upload in field `file`"),
    responses(
        (status = 200, description = "Customers imported", body = ApiResponse<Vec<customer::Model>>),
        (status = 400, description = "No file or invalid rows", body = ErrorResponse),
        (status = 403, description = "CSV import disabled", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn import_customers(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<customer::Model>>>, ServiceError> {
    state.require_csv_import().await?;
    let file = uploaded_file(multipart).await?;
    let created = state.services.customers.import_csv(&file).await?;
    let message = format!("Imported {} customers", created.len());
    Ok(Json(ApiResponse::with_message(created, message)))
}

#[utoipa::path(
    get,
    path = "/api/customers/export",
    responses((status = 200, description = "customers.csv", content_type = "text/csv")),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn export_customers(State(state): State<AppState>) -> Result<Attachment, ServiceError> {
    let csv = state.services.customers.export_csv().await?;
    Ok(Attachment::csv("customers.csv", csv))
}

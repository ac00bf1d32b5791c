use crate::{
    entities::{batch, product},
    errors::{ErrorResponse, ServiceError},
    handlers::common::{uploaded_file, Attachment},
    services::{
        products::{CreateProductRequest, ProductFilter, UpdateProductRequest},
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
pub struct ProductListQuery {
    /// Matches name, CAS number or UN number
    pub search: Option<String>,
    pub hazardous: Option<bool>,
    /// Include archived products
    pub archived: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products page", body = ApiResponse<Vec<product::Model>>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ServiceError> {
    let paging = PageRequest::new(query.page, state.config.page_size(query.limit));
    let filter = ProductFilter {
        search: query.search,
        hazardous: query.hazardous,
        include_archived: query.archived.unwrap_or(false),
    };
    let page = state.services.products.list_products(filter, paging).await?;
    Ok(Json(ApiResponse::paginated(page)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    let product = state.services.products.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/batches",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Batches by expiration", body = ApiResponse<Vec<batch::Model>>),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn product_batches(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<batch::Model>>>, ServiceError> {
    let batches = state.services.products.batches_for_product(id).await?;
    Ok(Json(ApiResponse::success(batches)))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<product::Model>),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    let product = state.services.products.update_product(id, payload).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Archives rather than deletes; order history keeps its references.
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product archived", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn archive_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    let product = state.services.products.archive_product(id).await?;
    Ok(Json(ApiResponse::with_message(product, "Product archived")))
}

#[utoipa::path(
    post,
    path = "/api/products/import",
    request_body(content_type = "multipart/form-data", description = "CSV upload in field `file`"),
    responses(
        (status = 200, description = "Products imported", body = ApiResponse<Vec<product::Model>>),
        (status = 400, description = "No file or invalid rows", body = ErrorResponse),
        (status = 403, description = "CSV import disabled", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn import_products(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ServiceError> {
    state.require_csv_import().await?;
    let file = uploaded_file(multipart).await?;
    let created = state.services.products.import_csv(&file).await?;
    let message = format!("Imported {} products", created.len());
    Ok(Json(ApiResponse::with_message(created, message)))
}

#[utoipa::path(
    get,
    path = "/api/products/export",
    responses((status = 200, description = "products.csv", content_type = "text/csv")),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn export_products(State(state): State<AppState>) -> Result<Attachment, ServiceError> {
    let csv = state.services.products.export_csv().await?;
    Ok(Attachment::csv("products.csv", csv))
}

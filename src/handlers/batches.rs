use crate::{
    entities::batch,
    errors::{ErrorResponse, ServiceError},
    services::batches::{BatchFilter, BatchView, CreateBatchRequest, UpdateBatchRequest},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BatchListQuery {
    pub product_id: Option<Uuid>,
    /// Only batches expiring within 30 days
    pub expiring_soon: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/batches",
    params(BatchListQuery),
    responses((status = 200, description = "Batches by expiration date", body = ApiResponse<Vec<BatchView>>)),
    security(("Bearer" = [])),
    tag = "batches"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchListQuery>,
) -> Result<Json<ApiResponse<Vec<BatchView>>>, ServiceError> {
    let filter = BatchFilter {
        product_id: query.product_id,
        expiring_soon: query.expiring_soon.unwrap_or(false),
    };
    let batches = state.services.batches.list_batches(filter).await?;
    Ok(Json(ApiResponse::success(batches)))
}

#[utoipa::path(
    get,
    path = "/api/batches/{id}",
    params(("id" = Uuid, Path, description = "Batch id")),
    responses(
        (status = 200, description = "Batch", body = ApiResponse<BatchView>),
        (status = 404, description = "Batch not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BatchView>>, ServiceError> {
    let batch = state.services.batches.get_batch(id).await?;
    Ok(Json(ApiResponse::success(batch)))
}

/// Receives a batch; its quantity is added to the product's inventory.
#[utoipa::path(
    post,
    path = "/api/batches",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch created", body = ApiResponse<batch::Model>),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "batches"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let batch = state.services.batches.create_batch(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(batch))))
}

#[utoipa::path(
    put,
    path = "/api/batches/{id}",
    params(("id" = Uuid, Path, description = "Batch id")),
    request_body = UpdateBatchRequest,
    responses(
        (status = 200, description = "Batch updated", body = ApiResponse<batch::Model>),
        (status = 404, description = "Batch not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "batches"
)]
pub async fn update_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBatchRequest>,
) -> Result<Json<ApiResponse<batch::Model>>, ServiceError> {
    let batch = state.services.batches.update_batch(id, payload).await?;
    Ok(Json(ApiResponse::success(batch)))
}

#[utoipa::path(
    delete,
    path = "/api/batches/{id}",
    params(("id" = Uuid, Path, description = "Batch id")),
    responses(
        (status = 200, description = "Batch deleted", body = ApiResponse<batch::Model>),
        (status = 404, description = "Batch not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "batches"
)]
pub async fn delete_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<batch::Model>>, ServiceError> {
    let batch = state.services.batches.delete_batch(id).await?;
    Ok(Json(ApiResponse::with_message(batch, "Batch deleted")))
}

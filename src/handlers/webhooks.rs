use crate::{
    auth::AuthUser,
    entities::webhook,
    errors::{ErrorResponse, ServiceError},
    services::webhooks::{CreateWebhookRequest, UpdateWebhookRequest, WebhookTestResult},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/webhooks",
    responses((status = 200, description = "Registered webhooks", body = ApiResponse<Vec<webhook::Model>>)),
    security(("Bearer" = [])),
    tag = "webhooks"
)]
pub async fn list_webhooks(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<webhook::Model>>>, ServiceError> {
    let hooks = state.services.webhooks.list_webhooks().await?;
    Ok(Json(ApiResponse::success(hooks)))
}

#[utoipa::path(
    post,
    path = "/api/webhooks",
    request_body = CreateWebhookRequest,
    responses(
        (status = 201, description = "Webhook registered", body = ApiResponse<webhook::Model>),
        (status = 400, description = "Invalid URL or unknown event", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "webhooks"
)]
pub async fn create_webhook(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let hook = state
        .services
        .webhooks
        .create_webhook(payload, Some(auth_user.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(hook))))
}

#[utoipa::path(
    put,
    path = "/api/webhooks/{id}",
    params(("id" = Uuid, Path, description = "Webhook id")),
    request_body = UpdateWebhookRequest,
    responses(
        (status = 200, description = "Webhook updated", body = ApiResponse<webhook::Model>),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "webhooks"
)]
pub async fn update_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWebhookRequest>,
) -> Result<Json<ApiResponse<webhook::Model>>, ServiceError> {
    let hook = state.services.webhooks.update_webhook(id, payload).await?;
    Ok(Json(ApiResponse::success(hook)))
}

#[utoipa::path(
    delete,
    path = "/api/webhooks/{id}",
    params(("id" = Uuid, Path, description = "Webhook id")),
    responses(
        (status = 200, description = "Webhook deleted", body = ApiResponse<webhook::Model>),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "webhooks"
)]
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<webhook::Model>>, ServiceError> {
    let hook = state.services.webhooks.delete_webhook(id).await?;
    Ok(Json(ApiResponse::with_message(hook, "Webhook deleted")))
}

/// Sends `{test: true, webhook_id}` to this webhook and reports the outcome.
#[utoipa::path(
    post,
    path = "/api/webhooks/{id}/test",
    params(("id" = Uuid, Path, description = "Webhook id")),
    responses(
        (status = 200, description = "Delivery attempted", body = ApiResponse<WebhookTestResult>),
        (status = 404, description = "Webhook not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "webhooks"
)]
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WebhookTestResult>>, ServiceError> {
    let result = state.services.webhooks.test_webhook(id).await?;
    Ok(Json(ApiResponse::success(result)))
}

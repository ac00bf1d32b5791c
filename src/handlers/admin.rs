use crate::{
    entities::user,
    errors::{ErrorResponse, ServiceError},
    services::{
        alerts::AlertSummary,
        features::{Features, FeaturesUpdate},
        users::{CreateUserRequest, UpdateUserRequest},
    },
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
    path = "/api/admin/users",
    responses((status = 200, description = "All users", body = ApiResponse<Vec<user::Model>>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<user::Model>>>, ServiceError> {
    let users = state.services.users.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<user::Model>),
        (status = 400, description = "Password required or email in use", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<user::Model>),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<user::Model>>, ServiceError> {
    let user = state.services.users.update_user(id, payload).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    get,
    path = "/api/admin/features",
    responses((status = 200, description = "Feature flags", body = ApiResponse<Features>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn get_features(State(state): State<AppState>) -> Json<ApiResponse<Features>> {
    Json(ApiResponse::success(state.features.snapshot().await))
}

#[utoipa::path(
    put,
    path = "/api/admin/features",
    request_body = FeaturesUpdate,
    responses((status = 200, description = "Merged feature flags", body = ApiResponse<Features>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn update_features(
    State(state): State<AppState>,
    Json(payload): Json<FeaturesUpdate>,
) -> Json<ApiResponse<Features>> {
    Json(ApiResponse::success(state.features.update(payload).await))
}

#[utoipa::path(
    get,
    path = "/api/admin/alerts",
    responses((status = 200, description = "Operational alerts", body = ApiResponse<AlertSummary>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn alerts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AlertSummary>>, ServiceError> {
    let summary = state.services.alerts.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

use crate::{
    auth::AuthUser,
    entities::order::OrderStatus,
    errors::{ErrorResponse, ServiceError},
    handlers::common::Attachment,
    services::{
        orders::{
            CreateOrderRequest, OrderFilter, OrderView, UpdateOrderRequest,
            UpdateOrderStatusRequest,
        },
        PageRequest,
    },
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
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// List orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders page", body = ApiResponse<Vec<OrderView>>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ServiceError> {
    let paging = PageRequest::new(query.page, state.config.page_size(query.limit));
    let filter = OrderFilter {
        status: query.status,
        customer_id: query.customer_id,
    };
    let page = state.services.orders.list_orders(filter, paging).await?;
    Ok(Json(ApiResponse::paginated(page)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items and customer", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Create a Pending order for a verified customer
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderView>),
        (status = 400, description = "Validation failed or customer not verified", body = ErrorResponse),
        (status = 404, description = "Customer, product or batch not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .create_order(payload, Some(auth_user.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderView>),
        (status = 400, description = "Order is no longer pending", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.update_order(id, payload).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Move an order through its workflow.
///
/// Approval reserves stock; invoicing issues the invoice.
#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<OrderView>),
        (status = 400, description = "Invalid transition or insufficient stock", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.update_status(id, payload.status).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders/export",
    responses((status = 200, description = "orders.csv", content_type = "text/csv")),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn export_orders(State(state): State<AppState>) -> Result<Attachment, ServiceError> {
    let csv = state.services.orders.export_csv().await?;
    Ok(Attachment::csv("orders.csv", csv))
}

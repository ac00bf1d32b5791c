use crate::{
    entities::invoice::{self, InvoiceStatus},
    errors::{ErrorResponse, ServiceError},
    handlers::common::Attachment,
    services::{
        invoices::{CreateInvoiceRequest, InvoiceView, UpdateInvoiceStatusRequest},
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
pub struct InvoiceListQuery {
    pub status: Option<InvoiceStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Lists invoices; Issued invoices past due are flipped to Overdue first.
#[utoipa::path(
    get,
    path = "/api/invoices",
    params(InvoiceListQuery),
    responses((status = 200, description = "Invoices page", body = ApiResponse<Vec<InvoiceView>>)),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<ApiResponse<Vec<InvoiceView>>>, ServiceError> {
    let paging = PageRequest::new(query.page, state.config.page_size(query.limit));
    let page = state
        .services
        .invoices
        .list_invoices(query.status, paging)
        .await?;
    Ok(Json(ApiResponse::paginated(page)))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice", body = ApiResponse<InvoiceView>),
        (status = 404, description = "Invoice not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceView>>, ServiceError> {
    let invoice = state.services.invoices.get_invoice_view(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    post,
    path = "/api/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice issued", body = ApiResponse<invoice::Model>),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Invoice number collision", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state.services.invoices.create_invoice(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(invoice))))
}

#[utoipa::path(
    put,
    path = "/api/invoices/{id}/status",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = UpdateInvoiceStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<invoice::Model>),
        (status = 404, description = "Invoice not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceStatusRequest>,
) -> Result<Json<ApiResponse<invoice::Model>>, ServiceError> {
    let invoice = state
        .services
        .invoices
        .update_status(id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}/pdf",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice document", content_type = "application/pdf"),
        (status = 403, description = "PDF export disabled", body = ErrorResponse),
        (status = 404, description = "Invoice not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn invoice_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Attachment, ServiceError> {
    state.require_pdf_export().await?;
    let (filename, pdf) = state.services.invoices.render_pdf(id).await?;
    Ok(Attachment::pdf(filename, pdf))
}

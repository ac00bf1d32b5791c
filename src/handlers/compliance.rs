use crate::{
    entities::customer::{self, ComplianceStatus},
    errors::{ErrorResponse, ServiceError},
    handlers::common::Attachment,
    services::compliance::{SdsTracker, REGULATORY_EXPORT_FILENAME},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComplianceStatusRequest {
    pub compliance_status: ComplianceStatus,
}

#[utoipa::path(
    get,
    path = "/api/compliance/sds-tracker",
    responses((status = 200, description = "SDS coverage of hazardous products", body = ApiResponse<SdsTracker>)),
    security(("Bearer" = [])),
    tag = "compliance"
)]
pub async fn sds_tracker(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SdsTracker>>, ServiceError> {
    let tracker = state.services.compliance.sds_tracker().await?;
    Ok(Json(ApiResponse::success(tracker)))
}

#[utoipa::path(
    get,
    path = "/api/compliance/regulatory-export",
    responses(
        (status = 200, description = "regulatory_export.csv", content_type = "text/csv"),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "compliance"
)]
pub async fn regulatory_export(State(state): State<AppState>) -> Result<Attachment, ServiceError> {
    let csv = state.services.compliance.regulatory_export_csv().await?;
    Ok(Attachment::csv(REGULATORY_EXPORT_FILENAME, csv))
}

#[utoipa::path(
    put,
    path = "/api/compliance/customers/{id}/status",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = ComplianceStatusRequest,
    responses(
        (status = 200, description = "Compliance status set", body = ApiResponse<customer::Model>),
        (status = 404, description = "Customer not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "compliance"
)]
pub async fn update_customer_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ComplianceStatusRequest>,
) -> Result<Json<ApiResponse<customer::Model>>, ServiceError> {
    let customer = state
        .services
        .compliance
        .set_customer_status(id, payload.compliance_status)
        .await?;
    Ok(Json(ApiResponse::success(customer)))
}

use crate::{
    errors::ServiceError,
    services::{
        batches::BatchView,
        reports::{
            HazmatSales, MonthlySales, ProductMargin, ProductStock, Receivable, RevenueBucket,
            RevenuePeriod, TopCustomer, REPORT_NAMES,
        },
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

const DEFAULT_SALES_MONTHS: u32 = 6;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SalesQuery {
    /// Look-back window in months (default 6)
    pub months: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RevenueQuery {
    pub period: Option<RevenuePeriod>,
}

type ReportResult<T> = Result<Json<ApiResponse<Vec<T>>>, ServiceError>;

#[utoipa::path(
    get,
    path = "/api/reports",
    responses((status = 200, description = "Available report names", body = ApiResponse<Vec<String>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn list_reports() -> Json<ApiResponse<Vec<&'static str>>> {
    Json(ApiResponse::success(REPORT_NAMES.to_vec()))
}

#[utoipa::path(
    get,
    path = "/api/reports/sales",
    params(SalesQuery),
    responses((status = 200, description = "Monthly sales", body = ApiResponse<Vec<MonthlySales>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn sales(
    State(state): State<AppState>,
    Query(query): Query<SalesQuery>,
) -> ReportResult<MonthlySales> {
    let months = query.months.unwrap_or(DEFAULT_SALES_MONTHS);
    let rows = state.services.reports.sales(months).await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/reports/revenue",
    params(RevenueQuery),
    responses((status = 200, description = "Paid revenue by period", body = ApiResponse<Vec<RevenueBucket>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn revenue(
    State(state): State<AppState>,
    Query(query): Query<RevenueQuery>,
) -> ReportResult<RevenueBucket> {
    let rows = state
        .services
        .reports
        .revenue(query.period.unwrap_or_default())
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/reports/top-customers",
    responses((status = 200, description = "Top 10 customers by spend", body = ApiResponse<Vec<TopCustomer>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn top_customers(State(state): State<AppState>) -> ReportResult<TopCustomer> {
    let rows = state.services.reports.top_customers().await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/reports/inventory-turnover",
    responses((status = 200, description = "Stock levels, lowest first", body = ApiResponse<Vec<ProductStock>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn inventory_turnover(State(state): State<AppState>) -> ReportResult<ProductStock> {
    let rows = state.services.reports.inventory_turnover().await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/reports/margins",
    responses((status = 200, description = "Per product revenue and average sell price", body = ApiResponse<Vec<ProductMargin>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn margins(State(state): State<AppState>) -> ReportResult<ProductMargin> {
    let rows = state.services.reports.margins().await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/reports/expiration-risk",
    responses((status = 200, description = "Batches expiring within 90 days", body = ApiResponse<Vec<BatchView>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn expiration_risk(State(state): State<AppState>) -> ReportResult<BatchView> {
    let rows = state.services.reports.expiration_risk().await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/reports/hazmat-sales",
    responses((status = 200, description = "Hazardous product sales", body = ApiResponse<Vec<HazmatSales>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn hazmat_sales(State(state): State<AppState>) -> ReportResult<HazmatSales> {
    let rows = state.services.reports.hazmat_sales().await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/reports/outstanding-receivables",
    responses((status = 200, description = "Unpaid invoices by due date", body = ApiResponse<Vec<Receivable>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn outstanding_receivables(State(state): State<AppState>) -> ReportResult<Receivable> {
    let rows = state.services.reports.outstanding_receivables().await?;
    Ok(Json(ApiResponse::success(rows)))
}

//! ChemOps API Library
//!
//! Sales, inventory and billing backend for chemical distribution.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;
pub mod webhooks;

use axum::{
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};
use crate::entities::audit_log::{AuditAction, AuditEntityType};
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::middleware_helpers::AuditRouterExt;
use crate::services::{features::FeatureFlags, Page};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
    pub features: FeatureFlags,
}

impl AppState {
    /// Wires every service from configuration and a connected pool.
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: Arc<EventSender>,
        features: FeatureFlags,
    ) -> Result<Self, ServiceError> {
        let auth = Arc::new(AuthService::new(
            auth::AuthConfig::from(&config),
            db.clone(),
        ));
        let services = handlers::AppServices::new(
            db.clone(),
            &config,
            event_sender.clone(),
            auth.clone(),
            features.clone(),
        )?;
        Ok(Self {
            db,
            config,
            event_sender,
            auth,
            services,
            features,
        })
    }

    pub async fn require_csv_import(&self) -> Result<(), ServiceError> {
        if self.features.snapshot().await.enable_csv_import {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("CSV import is disabled".to_string()))
        }
    }

    pub async fn require_pdf_export(&self) -> Result<(), ServiceError> {
        if self.features.snapshot().await.enable_pdf_export {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("PDF export is disabled".to_string()))
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present on paginated listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            total: None,
            page: None,
            pages: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn paginated(page: Page<T>) -> Self {
        Self {
            total: Some(page.total),
            page: Some(page.page),
            pages: Some(page.pages),
            ..Self::success(page.items)
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn paginated_response_carries_totals() {
        let response = ApiResponse::paginated(Page::new(vec![1, 2], 12, 2, 5));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total"], 12);
        assert_eq!(json["page"], 2);
        assert_eq!(json["pages"], 3);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert!(json.get("message").is_none());
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthStatus)),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// All `/api` routes with permission gating and audit layers.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    use handlers::{
        admin, audit, auth as auth_handlers, batches, compliance, customers, invoices, orders,
        products, reports, webhooks,
    };
    let audit_log = &state.services.audit;

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(auth_handlers::login));

    // Reads open to every signed-in user
    let reads = Router::new()
        .route("/auth/me", get(auth_handlers::me))
        .route("/products", get(products::list_products))
        .route("/products/export", get(products::export_products))
        .route("/products/:id", get(products::get_product))
        .route("/products/:id/batches", get(products::product_batches))
        .route("/batches", get(batches::list_batches))
        .route("/batches/:id", get(batches::get_batch))
        .route("/customers", get(customers::list_customers))
        .route("/customers/export", get(customers::export_customers))
        .route("/customers/:id", get(customers::get_customer))
        .route("/orders", get(orders::list_orders))
        .route("/orders/export", get(orders::export_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/invoices", get(invoices::list_invoices))
        .route("/invoices/:id", get(invoices::get_invoice))
        .route("/invoices/:id/pdf", get(invoices::invoice_pdf))
        .route("/export/products", get(products::export_products))
        .route("/export/customers", get(customers::export_customers))
        .route("/export/orders", get(orders::export_orders))
        .route("/compliance/sds-tracker", get(compliance::sds_tracker))
        .route("/reports", get(reports::list_reports))
        .route("/reports/sales", get(reports::sales))
        .route("/reports/revenue", get(reports::revenue))
        .route("/reports/top-customers", get(reports::top_customers))
        .route("/reports/inventory-turnover", get(reports::inventory_turnover))
        .route("/reports/margins", get(reports::margins))
        .route("/reports/expiration-risk", get(reports::expiration_risk))
        .route("/reports/hazmat-sales", get(reports::hazmat_sales))
        .route(
            "/reports/outstanding-receivables",
            get(reports::outstanding_receivables),
        )
        .with_auth();

    // Products
    let products_create = Router::new()
        .route("/products", post(products::create_product))
        .audited(audit_log, AuditEntityType::Product, AuditAction::Create)
        .with_permission(perm::PRODUCTS_WRITE);
    let products_update = Router::new()
        .route("/products/:id", put(products::update_product))
        .audited(audit_log, AuditEntityType::Product, AuditAction::Update)
        .with_permission(perm::PRODUCTS_WRITE);
    let products_import = Router::new()
        .route("/products/import", post(products::import_products))
        .route("/import/products", post(products::import_products))
        .with_permission(perm::PRODUCTS_WRITE);
    let products_archive = Router::new()
        .route("/products/:id", axum::routing::delete(products::archive_product))
        .audited(audit_log, AuditEntityType::Product, AuditAction::Archive)
        .with_permission(perm::PRODUCTS_ARCHIVE);

    // Batches
    let batches_create = Router::new()
        .route("/batches", post(batches::create_batch))
        .audited(audit_log, AuditEntityType::Batch, AuditAction::Create)
        .with_permission(perm::BATCHES_WRITE);
    let batches_update = Router::new()
        .route("/batches/:id", put(batches::update_batch))
        .audited(audit_log, AuditEntityType::Batch, AuditAction::Update)
        .with_permission(perm::BATCHES_WRITE);
    let batches_delete = Router::new()
        .route("/batches/:id", axum::routing::delete(batches::delete_batch))
        .audited(audit_log, AuditEntityType::Batch, AuditAction::Delete)
        .with_permission(perm::BATCHES_DELETE);

    // Customers
    let customers_create = Router::new()
        .route("/customers", post(customers::create_customer))
        .audited(audit_log, AuditEntityType::Customer, AuditAction::Create)
        .with_permission(perm::CUSTOMERS_CREATE);
    let customers_import = Router::new()
        .route("/customers/import", post(customers::import_customers))
        .route("/import/customers", post(customers::import_customers))
        .with_permission(perm::CUSTOMERS_CREATE);
    let customers_update = Router::new()
        .route("/customers/:id", put(customers::update_customer))
        .audited(audit_log, AuditEntityType::Customer, AuditAction::Update)
        .with_permission(perm::CUSTOMERS_UPDATE);
    let customers_delete = Router::new()
        .route("/customers/:id", axum::routing::delete(customers::delete_customer))
        .audited(audit_log, AuditEntityType::Customer, AuditAction::Delete)
        .with_permission(perm::CUSTOMERS_DELETE);

    // Orders
    let orders_create = Router::new()
        .route("/orders", post(orders::create_order))
        .audited(audit_log, AuditEntityType::Order, AuditAction::Create)
        .with_permission(perm::ORDERS_WRITE);
    let orders_update = Router::new()
        .route("/orders/:id", put(orders::update_order))
        .audited(audit_log, AuditEntityType::Order, AuditAction::Update)
        .with_permission(perm::ORDERS_WRITE);
    let orders_status = Router::new()
        .route("/orders/:id/status", put(orders::update_order_status))
        .audited(audit_log, AuditEntityType::Order, AuditAction::StatusChange)
        .with_permission(perm::ORDERS_STATUS);

    // Invoices
    let invoices_create = Router::new()
        .route("/invoices", post(invoices::create_invoice))
        .audited(audit_log, AuditEntityType::Invoice, AuditAction::Create)
        .with_permission(perm::INVOICES_WRITE);
    let invoices_status = Router::new()
        .route("/invoices/:id/status", put(invoices::update_invoice_status))
        .audited(audit_log, AuditEntityType::Invoice, AuditAction::StatusChange)
        .with_permission(perm::INVOICES_WRITE);

    // Compliance
    let compliance_export = Router::new()
        .route("/compliance/regulatory-export", get(compliance::regulatory_export))
        .with_permission(perm::COMPLIANCE_MANAGE);
    let compliance_status = Router::new()
        .route(
            "/compliance/customers/:id/status",
            put(compliance::update_customer_status),
        )
        .audited(audit_log, AuditEntityType::Customer, AuditAction::StatusChange)
        .with_permission(perm::COMPLIANCE_MANAGE);

    let audit_read = Router::new()
        .route("/audit", get(audit::list_audit_logs))
        .route("/audit/:entity_type/:entity_id", get(audit::entity_history))
        .with_permission(perm::AUDIT_READ);

    // Webhooks
    let webhooks_read = Router::new()
        .route("/webhooks", get(webhooks::list_webhooks))
        .route("/webhooks/:id/test", post(webhooks::test_webhook))
        .with_permission(perm::WEBHOOKS_MANAGE);
    let webhooks_create = Router::new()
        .route("/webhooks", post(webhooks::create_webhook))
        .audited(audit_log, AuditEntityType::Webhook, AuditAction::Create)
        .with_permission(perm::WEBHOOKS_MANAGE);
    let webhooks_update = Router::new()
        .route("/webhooks/:id", put(webhooks::update_webhook))
        .audited(audit_log, AuditEntityType::Webhook, AuditAction::Update)
        .with_permission(perm::WEBHOOKS_MANAGE);
    let webhooks_delete = Router::new()
        .route("/webhooks/:id", axum::routing::delete(webhooks::delete_webhook))
        .audited(audit_log, AuditEntityType::Webhook, AuditAction::Delete)
        .with_permission(perm::WEBHOOKS_MANAGE);

    // Users and settings
    let users_read = Router::new()
        .route("/admin/users", get(admin::list_users))
        .with_permission(perm::USERS_MANAGE);
    let users_create = Router::new()
        .route("/admin/users", post(admin::create_user))
        .route("/auth/register", post(auth_handlers::register))
        .audited(audit_log, AuditEntityType::User, AuditAction::Create)
        .with_permission(perm::USERS_MANAGE);
    let users_update = Router::new()
        .route("/admin/users/:id", put(admin::update_user))
        .audited(audit_log, AuditEntityType::User, AuditAction::Update)
        .with_permission(perm::USERS_MANAGE);
    let settings = Router::new()
        .route(
            "/admin/features",
            get(admin::get_features).put(admin::update_features),
        )
        .route("/admin/alerts", get(admin::alerts))
        .with_permission(perm::SETTINGS_MANAGE);

    Router::new()
        .merge(public)
        .merge(reads)
        .merge(products_create)
        .merge(products_update)
        .merge(products_import)
        .merge(products_archive)
        .merge(batches_create)
        .merge(batches_update)
        .merge(batches_delete)
        .merge(customers_create)
        .merge(customers_import)
        .merge(customers_update)
        .merge(customers_delete)
        .merge(orders_create)
        .merge(orders_update)
        .merge(orders_status)
        .merge(invoices_create)
        .merge(invoices_status)
        .merge(compliance_export)
        .merge(compliance_status)
        .merge(audit_read)
        .merge(webhooks_read)
        .merge(webhooks_create)
        .merge(webhooks_update)
        .merge(webhooks_delete)
        .merge(users_read)
        .merge(users_create)
        .merge(users_update)
        .merge(settings)
}

/// The complete application: API, Swagger UI, tracing and request ids.
pub fn app_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;
    Router::new()
        .nest("/api", api_routes(&state))
        .merge(openapi::swagger_ui())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state.auth.clone()))
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

pub mod admin;
pub mod audit;
pub mod auth;
pub mod batches;
pub mod common;
pub mod compliance;
pub mod customers;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod reports;
pub mod webhooks;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        alerts::AlertService, audit::AuditService, batches::BatchService,
        compliance::ComplianceService, customers::CustomerService, features::FeatureFlags,
        invoices::InvoiceService, orders::OrderService, products::ProductService,
        reports::ReportService, users::UserService, webhooks::WebhookService,
    },
    webhooks::WebhookDispatcher,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub batches: Arc<BatchService>,
    pub customers: Arc<CustomerService>,
    pub orders: Arc<OrderService>,
    pub invoices: Arc<InvoiceService>,
    pub alerts: Arc<AlertService>,
    pub compliance: Arc<ComplianceService>,
    pub reports: Arc<ReportService>,
    pub audit: Arc<AuditService>,
    pub users: Arc<UserService>,
    pub webhooks: Arc<WebhookService>,
    pub dispatcher: Arc<WebhookDispatcher>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        features: FeatureFlags,
    ) -> Result<Self, ServiceError> {
        let dispatcher = Arc::new(WebhookDispatcher::new(
            db_pool.clone(),
            config.webhook_timeout(),
            features.clone(),
        )?);
        let alerts = Arc::new(AlertService::new(db_pool.clone(), event_sender.clone()));
        let customers = Arc::new(CustomerService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.default_currency.clone(),
        ));

        Ok(Self {
            products: Arc::new(ProductService::new(
                db_pool.clone(),
                config.default_currency.clone(),
            )),
            batches: Arc::new(BatchService::new(db_pool.clone())),
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                alerts.clone(),
                config.default_tax_rate_decimal(),
                config.invoice_due_days,
            )),
            invoices: Arc::new(InvoiceService::new(
                db_pool.clone(),
                event_sender,
                config.invoice_due_days,
            )),
            compliance: Arc::new(ComplianceService::new(db_pool.clone(), customers.clone())),
            reports: Arc::new(ReportService::new(db_pool.clone())),
            audit: Arc::new(AuditService::new(db_pool.clone(), features)),
            users: Arc::new(UserService::new(db_pool.clone(), auth_service)),
            webhooks: Arc::new(WebhookService::new(db_pool, dispatcher.clone())),
            customers,
            alerts,
            dispatcher,
        })
    }
}

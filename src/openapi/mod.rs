use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ChemOps API",
        version = "0.1.0",
        description = r#"
# ChemOps Sales and Billing API

Back office for a chemical distributor: hazard-aware product catalog, batch stock, customer
compliance, orders, invoices and signed webhooks.

## Authentication

Call `POST /api/auth/login` and send the returned token on every other request:

```
Authorization: Bearer <token>
```

Roles (Admin, Sales, Finance, Compliance) grant permissions; a missing permission answers 403.

## Order workflow

`Pending → Approved → Shipped → Invoiced → Paid`, with `Cancelled` reachable from Pending and
Approved. Approval reserves stock atomically; invoicing issues an `INV-YYYY-NNNN` invoice.

## Errors

```json
{
  "success": false,
  "error": "Bad Request",
  "message": "Cannot transition from Pending to Invoiced",
  "request_id": "0b7d...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 50) and answer with `total`,
`page` and `pages` next to `data`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:5000", description = "Local development")),
    tags(
        (name = "auth", description = "Login, registration and the current user"),
        (name = "products", description = "Chemical product catalog"),
        (name = "batches", description = "Lot-level stock with expiration dates"),
        (name = "customers", description = "Customer accounts and compliance state"),
        (name = "orders", description = "Order capture and workflow"),
        (name = "invoices", description = "Invoices, payment and PDF documents"),
        (name = "compliance", description = "SDS coverage and regulatory exports"),
        (name = "reports", description = "Sales, revenue and stock reports"),
        (name = "audit", description = "Audit trail"),
        (name = "webhooks", description = "Outbound event subscriptions"),
        (name = "admin", description = "Users, feature flags and alerts"),
        (name = "health", description = "Liveness")
    ),
    paths(
        crate::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::register,
        crate::handlers::auth::me,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::product_batches,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::archive_product,
        crate::handlers::products::import_products,
        crate::handlers::products::export_products,
        crate::handlers::batches::list_batches,
        crate::handlers::batches::get_batch,
        crate::handlers::batches::create_batch,
        crate::handlers::batches::update_batch,
        crate::handlers::batches::delete_batch,
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::customers::import_customers,
        crate::handlers::customers::export_customers,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::export_orders,
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::update_invoice_status,
        crate::handlers::invoices::invoice_pdf,
        crate::handlers::compliance::sds_tracker,
        crate::handlers::compliance::regulatory_export,
        crate::handlers::compliance::update_customer_status,
        crate::handlers::reports::list_reports,
        crate::handlers::reports::sales,
        crate::handlers::reports::revenue,
        crate::handlers::reports::top_customers,
        crate::handlers::reports::inventory_turnover,
        crate::handlers::reports::margins,
        crate::handlers::reports::expiration_risk,
        crate::handlers::reports::hazmat_sales,
        crate::handlers::reports::outstanding_receivables,
        crate::handlers::audit::list_audit_logs,
        crate::handlers::audit::entity_history,
        crate::handlers::webhooks::list_webhooks,
        crate::handlers::webhooks::create_webhook,
        crate::handlers::webhooks::update_webhook,
        crate::handlers::webhooks::delete_webhook,
        crate::handlers::webhooks::test_webhook,
        crate::handlers::admin::list_users,
        crate::handlers::admin::create_user,
        crate::handlers::admin::update_user,
        crate::handlers::admin::get_features,
        crate::handlers::admin::update_features,
        crate::handlers::admin::alerts,
    ),
    components(schemas(crate::errors::ErrorResponse, crate::HealthStatus)),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_routes() {
        let json = ApiDocV1::openapi().to_json().unwrap();
        assert!(json.contains("ChemOps API"));
        assert!(json.contains("/api/orders/{id}/status"));
        assert!(json.contains("/api/invoices/{id}/pdf"));
        assert!(json.contains("\"Bearer\""));
    }
}

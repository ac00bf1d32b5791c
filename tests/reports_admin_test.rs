mod common;

use axum::http::{header, Method, StatusCode};
use chemops_api::entities::user::UserRole;
use chrono::{Duration, Utc};
use common::{id_of, pdf_strings, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

/// Walks a fresh order to `Invoiced` and returns (order, invoice).
async fn invoiced_order(app: &TestApp, customer_id: &str, product_id: &str, qty: i64) -> (Value, Value) {
    let order = app.create_order(customer_id, product_id, qty).await;
    for target in ["Approved", "Shipped", "Invoiced"] {
        let (status, body) = app.set_order_status(&id_of(&order), target).await;
        assert_eq!(status, StatusCode::OK, "{target}: {body}");
    }
    let (_, invoices) = app.get(UserRole::Finance, "/api/invoices").await;
    let invoice = invoices["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|inv| inv["order_id"] == order["id"])
        .cloned()
        .expect("invoice for order");
    (order, invoice)
}

#[tokio::test]
async fn report_index_lists_every_report() {
    let app = TestApp::new().await;
    let (status, body) = app.get(UserRole::Sales, "/api/reports").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(names.contains(&"sales"));
    assert!(names.contains(&"outstanding-receivables"));
    assert_eq!(names.len(), 8);
}

#[tokio::test]
async fn sales_and_revenue_reflect_paid_business() {
    let app = TestApp::new().await;
    let product = app.create_product("Ethanol 99.9%", 500, "3.80").await;
    let customer = app.create_customer("ChemTech Industries", "Verified").await;
    let (_, invoice) = invoiced_order(&app, &id_of(&customer), &id_of(&product), 200).await;

    // Pending orders are not sales
    app.create_order(&id_of(&customer), &id_of(&product), 1).await;

    let (status, sales) = app.get(UserRole::Finance, "/api/reports/sales?months=1").await;
    assert_eq!(status, StatusCode::OK);
    let rows = sales["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["orders"], 1);
    assert_eq!(decimal(&rows[0]["revenue"]), Decimal::from(836));

    let (_, revenue) = app.get(UserRole::Finance, "/api/reports/revenue").await;
    assert_eq!(revenue["data"].as_array().map(Vec::len), Some(0));

    app.put(
        UserRole::Finance,
        &format!("/api/invoices/{}/status", id_of(&invoice)),
        json!({"status": "Paid"}),
    )
    .await;

    let (_, revenue) = app
        .get(UserRole::Finance, "/api/reports/revenue?period=quarterly")
        .await;
    let buckets = revenue["data"].as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert!(buckets[0]["quarter"].is_number());
    assert!(buckets[0].get("month").map_or(true, Value::is_null));
    assert_eq!(decimal(&buckets[0]["total_revenue"]), Decimal::from(836));
}

#[tokio::test]
async fn customer_and_product_rankings_skip_cancelled_orders() {
    let app = TestApp::new().await;
    let acid = app.create_product("Sulfuric Acid 98%", 1000, "2.50").await;
    let big = app.create_customer("Global Pharma Supply", "Verified").await;
    let small = app.create_customer("EcoClean Solutions", "Verified").await;

    invoiced_order(&app, &id_of(&big), &id_of(&acid), 100).await;
    invoiced_order(&app, &id_of(&small), &id_of(&acid), 10).await;
    let cancelled = app.create_order(&id_of(&small), &id_of(&acid), 400).await;
    app.set_order_status(&id_of(&cancelled), "Cancelled").await;

    let (_, top) = app.get(UserRole::Sales, "/api/reports/top-customers").await;
    let top = top["data"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["company_name"], "Global Pharma Supply");
    assert_eq!(top[0]["orders"], 1);

    let (_, margins) = app.get(UserRole::Finance, "/api/reports/margins").await;
    let row = &margins["data"][0];
    assert_eq!(row["name"], "Sulfuric Acid 98%");
    assert_eq!(row["total_qty"], 110);
    assert_eq!(decimal(&row["total_revenue"]), Decimal::from(275));
    assert_eq!(decimal(&row["avg_sell_price"]), Decimal::from_str("2.5").unwrap());

    let (_, hazmat) = app.get(UserRole::Compliance, "/api/reports/hazmat-sales").await;
    assert_eq!(hazmat["data"][0]["total_qty"], 110);
    assert_eq!(hazmat["data"][0]["hazard_class"], "Class 8 - Corrosive");

    let (_, turnover) = app
        .get(UserRole::Sales, "/api/reports/inventory-turnover")
        .await;
    assert_eq!(turnover["data"][0]["inventory_level"], 890);
}

#[tokio::test]
async fn receivables_list_unpaid_invoices_with_contacts() {
    let app = TestApp::new().await;
    let product = app.create_product("Acetone", 100, "2.90").await;
    let customer = app.create_customer("NovaChem Labs", "Verified").await;
    let order = app.create_order(&id_of(&customer), &id_of(&product), 10).await;
    let (status, invoice) = app
        .post(UserRole::Finance, "/api/invoices", json!({"order_id": id_of(&order)}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, open) = app
        .get(UserRole::Finance, "/api/reports/outstanding-receivables")
        .await;
    let rows = open["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], invoice["data"]["id"]);
    assert_eq!(rows[0]["company_name"], "NovaChem Labs");
    assert_eq!(rows[0]["contact_email"], "buyer@example.com");

    app.put(
        UserRole::Finance,
        &format!("/api/invoices/{}/status", id_of(&invoice["data"])),
        json!({"status": "Paid"}),
    )
    .await;
    let (_, open) = app
        .get(UserRole::Finance, "/api/reports/outstanding-receivables")
        .await;
    assert_eq!(open["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn expiration_risk_covers_the_next_ninety_days() {
    let app = TestApp::new().await;
    let product = app.create_product("Hydrogen Peroxide 35%", 0, "5.60").await;
    for (number, days) in [("SOON", 20), ("LATER", 200)] {
        let (status, _) = app
            .post(
                UserRole::Sales,
                "/api/batches",
                json!({
                    "product_id": id_of(&product),
                    "batch_number": number,
                    "quantity": 10,
                    "expiration_date": (Utc::now() + Duration::days(days)).to_rfc3339()
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, risk) = app.get(UserRole::Sales, "/api/reports/expiration-risk").await;
    let rows = risk["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["batch_number"], "SOON");
}

#[tokio::test]
async fn mutations_leave_an_audit_trail() {
    let app = TestApp::new().await;
    let product = app.create_product("Toluene", 40, "4.10").await;
    let uri = format!("/api/products/{}", id_of(&product));
    let (status, _) = app
        .put(UserRole::Sales, &uri, json!({"price": "4.25"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, history) = app
        .get(
            UserRole::Compliance,
            &format!("/api/audit/Product/{}", id_of(&product)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = history["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let update = entries
        .iter()
        .find(|e| e["action"] == "UPDATE")
        .expect("update entry");
    assert_eq!(update["changed_fields"]["price"], "4.25");
    assert_eq!(update["user"]["email"], "sales@chemops.test");
    let create = entries
        .iter()
        .find(|e| e["action"] == "CREATE")
        .expect("create entry");
    assert!(create["changed_fields"].is_null());

    let sales_id = app.user_for(UserRole::Sales).id;
    let (_, by_user) = app
        .get(UserRole::Finance, &format!("/api/audit?user_id={sales_id}"))
        .await;
    assert_eq!(by_user["total"], 1);
}

#[tokio::test]
async fn audit_entries_never_store_secrets() {
    let app = TestApp::new().await;
    let sales_id = app.user_for(UserRole::Sales).id;
    let (status, _) = app
        .put(
            UserRole::Admin,
            &format!("/api/admin/users/{sales_id}"),
            json!({"name": "Renamed", "password": "new-secret-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = app
        .get(UserRole::Admin, &format!("/api/audit/User/{sales_id}"))
        .await;
    let changed = &history["data"][0]["changed_fields"];
    assert_eq!(changed["name"], "Renamed");
    assert!(changed.get("password").is_none());
}

#[tokio::test]
async fn audit_logging_can_be_switched_off() {
    let app = TestApp::new().await;
    app.put(
        UserRole::Admin,
        "/api/admin/features",
        json!({"enable_audit_logs": false}),
    )
    .await;
    app.create_product("Xylene", 10, "3.15").await;

    let (_, logs) = app.get(UserRole::Admin, "/api/audit?entity_type=Product").await;
    assert_eq!(logs["total"], 0);
}

#[tokio::test]
async fn invoice_pdf_downloads_as_attachment() {
    let app = TestApp::new().await;
    let product = app.create_product("Methanol Technical Grade", 100, "1.75").await;
    let customer = app.create_customer("Müller Chemie GmbH", "Verified").await;
    let (_, invoice) = invoiced_order(&app, &id_of(&customer), &id_of(&product), 12).await;
    let number = invoice["invoice_number"].as_str().unwrap();
    let uri = format!("/api/invoices/{}/pdf", id_of(&invoice));

    let (status, headers, bytes) = app.download(UserRole::Sales, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION].to_str().unwrap(),
        format!("attachment; filename=\"{number}.pdf\"")
    );
    assert!(bytes.starts_with(b"%PDF-"));
    let drawn = pdf_strings(&bytes);
    assert!(drawn.contains(&format!("Invoice #: {number}").into_bytes()));
    // WinAnsi keeps the umlaut as a single 0xFC byte
    assert!(drawn.contains(&b"M\xfcller Chemie GmbH".to_vec()));
    assert!(drawn.contains(&b"Methanol Technical Grade".to_vec()));

    app.put(
        UserRole::Admin,
        "/api/admin/features",
        json!({"enable_pdf_export": false}),
    )
    .await;
    let (status, body) = app.get(UserRole::Sales, &uri).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "PDF export is disabled");
}

#[tokio::test]
async fn feature_updates_merge_with_current_flags() {
    let app = TestApp::new().await;
    let (_, before) = app.get(UserRole::Admin, "/api/admin/features").await;
    assert_eq!(before["data"]["enable_webhooks"], true);
    assert_eq!(before["data"]["maintenance_mode"], false);

    let (status, after) = app
        .put(
            UserRole::Admin,
            "/api/admin/features",
            json!({"maintenance_mode": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["data"]["maintenance_mode"], true);
    assert_eq!(after["data"]["enable_webhooks"], true);

    // Stored only; the API keeps serving
    let (status, _) = app.get(UserRole::Sales, "/api/products").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn low_stock_alerts_follow_reorder_thresholds() {
    let app = TestApp::new().await;
    app.create_product("Sodium Hydroxide", 5, "1.20").await;
    app.create_product("Calcium Carbonate", 800, "0.25").await;

    let (status, alerts) = app.get(UserRole::Admin, "/api/admin/alerts").await;
    assert_eq!(status, StatusCode::OK);
    let low = alerts["data"]["low_stock"].as_array().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["name"], "Sodium Hydroxide");
}

#[tokio::test]
async fn admins_manage_users() {
    let app = TestApp::new().await;
    let (status, created) = app
        .post(
            UserRole::Admin,
            "/api/admin/users",
            json!({"name": "Auditor", "email": "auditor@chemops.test", "password": "audit-pass", "role": "Compliance"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert!(created["data"].get("password_hash").is_none());

    let (_, users) = app.get(UserRole::Admin, "/api/admin/users").await;
    assert_eq!(users["data"].as_array().map(Vec::len), Some(5));

    let (status, body) = app
        .post(
            UserRole::Admin,
            "/api/admin/users",
            json!({"name": "No Password", "email": "nopass@chemops.test"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn sds_tracker_counts_missing_sheets() {
    let app = TestApp::new().await;
    let documented = app.create_product("Hydrochloric Acid 37%", 10, "3.10").await;
    app.create_product("Nitric Acid 68%", 10, "4.40").await;
    app.put(
        UserRole::Admin,
        &format!("/api/products/{}", id_of(&documented)),
        json!({"sds_document_url": "https://sds.example.com/hcl.pdf"}),
    )
    .await;

    let (status, tracker) = app
        .get(UserRole::Compliance, "/api/compliance/sds-tracker")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracker["data"]["total"], 2);
    assert_eq!(tracker["data"]["with_sds"], 1);
    assert_eq!(tracker["data"]["without_sds"], 1);
}

#[tokio::test]
async fn regulatory_export_is_a_csv_attachment() {
    let app = TestApp::new().await;
    app.create_product("Acetone", 10, "2.90").await;

    let (status, headers, bytes) = app
        .download(UserRole::Compliance, "/api/compliance/regulatory-export")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"regulatory_export.csv\""
    );
    let text = String::from_utf8(bytes).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("name,cas_number,un_number,hazard_classification,storage_requirements,sds_document_url,unit_of_measure")
    );
    assert!(lines.next().unwrap().starts_with("Acetone,7664-93-9,UN1830,"));
}

#[tokio::test]
async fn compliance_officers_set_customer_status() {
    let app = TestApp::new().await;
    let customer = app.create_customer("EcoClean Solutions", "Pending").await;
    let uri = format!("/api/compliance/customers/{}/status", id_of(&customer));

    let (status, _) = app
        .put(UserRole::Sales, &uri, json!({"compliance_status": "Verified"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(UserRole::Compliance, &uri, json!({"compliance_status": "Verified"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["compliance_status"], "Verified");

    let (_, history) = app
        .get(
            UserRole::Compliance,
            &format!("/api/audit/Customer/{}", id_of(&customer)),
        )
        .await;
    assert!(history["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["action"] == "STATUS_CHANGE"));

    let (status, _) = app
        .call(
            UserRole::Compliance,
            Method::PUT,
            &format!("/api/compliance/customers/{}/status", uuid::Uuid::new_v4()),
            Some(json!({"compliance_status": "Rejected"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

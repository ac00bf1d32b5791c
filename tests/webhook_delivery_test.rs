mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chemops_api::{
    entities::{invoice, user::UserRole},
    webhooks::SIGNATURE_HEADER,
};
use chrono::{Datelike, Utc};
use common::{eventually, id_of, parse_uuid, TestApp};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use sha2::Sha256;
use std::str::FromStr;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const SECRET: &str = "whsec_integration";

fn expected_signature(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

/// Envelopes received so far for `event`.
async fn deliveries(server: &MockServer, event: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|req| serde_json::from_slice::<Value>(&req.body).ok())
        .filter(|envelope| envelope["event"] == event)
        .collect()
}

/// Waits until at least `count` deliveries of `event` have arrived.
async fn await_deliveries(server: &MockServer, event: &str, count: usize) -> Vec<Value> {
    let arrived = eventually(Duration::from_secs(5), move || async move {
        deliveries(server, event).await.len() >= count
    })
    .await;
    assert!(arrived, "expected {count} `{event}` deliveries");
    deliveries(server, event).await
}

async fn accepting_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn register_hook(app: &TestApp, server: &MockServer, events: Value) -> Value {
    let (status, body) = app
        .post(
            UserRole::Admin,
            "/api/webhooks",
            json!({
                "url": format!("{}/hooks", server.uri()),
                "events": events,
                "secret": SECRET,
                "description": "integration listener"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn order_creation_is_delivered_with_a_valid_signature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    let hook = register_hook(&app, &server, json!(["order.created"])).await;
    let product = app.create_product("Acetone", 50, "2.90").await;
    let customer = app.create_customer("ChemTech Industries", "Verified").await;
    let order = app.create_order(&id_of(&customer), &id_of(&product), 4).await;

    let srv = &server;
    let arrived = eventually(Duration::from_secs(5), move || async move {
        srv
            .received_requests()
            .await
            .map(|reqs| !reqs.is_empty())
            .unwrap_or(false)
    })
    .await;
    assert!(arrived, "webhook was never delivered");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "only subscribed events are delivered");
    let request = &requests[0];
    let signature = request
        .headers
        .get(SIGNATURE_HEADER)
        .expect("signature header present")
        .to_str()
        .unwrap();
    assert_eq!(signature, expected_signature(&request.body));

    let envelope: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope["event"], "order.created");
    assert_eq!(envelope["payload"]["order_id"], order["id"]);
    assert!(envelope["timestamp"].is_string());

    let (app_ref, hook_id) = (&app, hook["id"].clone());
    let touched = eventually(Duration::from_secs(2), move || {
        let hook_id = hook_id.clone();
        async move {
            let (_, hooks) = app_ref.get(UserRole::Admin, "/api/webhooks").await;
            hooks["data"]
                .as_array()
                .and_then(|all| all.iter().find(|h| h["id"] == hook_id))
                .map(|h| !h["last_triggered_at"].is_null())
                .unwrap_or(false)
        }
    })
    .await;
    assert!(touched, "last_triggered_at was not recorded");
}

#[tokio::test]
async fn failing_endpoints_never_fail_the_business_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    register_hook(&app, &server, json!(["order.created", "order.status_changed"])).await;
    let product = app.create_product("Ethanol", 50, "3.80").await;
    let customer = app.create_customer("NovaChem Labs", "Verified").await;
    let order = app.create_order(&id_of(&customer), &id_of(&product), 4).await;

    let (status, _) = app.set_order_status(&id_of(&order), "Approved").await;
    assert_eq!(status, StatusCode::OK);

    let srv = &server;
    let attempted = eventually(Duration::from_secs(5), move || async move {
        srv
            .received_requests()
            .await
            .map(|reqs| reqs.len() >= 2)
            .unwrap_or(false)
    })
    .await;
    assert!(attempted);
}

#[tokio::test]
async fn test_endpoint_reports_delivery_to_that_hook_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    let hook = register_hook(&app, &server, json!(["invoice.paid"])).await;

    let (status, body) = app
        .post(
            UserRole::Admin,
            &format!("/api/webhooks/{}/test", id_of(&hook)),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["event"], "invoice.paid");
    assert_eq!(body["data"]["delivered"], true);
    assert_eq!(body["data"]["status"], 204);

    let requests = server.received_requests().await.unwrap();
    let envelope: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope["payload"]["test"], true);
    assert_eq!(envelope["payload"]["webhook_id"], hook["id"]);
}

#[tokio::test]
async fn webhooks_respect_the_feature_switch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    register_hook(&app, &server, json!(["order.created"])).await;
    app.put(
        UserRole::Admin,
        "/api/admin/features",
        json!({"enable_webhooks": false}),
    )
    .await;

    let product = app.create_product("Acetone", 50, "2.90").await;
    let customer = app.create_customer("ChemTech Industries", "Verified").await;
    app.create_order(&id_of(&customer), &id_of(&product), 1).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn webhook_registration_validates_events_and_generates_secrets() {
    let server = MockServer::start().await;
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            UserRole::Admin,
            "/api/webhooks",
            json!({"url": server.uri(), "events": ["order.deleted"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("order.deleted"));

    let (status, body) = app
        .post(
            UserRole::Admin,
            "/api/webhooks",
            json!({"url": server.uri(), "events": ["invoice.created"]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let secret = body["data"]["secret"].as_str().unwrap();
    assert_eq!(secret.len(), 64);
    assert_eq!(body["data"]["created_by"], json!(app.user_for(UserRole::Admin).id));
}

#[tokio::test]
async fn approval_reaching_the_threshold_announces_low_stock_and_new_status() {
    let server = accepting_server().await;
    let app = TestApp::new().await;
    register_hook(&app, &server, json!(["product.low_stock", "order.status_changed"])).await;

    // Threshold is 10; approving 4 of 14 lands exactly on it
    let product = app.create_product("Nitric Acid 68%", 14, "4.10").await;
    let customer = app.create_customer("Apex Manufacturing", "Verified").await;
    let order = app.create_order(&id_of(&customer), &id_of(&product), 4).await;
    let (status, body) = app.set_order_status(&id_of(&order), "Approved").await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let low_stock = await_deliveries(&server, "product.low_stock", 1).await;
    let products = low_stock[0]["payload"]["products"].as_array().unwrap();
    let flagged = products
        .iter()
        .find(|p| p["id"] == product["id"])
        .expect("approved product is reported");
    assert_eq!(flagged["name"], "Nitric Acid 68%");
    assert_eq!(flagged["inventory_level"], 10);
    assert_eq!(flagged["reorder_threshold"], 10);

    let changed = await_deliveries(&server, "order.status_changed", 1).await;
    assert_eq!(changed[0]["payload"]["order_id"], order["id"]);
    assert_eq!(changed[0]["payload"]["status"], "Approved");
}

#[tokio::test]
async fn approval_above_the_threshold_stays_quiet() {
    let server = accepting_server().await;
    let app = TestApp::new().await;
    register_hook(&app, &server, json!(["product.low_stock", "order.status_changed"])).await;

    let product = app.create_product("Nitric Acid 68%", 15, "4.10").await;
    let customer = app.create_customer("Apex Manufacturing", "Verified").await;
    let order = app.create_order(&id_of(&customer), &id_of(&product), 4).await;
    app.set_order_status(&id_of(&order), "Approved").await;

    await_deliveries(&server, "order.status_changed", 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(deliveries(&server, "product.low_stock").await.is_empty());
}

#[tokio::test]
async fn invoicing_and_payment_are_announced() {
    let server = accepting_server().await;
    let app = TestApp::new().await;
    register_hook(
        &app,
        &server,
        json!(["invoice.created", "invoice.paid", "order.status_changed"]),
    )
    .await;

    let product = app.create_product("Acetone", 100, "2.90").await;
    let customer = app.create_customer("ChemTech Industries", "Verified").await;
    let order = app.create_order(&id_of(&customer), &id_of(&product), 4).await;
    for target in ["Approved", "Shipped", "Invoiced"] {
        let (status, body) = app.set_order_status(&id_of(&order), target).await;
        assert_eq!(status, StatusCode::OK, "{target}: {body}");
    }

    let created = await_deliveries(&server, "invoice.created", 1).await;
    let payload = &created[0]["payload"];
    let number = payload["invoice_number"].as_str().unwrap();
    assert!(number.starts_with(&format!("INV-{}-", Utc::now().year())));
    assert_eq!(decimal(&payload["total_amount"]), decimal(&order["total_amount"]));
    let invoice_id = payload["invoice_id"].as_str().unwrap().to_string();

    let mut statuses: Vec<String> = await_deliveries(&server, "order.status_changed", 3)
        .await
        .iter()
        .map(|e| e["payload"]["status"].as_str().unwrap().to_string())
        .collect();
    statuses.sort();
    assert_eq!(statuses, ["Approved", "Invoiced", "Shipped"]);

    let (status, body) = app
        .put(
            UserRole::Finance,
            &format!("/api/invoices/{invoice_id}/status"),
            json!({ "status": "Paid" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let paid = await_deliveries(&server, "invoice.paid", 1).await;
    assert_eq!(paid[0]["payload"]["invoice_id"], json!(invoice_id));
    assert_eq!(paid[0]["payload"]["invoice_number"], number);
}

#[tokio::test]
async fn concurrent_sweeps_announce_each_overdue_invoice_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    register_hook(&app, &server, json!(["invoice.overdue"])).await;
    let product = app.create_product("Hydrochloric Acid 37%", 90, "3.10").await;
    let customer = app.create_customer("Global Pharma Supply", "Verified").await;
    let order = app.create_order(&id_of(&customer), &id_of(&product), 3).await;
    let (status, created) = app
        .post(UserRole::Finance, "/api/invoices", json!({ "order_id": id_of(&order) }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let invoice_id = parse_uuid(&created["data"]);

    let stored = invoice::Entity::find_by_id(invoice_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut active: invoice::ActiveModel = stored.into();
    active.due_date = Set(Utc::now() - chrono::Duration::days(1));
    active.update(app.state.db.as_ref()).await.unwrap();

    let invoices = app.state.services.invoices.clone();
    let sweeps = (0..8).map(|_| {
        let invoices = invoices.clone();
        async move { invoices.mark_overdue().await.unwrap() }
    });
    let (flips, (listed, _)) = tokio::join!(
        futures::future::join_all(sweeps),
        async {
            tokio::join!(
                app.get(UserRole::Finance, "/api/invoices"),
                app.get(UserRole::Finance, "/api/invoices?status=Overdue"),
            )
        }
    );
    assert_eq!(listed.0, StatusCode::OK);
    assert!(flips.iter().sum::<usize>() <= 1);

    let overdue = await_deliveries(&server, "invoice.overdue", 1).await;
    assert_eq!(overdue[0]["payload"]["invoice_id"], json!(invoice_id));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(deliveries(&server, "invoice.overdue").await.len(), 1);
    assert_eq!(app.state.services.invoices.mark_overdue().await.unwrap(), 0);
}

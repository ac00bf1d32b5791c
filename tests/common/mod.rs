#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chemops_api::{
    config::AppConfig,
    db,
    entities::user::{self, UserRole},
    events::{self, EventSender},
    services::{features::FeatureFlags, users::CreateUserRequest},
    AppState,
};
use sea_orm::Iterable;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_JWT_SECRET: &str =
    "integration-test-signing-key-0123456789-abcdefghijklmnopqrstuvwxyz-ABCDEFGHIJ";
const MULTIPART_BOUNDARY: &str = "chemops-test-boundary";

/// Full application against a throwaway SQLite file, with one signed-in user per role.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    users: HashMap<UserRole, (user::Model, String)>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestApp::new`] with a hook to adjust configuration before the state is built.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("chemops_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            5000,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.webhook_timeout_secs = 2;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
        let state = AppState::new(
            Arc::new(pool),
            cfg,
            Arc::new(EventSender::new(event_tx)),
            FeatureFlags::default(),
        )
        .expect("build application state");
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            state.services.dispatcher.clone(),
        ));

        let mut users = HashMap::new();
        for role in UserRole::iter() {
            let email = format!("{}@chemops.test", role.to_string().to_lowercase());
            let user = state
                .services
                .users
                .create_user(CreateUserRequest {
                    name: format!("{} User", role),
                    email,
                    password: Some("password123".to_string()),
                    role: Some(role),
                    is_active: Some(true),
                })
                .await
                .expect("seed role user");
            let token = state.auth.generate_token(&user).expect("issue test token");
            users.insert(role, (user, token));
        }

        let router = chemops_api::app_router(state.clone());

        Self {
            router,
            state,
            users,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub fn token_for(&self, role: UserRole) -> &str {
        &self.users[&role].1
    }

    pub fn user_for(&self, role: UserRole) -> &user::Model {
        &self.users[&role].0
    }

    pub fn admin_token(&self) -> &str {
        self.token_for(UserRole::Admin)
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    /// JSON request as `role`, returning status and parsed body.
    pub async fn call(
        &self,
        role: UserRole,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .request(method, uri, body, Some(self.token_for(role)))
            .await;
        read_json(response).await
    }

    pub async fn get(&self, role: UserRole, uri: &str) -> (StatusCode, Value) {
        self.call(role, Method::GET, uri, None).await
    }

    pub async fn post(&self, role: UserRole, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(role, Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, role: UserRole, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(role, Method::PUT, uri, Some(body)).await
    }

    /// Raw response bytes, for CSV and PDF downloads.
    pub async fn download(
        &self,
        role: UserRole,
        uri: &str,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self
            .request(Method::GET, uri, None, Some(self.token_for(role)))
            .await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        (status, headers, bytes.to_vec())
    }

    /// Uploads `content` as the multipart field `file`.
    pub async fn upload_csv(&self, role: UserRole, uri: &str, content: &str) -> (StatusCode, Value) {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{content}\r\n--{b}--\r\n",
            b = MULTIPART_BOUNDARY,
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token_for(role)),
            )
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(Body::from(body))
            .expect("build multipart request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during upload");
        read_json(response).await
    }

    pub async fn create_product(&self, name: &str, stock: i64, price: &str) -> Value {
        let (status, body) = self
            .post(
                UserRole::Admin,
                "/api/products",
                json!({
                    "name": name,
                    "cas_number": "7664-93-9",
                    "un_number": "UN1830",
                    "hazard_classification": "Class 8 - Corrosive",
                    "inventory_level": stock,
                    "reorder_threshold": 10,
                    "price": price,
                    "is_hazardous": true
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create product failed: {body}");
        body["data"].clone()
    }

    pub async fn create_customer(&self, company: &str, compliance_status: &str) -> Value {
        let (status, body) = self
            .post(
                UserRole::Admin,
                "/api/customers",
                json!({
                    "company_name": company,
                    "compliance_status": compliance_status,
                    "contact_email": "Buyer@Example.com",
                    "address": {"city": "Houston", "country": "USA"}
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create customer failed: {body}");
        body["data"].clone()
    }

    /// Single-line order; returns the created order payload.
    pub async fn create_order(&self, customer_id: &str, product_id: &str, quantity: i64) -> Value {
        let (status, body) = self
            .post(
                UserRole::Sales,
                "/api/orders",
                json!({
                    "customer_id": customer_id,
                    "items": [{"product_id": product_id, "quantity": quantity}],
                    "tax_rate": "10"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create order failed: {body}");
        body["data"].clone()
    }

    pub async fn set_order_status(&self, order_id: &str, status: &str) -> (StatusCode, Value) {
        self.put(
            UserRole::Finance,
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": status }),
        )
        .await
    }

    pub async fn product_stock(&self, product_id: &str) -> i64 {
        let (status, body) = self
            .get(UserRole::Sales, &format!("/api/products/{product_id}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["inventory_level"]
            .as_i64()
            .expect("inventory_level is numeric")
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("payload has an id").to_string()
}

pub fn parse_uuid(value: &Value) -> Uuid {
    Uuid::parse_str(&id_of(value)).expect("id is a uuid")
}

/// Strings drawn by text operators across every page of a PDF, in page order.
pub fn pdf_strings(bytes: &[u8]) -> Vec<Vec<u8>> {
    use lopdf::{content::Content, Document, Object};

    let doc = Document::load_mem(bytes).expect("parse rendered PDF");
    let mut strings = Vec::new();
    for page_id in doc.get_pages().into_values() {
        let raw = doc.get_page_content(page_id).expect("page content");
        let content = Content::decode(&raw).expect("decode page content");
        for op in content.operations {
            if op.operator != "Tj" && op.operator != "TJ" {
                continue;
            }
            for operand in op.operands {
                let parts = match operand {
                    Object::Array(parts) => parts,
                    other => vec![other],
                };
                strings.extend(parts.into_iter().filter_map(|part| match part {
                    Object::String(text, _) => Some(text),
                    _ => None,
                }));
            }
        }
    }
    strings
}

/// Polls `check` until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

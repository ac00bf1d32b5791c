mod common;

use axum::http::{Method, StatusCode};
use chemops_api::entities::user::UserRole;
use common::{id_of, read_json, TestApp};
use rstest::rstest;
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = read_json(app.request(Method::GET, "/api/health", None, None).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn missing_and_invalid_tokens_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = read_json(app.request(Method::GET, "/api/products", None, None).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");

    let (status, body) = read_json(
        app.request(Method::GET, "/api/products", None, Some("not-a-jwt"))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn deactivated_users_lose_access_immediately() {
    let app = TestApp::new().await;
    let sales = app.user_for(UserRole::Sales).id;

    let (status, _) = app
        .put(
            UserRole::Admin,
            &format!("/api/admin/users/{sales}"),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(UserRole::Sales, "/api/products").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found or inactive");
}

#[tokio::test]
async fn login_returns_user_and_token() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request(
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "FINANCE@chemops.test", "password": "password123"})),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["user"]["role"], "Finance");
    assert!(body["data"]["user"].get("password_hash").is_none());
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, me) =
        read_json(app.request(Method::GET, "/api/auth/me", None, Some(&token)).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "finance@chemops.test");
}

#[rstest]
#[case(json!({"email": "sales@chemops.test"}), StatusCode::BAD_REQUEST)]
#[case(json!({"email": "sales@chemops.test", "password": "wrong"}), StatusCode::UNAUTHORIZED)]
#[case(json!({"email": "nobody@chemops.test", "password": "password123"}), StatusCode::UNAUTHORIZED)]
#[tokio::test]
async fn bad_logins_fail(#[case] payload: serde_json::Value, #[case] expected: StatusCode) {
    let app = TestApp::new().await;
    let (status, body) = read_json(
        app.request(Method::POST, "/api/auth/login", Some(payload), None)
            .await,
    )
    .await;
    assert_eq!(status, expected);
    if expected == StatusCode::UNAUTHORIZED {
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn only_admins_register_users() {
    let app = TestApp::new().await;
    let payload = json!({
        "name": "New Hire",
        "email": "hire@chemops.test",
        "password": "welcome1",
        "role": "Compliance"
    });

    let (status, _) = app.post(UserRole::Sales, "/api/auth/register", payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(UserRole::Admin, "/api/auth/register", payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["user"]["role"], "Compliance");
    assert!(body["data"]["token"].is_string());

    let (status, body) = app.post(UserRole::Admin, "/api/auth/register", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");
}

#[rstest]
#[case(UserRole::Sales, Method::POST, "/api/products", StatusCode::CREATED)]
#[case(UserRole::Finance, Method::POST, "/api/products", StatusCode::FORBIDDEN)]
#[case(UserRole::Compliance, Method::POST, "/api/products", StatusCode::FORBIDDEN)]
#[case(UserRole::Sales, Method::GET, "/api/audit", StatusCode::FORBIDDEN)]
#[case(UserRole::Finance, Method::GET, "/api/audit", StatusCode::OK)]
#[case(UserRole::Compliance, Method::GET, "/api/audit", StatusCode::OK)]
#[case(UserRole::Sales, Method::GET, "/api/webhooks", StatusCode::FORBIDDEN)]
#[case(UserRole::Admin, Method::GET, "/api/webhooks", StatusCode::OK)]
#[case(UserRole::Finance, Method::GET, "/api/admin/users", StatusCode::FORBIDDEN)]
#[case(UserRole::Admin, Method::GET, "/api/admin/features", StatusCode::OK)]
#[case(UserRole::Sales, Method::GET, "/api/compliance/regulatory-export", StatusCode::FORBIDDEN)]
#[case(UserRole::Compliance, Method::GET, "/api/compliance/regulatory-export", StatusCode::OK)]
#[case(UserRole::Finance, Method::GET, "/api/reports/sales", StatusCode::OK)]
#[case(UserRole::Compliance, Method::GET, "/api/compliance/sds-tracker", StatusCode::OK)]
#[tokio::test]
async fn routes_are_gated_by_role(
    #[case] role: UserRole,
    #[case] method: Method,
    #[case] uri: &str,
    #[case] expected: StatusCode,
) {
    let app = TestApp::new().await;
    let body = (method == Method::POST).then(|| json!({"name": "Toluene", "price": "4.10"}));
    let response = app
        .request(method, uri, body, Some(app.token_for(role)))
        .await;
    let status = response.status();
    let (_, payload) = read_json(response).await;

    assert_eq!(status, expected, "{role} {uri}: {payload}");
    if expected == StatusCode::FORBIDDEN {
        assert_eq!(payload["message"], "Insufficient permissions");
    }
}

#[tokio::test]
async fn destructive_routes_are_admin_only() {
    let app = TestApp::new().await;
    let product = app.create_product("Acetone", 10, "2.90").await;
    let uri = format!("/api/products/{}", id_of(&product));

    let (status, _) = app.call(UserRole::Sales, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(UserRole::Admin, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_archived"], true);
}

#[tokio::test]
async fn compliance_can_update_customers_but_not_create_them() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Apex Manufacturing", "Pending").await;

    let (status, _) = app
        .post(UserRole::Compliance, "/api/customers", json!({"company_name": "Other"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            UserRole::Compliance,
            &format!("/api/customers/{}", id_of(&customer)),
            json!({"compliance_status": "Verified"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["compliance_status"], "Verified");
}

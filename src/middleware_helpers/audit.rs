//! Audit trail middleware.
//!
//! Wraps mutating routes and, when the handler answers 2xx, records who changed what. The entity
//! id comes from the response's `data.id`, falling back to the first UUID in the path.

use crate::{
    auth::AuthUser,
    entities::audit_log::{AuditAction, AuditEntityType},
    services::audit::{AuditRecord, AuditService},
};
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Bodies larger than this are passed through without being inspected.
const MAX_AUDITED_BODY: usize = 2 * 1024 * 1024;

/// Fields never copied into `changed_fields`.
const REDACTED_FIELDS: &[&str] = &["password", "password_hash", "secret"];

#[derive(Clone)]
pub struct AuditContext {
    pub service: Arc<AuditService>,
    pub entity_type: AuditEntityType,
    pub action: AuditAction,
}

fn path_entity_id(path: &str) -> Option<Uuid> {
    path.split('/').find_map(|segment| Uuid::parse_str(segment).ok())
}

fn response_entity_id(body: &[u8]) -> Option<Uuid> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let data = value.get("data")?;
    // Registration answers with `{user, token}`
    data.get("id")
        .or_else(|| data.get("user").and_then(|user| user.get("id")))
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn redact(mut fields: Value) -> Value {
    if let Some(map) = fields.as_object_mut() {
        for key in REDACTED_FIELDS {
            map.remove(*key);
        }
    }
    fields
}

pub async fn audit_middleware(
    State(ctx): State<AuditContext>,
    request: Request,
    next: Next,
) -> Response {
    let user_id = request.extensions().get::<AuthUser>().map(|u| u.user_id);
    let path_id = path_entity_id(request.uri().path());
    let captures_body = matches!(ctx.action, AuditAction::Update | AuditAction::StatusChange);

    let (parts, body) = request.into_parts();
    let request_bytes = match to_bytes(body, MAX_AUDITED_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return crate::errors::ServiceError::BadRequest("Request body too large".to_string())
                .into_response()
        }
    };
    let changed_fields = if captures_body {
        serde_json::from_slice::<Value>(&request_bytes).ok().map(redact)
    } else {
        None
    };

    let response = next
        .run(Request::from_parts(parts, Body::from(request_bytes)))
        .await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let response_bytes = match to_bytes(body, MAX_AUDITED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Could not buffer response for audit");
            return Response::from_parts(parts, Body::empty());
        }
    };

    match response_entity_id(&response_bytes).or(path_id) {
        Some(entity_id) => {
            ctx.service
                .record(AuditRecord {
                    entity_type: ctx.entity_type,
                    entity_id,
                    action: ctx.action,
                    changed_fields,
                    user_id,
                })
                .await;
        }
        None => warn!(entity_type = %ctx.entity_type, "No entity id to audit"),
    }

    Response::from_parts(parts, Body::from(response_bytes))
}

/// Adds an audit layer to every route of a router.
pub trait AuditRouterExt {
    fn audited(
        self,
        service: &Arc<AuditService>,
        entity_type: AuditEntityType,
        action: AuditAction,
    ) -> Self;
}

impl<S> AuditRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn audited(
        self,
        service: &Arc<AuditService>,
        entity_type: AuditEntityType,
        action: AuditAction,
    ) -> Self {
        let ctx = AuditContext {
            service: service.clone(),
            entity_type,
            action,
        };
        self.route_layer(axum::middleware::from_fn_with_state(ctx, audit_middleware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_id_prefers_response_payload() {
        let id = Uuid::new_v4();
        let body = serde_json::to_vec(&json!({"success": true, "data": {"id": id}})).unwrap();
        assert_eq!(response_entity_id(&body), Some(id));
        assert_eq!(response_entity_id(b"not json"), None);

        let body =
            serde_json::to_vec(&json!({"data": {"user": {"id": id}, "token": "t"}})).unwrap();
        assert_eq!(response_entity_id(&body), Some(id));
    }

    #[test]
    fn path_ids_are_found_anywhere() {
        let id = Uuid::new_v4();
        assert_eq!(path_entity_id(&format!("/api/orders/{id}/status")), Some(id));
        assert_eq!(path_entity_id("/api/products/import"), None);
    }

    #[test]
    fn secrets_are_not_logged() {
        let cleaned = redact(json!({"name": "Ada", "password": "hunter2"}));
        assert_eq!(cleaned, json!({"name": "Ada"}));
    }
}

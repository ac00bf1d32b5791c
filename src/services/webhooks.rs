use crate::{
    db::DbPool,
    entities::webhook::{self, Entity as WebhookEntity},
    errors::ServiceError,
    events::{is_known_event, EVENT_NAMES},
    webhooks::{DeliveryOutcome, WebhookDispatcher},
};
use chrono::Utc;
use rand::RngCore;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateWebhookRequest {
    #[validate(url(message = "Webhook URL must be a valid URL"))]
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    /// Generated when omitted.
    pub secret: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateWebhookRequest {
    #[validate(url(message = "Webhook URL must be a valid URL"))]
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    #[validate(length(min = 1, message = "Secret cannot be empty"))]
    pub secret: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookTestResult {
    pub event: String,
    pub delivered: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// 32 random bytes, hex encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn validate_events(events: &[String]) -> Result<(), ServiceError> {
    if let Some(unknown) = events.iter().find(|e| !is_known_event(e)) {
        return Err(ServiceError::ValidationError(format!(
            "Unknown event '{}'. Supported events: {}",
            unknown,
            EVENT_NAMES.join(", ")
        )));
    }
    Ok(())
}

/// Webhook subscription management
#[derive(Clone)]
pub struct WebhookService {
    db_pool: Arc<DbPool>,
    dispatcher: Arc<WebhookDispatcher>,
}

impl WebhookService {
    pub fn new(db_pool: Arc<DbPool>, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self {
            db_pool,
            dispatcher,
        }
    }

    pub async fn list_webhooks(&self) -> Result<Vec<webhook::Model>, ServiceError> {
        Ok(WebhookEntity::find()
            .order_by_desc(webhook::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn get_webhook(&self, id: Uuid) -> Result<webhook::Model, ServiceError> {
        WebhookEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Webhook not found".to_string()))
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn create_webhook(
        &self,
        request: CreateWebhookRequest,
        created_by: Option<Uuid>,
    ) -> Result<webhook::Model, ServiceError> {
        request.validate()?;
        validate_events(&request.events)?;

        let now = Utc::now();
        let model = webhook::ActiveModel {
            id: Set(Uuid::new_v4()),
            url: Set(request.url),
            events: Set(json!(request.events)),
            secret: Set(request
                .secret
                .filter(|s| !s.is_empty())
                .unwrap_or_else(generate_secret)),
            is_active: Set(request.is_active.unwrap_or(true)),
            description: Set(request.description),
            last_triggered_at: Set(None),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(webhook_id = %model.id, "Webhook registered");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_webhook(
        &self,
        id: Uuid,
        request: UpdateWebhookRequest,
    ) -> Result<webhook::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_webhook(id).await?;
        let mut active: webhook::ActiveModel = existing.into();

        if let Some(url) = request.url {
            active.url = Set(url);
        }
        if let Some(events) = request.events {
            validate_events(&events)?;
            active.events = Set(json!(events));
        }
        if let Some(secret) = request.secret {
            active.secret = Set(secret);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }

        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_webhook(&self, id: Uuid) -> Result<webhook::Model, ServiceError> {
        let existing = self.get_webhook(id).await?;
        WebhookEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        info!(webhook_id = %id, "Webhook deleted");
        Ok(existing)
    }

    /// Sends a test delivery to this webhook only, using its first subscribed event name.
    #[instrument(skip(self))]
    pub async fn test_webhook(&self, id: Uuid) -> Result<WebhookTestResult, ServiceError> {
        let hook = self.get_webhook(id).await?;
        let event = hook
            .event_names()
            .into_iter()
            .next()
            .unwrap_or_else(|| "order.created".to_string());
        let payload = json!({ "test": true, "webhook_id": hook.id });

        let outcome = self.dispatcher.deliver(&hook, &event, &payload).await;
        let (delivered, status, error) = match outcome {
            DeliveryOutcome::Delivered { status } => (true, Some(status), None),
            DeliveryOutcome::Rejected { status } => (false, Some(status), None),
            DeliveryOutcome::Failed(reason) => (false, None, Some(reason)),
        };
        Ok(WebhookTestResult {
            event,
            delivered,
            status,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_are_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn rejects_unknown_event_names() {
        assert!(validate_events(&["order.created".into(), "invoice.paid".into()]).is_ok());
        let err = validate_events(&["order.deleted".into()]).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(msg) if msg.contains("order.deleted")));
    }
}

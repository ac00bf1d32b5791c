use super::signature::{SignatureGenerator, SIGNATURE_HEADER};
use crate::{
    db::DbPool,
    entities::webhook::{self, Entity as WebhookEntity},
    errors::ServiceError,
    services::features::FeatureFlags,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::counter;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// JSON body posted to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEnvelope<'a> {
    pub event: &'a str,
    pub payload: &'a Value,
    pub timestamp: DateTime<Utc>,
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Rejected { status: u16 },
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Fans a domain event out to every active webhook subscribed to it.
pub struct WebhookDispatcher {
    db: Arc<DbPool>,
    client: reqwest::Client,
    features: FeatureFlags,
}

impl WebhookDispatcher {
    pub fn new(
        db: Arc<DbPool>,
        timeout: Duration,
        features: FeatureFlags,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chemops-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build webhook client: {}", e))
            })?;

        Ok(Self {
            db,
            client,
            features,
        })
    }

    /// Delivers `event` to all subscribers concurrently. Failures are logged and dropped.
    #[instrument(skip(self, payload))]
    pub async fn dispatch(&self, event: &str, payload: Value) {
        if !self.features.snapshot().await.enable_webhooks {
            debug!(event, "Webhooks disabled; skipping dispatch");
            return;
        }

        let hooks = match WebhookEntity::find()
            .filter(webhook::Column::IsActive.eq(true))
            .all(&*self.db)
            .await
        {
            Ok(hooks) => hooks,
            Err(e) => {
                error!(error = %e, event, "Failed to load webhooks for dispatch");
                return;
            }
        };

        let targets: Vec<_> = hooks
            .into_iter()
            .filter(|hook| hook.subscribes_to(event))
            .collect();
        if targets.is_empty() {
            debug!(event, "No webhook subscribers");
            return;
        }

        let outcomes = join_all(
            targets
                .iter()
                .map(|hook| self.deliver(hook, event, &payload)),
        )
        .await;

        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        info!(
            event,
            subscribers = targets.len(),
            delivered,
            "Webhook dispatch finished"
        );
    }

    /// Signs and posts one event to one webhook.
    pub async fn deliver(
        &self,
        hook: &webhook::Model,
        event: &str,
        payload: &Value,
    ) -> DeliveryOutcome {
        let envelope = WebhookEnvelope {
            event,
            payload,
            timestamp: Utc::now(),
        };
        let body = match serde_json::to_vec(&envelope) {
            Ok(body) => body,
            Err(e) => return self.failed(hook.id, event, e.to_string()),
        };
        let signature = match SignatureGenerator::new(hook.secret.as_str()).sign_payload(&body) {
            Ok(sig) => sig,
            Err(e) => return self.failed(hook.id, event, e.to_string()),
        };

        let response = self
            .client
            .post(&hook.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                counter!("chemops_webhooks.delivered", 1);
                self.touch(hook.id).await;
                DeliveryOutcome::Delivered {
                    status: resp.status().as_u16(),
                }
            }
            Ok(resp) => {
                counter!("chemops_webhooks.failed", 1);
                warn!(
                    webhook_id = %hook.id,
                    event,
                    status = resp.status().as_u16(),
                    "Webhook endpoint rejected delivery"
                );
                DeliveryOutcome::Rejected {
                    status: resp.status().as_u16(),
                }
            }
            Err(e) => self.failed(hook.id, event, e.to_string()),
        }
    }

    fn failed(&self, webhook_id: Uuid, event: &str, reason: String) -> DeliveryOutcome {
        counter!("chemops_webhooks.failed", 1);
        warn!(%webhook_id, event, error = %reason, "Webhook delivery failed");
        DeliveryOutcome::Failed(reason)
    }

    async fn touch(&self, webhook_id: Uuid) {
        let update = webhook::ActiveModel {
            id: Set(webhook_id),
            last_triggered_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        if let Err(e) = update.update(&*self.db).await {
            warn!(%webhook_id, error = %e, "Failed to record webhook trigger time");
        }
    }
}

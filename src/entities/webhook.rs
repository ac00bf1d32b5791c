use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Outbound subscription. `events` is a JSON array of event names.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "webhooks")]
#[schema(as = Webhook)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub url: String,
    #[schema(value_type = Vec<String>)]
    pub events: Json,
    pub secret: String,
    pub is_active: bool,
    pub description: Option<String>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn event_names(&self) -> Vec<String> {
        self.events
            .as_array()
            .map(|events| {
                events
                    .iter()
                    .filter_map(|e| e.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events
            .as_array()
            .is_some_and(|events| events.iter().any(|e| e.as_str() == Some(event)))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        self.updated_at = Set(Utc::now());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hook(events: Json) -> Model {
        Model {
            id: Uuid::new_v4(),
            url: "http://localhost/hook".into(),
            events,
            secret: "s".into(),
            is_active: true,
            description: None,
            last_triggered_at: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn subscription_matches_exact_event_names() {
        let webhook = hook(json!(["order.created", "invoice.paid"]));
        assert!(webhook.subscribes_to("invoice.paid"));
        assert!(!webhook.subscribes_to("invoice"));
        assert_eq!(webhook.event_names(), vec!["order.created", "invoice.paid"]);
    }

    #[test]
    fn malformed_events_column_subscribes_to_nothing() {
        let webhook = hook(json!({"order.created": true}));
        assert!(!webhook.subscribes_to("order.created"));
        assert!(webhook.event_names().is_empty());
    }
}

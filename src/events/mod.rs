//! Domain events and the background loop that turns them into webhook deliveries.

use crate::entities::{customer::ComplianceStatus, order::OrderStatus};
use crate::webhooks::WebhookDispatcher;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Names webhooks may subscribe to.
pub const EVENT_NAMES: &[&str] = &[
    "order.created",
    "order.status_changed",
    "invoice.created",
    "invoice.paid",
    "invoice.overdue",
    "product.low_stock",
    "customer.compliance_changed",
];

pub fn is_known_event(name: &str) -> bool {
    EVENT_NAMES.contains(&name)
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends and logs failures; emission never fails the caller.
    pub async fn emit(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "Failed to enqueue domain event");
        }
    }
}

/// Stock snapshot carried by `product.low_stock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockProduct {
    pub id: Uuid,
    pub name: String,
    pub inventory_level: i32,
    pub reorder_threshold: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        status: OrderStatus,
    },
    InvoiceCreated {
        invoice_id: Uuid,
        invoice_number: String,
        total_amount: Decimal,
    },
    InvoicePaid {
        invoice_id: Uuid,
        invoice_number: String,
    },
    InvoiceOverdue {
        invoice_id: Uuid,
        invoice_number: String,
    },
    LowStock {
        products: Vec<LowStockProduct>,
    },
    CustomerComplianceChanged {
        customer_id: Uuid,
        status: ComplianceStatus,
    },
}

impl Event {
    /// Wire name used for webhook subscriptions.
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order.created",
            Event::OrderStatusChanged { .. } => "order.status_changed",
            Event::InvoiceCreated { .. } => "invoice.created",
            Event::InvoicePaid { .. } => "invoice.paid",
            Event::InvoiceOverdue { .. } => "invoice.overdue",
            Event::LowStock { .. } => "product.low_stock",
            Event::CustomerComplianceChanged { .. } => "customer.compliance_changed",
        }
    }

    /// JSON payload delivered to subscribers.
    pub fn payload(&self) -> Value {
        match self {
            Event::OrderCreated {
                order_id,
                customer_id,
                total_amount,
            } => json!({
                "order_id": order_id,
                "customer_id": customer_id,
                "total_amount": total_amount,
            }),
            Event::OrderStatusChanged { order_id, status } => json!({
                "order_id": order_id,
                "status": status,
            }),
            Event::InvoiceCreated {
                invoice_id,
                invoice_number,
                total_amount,
            } => json!({
                "invoice_id": invoice_id,
                "invoice_number": invoice_number,
                "total_amount": total_amount,
            }),
            Event::InvoicePaid {
                invoice_id,
                invoice_number,
            }
            | Event::InvoiceOverdue {
                invoice_id,
                invoice_number,
            } => json!({
                "invoice_id": invoice_id,
                "invoice_number": invoice_number,
            }),
            Event::LowStock { products } => json!({ "products": products }),
            Event::CustomerComplianceChanged {
                customer_id,
                status,
            } => json!({
                "customer_id": customer_id,
                "status": status,
            }),
        }
    }
}

/// Drains the event channel. Each event's deliveries run on their own task so a slow
/// subscriber never holds up later events.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, dispatcher: Arc<WebhookDispatcher>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(event = event.name(), "Received domain event");
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(event.name(), event.payload()).await;
        });
    }

    info!("Event channel closed; stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_name_is_subscribable() {
        let samples = vec![
            Event::OrderCreated {
                order_id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                total_amount: Decimal::new(1050, 2),
            },
            Event::OrderStatusChanged {
                order_id: Uuid::new_v4(),
                status: OrderStatus::Approved,
            },
            Event::InvoiceCreated {
                invoice_id: Uuid::new_v4(),
                invoice_number: "INV-2024-0001".into(),
                total_amount: Decimal::ONE,
            },
            Event::InvoicePaid {
                invoice_id: Uuid::new_v4(),
                invoice_number: "INV-2024-0001".into(),
            },
            Event::InvoiceOverdue {
                invoice_id: Uuid::new_v4(),
                invoice_number: "INV-2024-0001".into(),
            },
            Event::LowStock { products: vec![] },
            Event::CustomerComplianceChanged {
                customer_id: Uuid::new_v4(),
                status: ComplianceStatus::Verified,
            },
        ];

        let names: Vec<_> = samples.iter().map(Event::name).collect();
        assert_eq!(names, EVENT_NAMES);
    }

    #[test]
    fn status_change_payload_uses_status_label() {
        let order_id = Uuid::new_v4();
        let payload = Event::OrderStatusChanged {
            order_id,
            status: OrderStatus::Shipped,
        }
        .payload();

        assert_eq!(payload["status"], "Shipped");
        assert_eq!(payload["order_id"], order_id.to_string());
    }

    #[tokio::test]
    async fn emit_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        EventSender::new(tx)
            .emit(Event::LowStock { products: vec![] })
            .await;
    }
}

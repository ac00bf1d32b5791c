//! Outbound webhook delivery: payload signing and fan-out to subscribers.

mod dispatcher;
mod signature;

pub use dispatcher::{DeliveryOutcome, WebhookDispatcher, WebhookEnvelope};
pub use signature::{SignatureGenerator, SIGNATURE_HEADER};

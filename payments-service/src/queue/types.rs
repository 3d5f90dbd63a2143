//! Message types exchanged over RabbitMQ.
//!
//! Bodies use the `{"pattern": ..., "data": ...}` envelope so Nest
//! microservice consumers can read them unchanged.

use serde::{Deserialize, Serialize};

/// Topic for successfully captured payments.
pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";

/// Queue serving checkout-session requests from other services.
pub const CREATE_SESSION_QUEUE: &str = "create.payment.session";

/// Payment captured for an order.
///
/// Delivery is at-least-once: consumers must be idempotent on
/// `stripe_payment_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMessage {
    /// Stripe charge id (ch_...)
    pub stripe_payment_id: String,
    /// Order id recovered from the charge metadata
    pub order_id: String,
    /// Hosted receipt page, when Stripe issued one
    pub receipt_url: Option<String>,
}

/// Wire envelope around a published message.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusEnvelope<T> {
    pub pattern: String,
    pub data: T,
}

impl<T> BusEnvelope<T> {
    pub fn new(pattern: &str, data: T) -> Self {
        Self {
            pattern: pattern.to_string(),
            data,
        }
    }
}

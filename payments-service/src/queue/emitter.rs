//! Domain event emission.
//!
//! One `emit` call is exactly one publish attempt. There is no retry loop
//! here: redelivery is Stripe's job (it re-sends the webhook on a non-2xx)
//! and durable delivery is the bus client's.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use super::types::{BusEnvelope, DomainMessage, PAYMENT_SUCCEEDED};
use crate::error::EmitError;

/// Anything that can put bytes on a named topic.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, topic: &str, message_id: &str, body: &[u8]) -> anyhow::Result<()>;
}

/// Publishes [`DomainMessage`]s with a bounded wait.
#[derive(Clone)]
pub struct DomainEventEmitter {
    publisher: Arc<dyn Publish>,
    timeout: Duration,
}

impl DomainEventEmitter {
    pub fn new(publisher: Arc<dyn Publish>, timeout: Duration) -> Self {
        Self { publisher, timeout }
    }

    /// Publish a payment-succeeded message.
    ///
    /// On timeout the in-flight publish is dropped; it may still have reached
    /// the broker, which downstream idempotency absorbs.
    pub async fn emit(&self, message: &DomainMessage) -> Result<(), EmitError> {
        let body = serde_json::to_vec(&BusEnvelope::new(PAYMENT_SUCCEEDED, message)).map_err(|e| {
            EmitError::Failed {
                topic: PAYMENT_SUCCEEDED,
                reason: e.to_string(),
            }
        })?;

        let publish = self
            .publisher
            .publish(PAYMENT_SUCCEEDED, &message.stripe_payment_id, &body);

        match tokio::time::timeout(self.timeout, publish).await {
            Ok(Ok(())) => {
                info!(
                    topic = PAYMENT_SUCCEEDED,
                    stripe_payment_id = %message.stripe_payment_id,
                    order_id = %message.order_id,
                    "domain_event_emitted"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                error!(
                    topic = PAYMENT_SUCCEEDED,
                    stripe_payment_id = %message.stripe_payment_id,
                    order_id = %message.order_id,
                    error = %format!("{:#}", e),
                    "domain_event_emit_failed"
                );
                Err(EmitError::Failed {
                    topic: PAYMENT_SUCCEEDED,
                    reason: format!("{:#}", e),
                })
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                error!(
                    topic = PAYMENT_SUCCEEDED,
                    stripe_payment_id = %message.stripe_payment_id,
                    order_id = %message.order_id,
                    timeout_ms = timeout_ms,
                    "domain_event_emit_timeout"
                );
                Err(EmitError::Timeout {
                    topic: PAYMENT_SUCCEEDED,
                    timeout_ms,
                })
            }
        }
    }
}

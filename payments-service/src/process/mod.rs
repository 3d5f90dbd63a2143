//! Stripe webhook processing.
//!
//! ## Processing Flow
//!
//! ```text
//! raw body + stripe-signature → verify → decode → dispatch → (Forwarded) emit
//! ```
//!
//! Verification, decoding and dispatch are local computation. The only
//! awaited step is the bounded publish of a forwarded message.

pub mod decoder;
pub mod dispatcher;

use tracing::{error, info, warn};

use crate::error::WebhookError;
use crate::queue::DomainEventEmitter;
use crate::web::signature::verify_stripe_signature;

pub use decoder::{decode_event, VerifiedEvent};
pub use dispatcher::{dispatch, is_known_kind, DispatchOutcome, RejectReason};

/// Signing secret and skew window for webhook verification.
#[derive(Debug, Clone, Copy)]
pub struct WebhookAuth<'a> {
    pub secret: &'a str,
    pub tolerance_secs: u64,
}

/// Run one webhook delivery through the pipeline.
///
/// Returns the dispatch outcome once any forwarded message has been
/// published. A bad signature returns before decoding, so nothing reaches
/// the dispatcher or the bus.
pub async fn process_webhook(
    auth: WebhookAuth<'_>,
    emitter: &DomainEventEmitter,
    body: &[u8],
    signature: Option<&str>,
) -> Result<DispatchOutcome, WebhookError> {
    info!(
        body_length = body.len(),
        has_signature = signature.is_some(),
        "stripe_webhook_received"
    );

    let verified = verify_stripe_signature(
        body,
        signature.unwrap_or_default(),
        auth.secret,
        auth.tolerance_secs,
    )
    .map_err(|e| {
        warn!(body_length = body.len(), "stripe_webhook_signature_invalid");
        WebhookError::from(e)
    })?;

    let event = decode_event(verified)?;

    let outcome = dispatch(&event);

    match &outcome {
        DispatchOutcome::Forwarded(message) => {
            info!(
                event_id = %event.id(),
                kind = %event.kind(),
                stripe_payment_id = %message.stripe_payment_id,
                order_id = %message.order_id,
                "stripe_event_forwarding"
            );
            emitter.emit(message).await?;
        }
        DispatchOutcome::Ignored(kind) => {
            info!(
                event_id = %event.id(),
                kind = %kind,
                known_kind = is_known_kind(kind),
                "stripe_event_ignored"
            );
        }
        DispatchOutcome::Rejected(reason) => {
            error!(
                event_id = %event.id(),
                kind = %event.kind(),
                reason = %reason,
                livemode = event.livemode(),
                "stripe_event_rejected"
            );
        }
    }

    Ok(outcome)
}

//! Event-kind routing table.
//!
//! Each Stripe event kind maps to exactly one policy. Adding a kind is one
//! entry in [`HANDLERS`]. Kinds absent from the table are ignored, since
//! Stripe adds new kinds over time.
//!
//! Dispatch is a pure function of the event; it never logs or publishes.

use thiserror::Error;

use crate::process::decoder::VerifiedEvent;
use crate::queue::DomainMessage;

/// Result of classifying one verified event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Publish this message to the bus.
    Forwarded(DomainMessage),
    /// Nothing to do for this kind.
    Ignored(String),
    /// The kind is handled but the event cannot be attributed.
    Rejected(RejectReason),
}

/// Why a handled event could not be turned into a domain message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("missing orderId")]
    MissingOrderId,

    #[error("missing charge id")]
    MissingChargeId,
}

type Transform = fn(&VerifiedEvent) -> Result<DomainMessage, RejectReason>;

#[derive(Clone, Copy)]
enum Policy {
    Forward(Transform),
    Ignore,
}

static HANDLERS: &[(&str, Policy)] = &[
    ("charge.succeeded", Policy::Forward(charge_succeeded)),
    ("charge.failed", Policy::Ignore),
    ("charge.pending", Policy::Ignore),
    ("charge.refunded", Policy::Ignore),
    ("charge.updated", Policy::Ignore),
    ("payment_intent.created", Policy::Ignore),
    ("payment_intent.succeeded", Policy::Ignore),
    ("payment_intent.payment_failed", Policy::Ignore),
    ("payment_intent.canceled", Policy::Ignore),
    ("checkout.session.completed", Policy::Ignore),
    ("checkout.session.expired", Policy::Ignore),
];

fn policy_for(kind: &str) -> Option<Policy> {
    HANDLERS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, policy)| *policy)
}

/// Whether the kind has an entry in the routing table.
pub fn is_known_kind(kind: &str) -> bool {
    policy_for(kind).is_some()
}

/// Classify an event.
pub fn dispatch(event: &VerifiedEvent) -> DispatchOutcome {
    match policy_for(event.kind()) {
        Some(Policy::Forward(transform)) => match transform(event) {
            Ok(message) => DispatchOutcome::Forwarded(message),
            Err(reason) => DispatchOutcome::Rejected(reason),
        },
        Some(Policy::Ignore) | None => DispatchOutcome::Ignored(event.kind().to_string()),
    }
}

/// `charge.succeeded`: the order id travels in the charge metadata, set when
/// the checkout session was created.
fn charge_succeeded(event: &VerifiedEvent) -> Result<DomainMessage, RejectReason> {
    let charge_id = non_empty(event.str_at(&["id"])).ok_or(RejectReason::MissingChargeId)?;
    let order_id =
        non_empty(event.str_at(&["metadata", "orderId"])).ok_or(RejectReason::MissingOrderId)?;

    Ok(DomainMessage {
        stripe_payment_id: charge_id.to_string(),
        order_id: order_id.to_string(),
        receipt_url: non_empty(event.str_at(&["receipt_url"])).map(str::to_string),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

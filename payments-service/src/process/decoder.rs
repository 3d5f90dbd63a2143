//! Stripe event envelope decoding.
//!
//! Only bytes that already passed signature verification are decoded. The
//! contents of `data.object` are kept as opaque JSON; per-kind schema checks
//! happen in the dispatcher.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::WebhookError;
use crate::web::signature::VerifiedPayload;

/// A Stripe event whose body was authenticated before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEvent {
    id: String,
    kind: String,
    created: Option<i64>,
    livemode: bool,
    data: Map<String, Value>,
}

impl VerifiedEvent {
    #[cfg(test)]
    pub(crate) fn new(id: impl Into<String>, kind: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            created: None,
            livemode: false,
            data,
        }
    }

    /// Processor-issued event id (evt_...).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Event type tag, e.g. `charge.succeeded`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn created(&self) -> Option<i64> {
        self.created
    }

    pub fn livemode(&self) -> bool {
        self.livemode
    }

    /// The event's `data.object`.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Look up a string nested under `data.object`, e.g. `["metadata", "orderId"]`.
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        let mut current = self.data.get(*first)?;
        for key in rest {
            current = current.get(*key)?;
        }
        current.as_str()
    }
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    livemode: bool,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: Map<String, Value>,
}

/// Decode a verified body into a [`VerifiedEvent`].
pub fn decode_event(payload: VerifiedPayload<'_>) -> Result<VerifiedEvent, WebhookError> {
    let envelope: Envelope = serde_json::from_slice(payload.as_bytes()).map_err(|e| {
        error!(
            error = %e,
            payload_length = payload.as_bytes().len(),
            "stripe_event_malformed"
        );
        WebhookError::MalformedPayload(e.to_string())
    })?;

    Ok(VerifiedEvent {
        id: envelope.id,
        kind: envelope.kind,
        created: envelope.created,
        livemode: envelope.livemode,
        data: envelope.data.object,
    })
}

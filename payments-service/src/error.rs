//! Error types shared by the webhook and checkout paths.

use thiserror::Error;

/// Startup configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingRequired(&'static str),

    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
}

/// Failures on the inbound webhook path.
///
/// `SignatureInvalid` deliberately carries no detail so callers cannot
/// probe which part of the check failed.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("invalid signature")]
    SignatureInvalid,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Failures publishing a domain message to the bus.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("publish to {topic} timed out after {timeout_ms}ms")]
    Timeout { topic: &'static str, timeout_ms: u64 },

    #[error("publish to {topic} failed: {reason}")]
    Failed { topic: &'static str, reason: String },
}

/// Error returned by the payment processor when creating a session.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("payment provider error: {message}")]
pub struct ProviderError {
    /// Upstream HTTP status, absent for transport failures
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// True when the processor rejected the request itself (bad currency etc).
    pub fn is_client_error(&self) -> bool {
        matches!(self.status, Some(s) if (400..500).contains(&s))
    }
}

/// Failures creating a checkout session.
#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("invalid checkout request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CheckoutError {
    /// Text returned to callers in `{"error": ...}`, over HTTP or the bus.
    pub fn public_message(&self) -> String {
        match self {
            CheckoutError::Provider(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}

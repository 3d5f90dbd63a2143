//! Payments service - Stripe checkout sessions and webhook event bridge.
//!
//! ## Architecture
//!
//! ```text
//! Stripe webhook → verify → decode → dispatch → payment.succeeded queue → order service
//! order service → create-payment-session (HTTP or create.payment.session queue) → Stripe
//! ```
//!
//! The service keeps no payment state. Each request is handled on its own.

pub mod checkout;
pub mod config;
pub mod consumer;
pub mod error;
pub mod process;
pub mod queue;
pub mod web;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use checkout::{CheckoutRequest, CheckoutSessionFactory, CheckoutSessionResult, StripeClient};
pub use config::Config;
pub use error::{CheckoutError, ConfigError, EmitError, ProviderError, WebhookError};
pub use process::{process_webhook, DispatchOutcome, VerifiedEvent};
pub use queue::{DomainEventEmitter, DomainMessage, Publisher, PAYMENT_SUCCEEDED};
pub use web::AppState;

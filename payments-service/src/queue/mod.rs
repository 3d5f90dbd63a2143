//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - Message types and topic names
//! - The `Publish` port and the timeout-bounded domain event emitter
//! - An AMQP implementation of `Publish`
//!
//! ## Architecture
//!
//! ```text
//! Stripe webhook → dispatcher → DomainEventEmitter → payment.succeeded queue → orders
//! ```

pub mod emitter;
pub mod publisher;
pub mod types;

pub use emitter::{DomainEventEmitter, Publish};
pub use publisher::Publisher;
pub use types::{BusEnvelope, DomainMessage, CREATE_SESSION_QUEUE, PAYMENT_SUCCEEDED};

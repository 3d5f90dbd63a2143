//! Checkout session creation.
//!
//! ```text
//! CheckoutRequest → CheckoutSessionFactory → CreateSession (Stripe) → CheckoutSessionResult
//! ```
//!
//! The order id is attached as payment metadata; the webhook path reads it
//! back when the charge succeeds.

pub mod factory;
pub mod stripe;
pub mod types;

pub use factory::{
    CheckoutSessionFactory, CreateSession, ProviderLineItem, ProviderSession, SessionParams,
    ORDER_ID_METADATA_KEY,
};
pub use stripe::StripeClient;
pub use types::{to_minor_units, CheckoutRequest, CheckoutSessionResult, LineItem};

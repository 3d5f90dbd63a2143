//! Web server module.
//!
//! Routes:
//! - `POST /payments/webhook`: Stripe webhook, verified then dispatched
//! - `POST /payments/create-payment-session`: hosted checkout for an order
//! - `GET /payments/success`, `GET /payments/cancel`: redirect landing pages
//! - `GET /health`

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    create_payment_session, health, payment_cancel, payment_success, stripe_webhook, AppState,
    HealthResponse, WebhookResponse,
};
pub use signature::{verify_stripe_signature, SignatureInvalid, VerifiedPayload, SIGNATURE_HEADER};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/payments/webhook", post(stripe_webhook))
        .route("/payments/create-payment-session", post(create_payment_session))
        .route("/payments/success", get(payment_success))
        .route("/payments/cancel", get(payment_cancel))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

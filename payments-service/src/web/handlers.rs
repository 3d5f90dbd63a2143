//! HTTP endpoint handlers.
//!
//! The webhook handler takes the body as raw bytes: any re-serialization
//! before verification would break the signature.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::checkout::{CheckoutRequest, CheckoutSessionFactory, CheckoutSessionResult};
use crate::error::{CheckoutError, EmitError, WebhookError};
use crate::process::{process_webhook, DispatchOutcome, WebhookAuth};
use crate::queue::DomainEventEmitter;
use crate::web::signature::SIGNATURE_HEADER;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub emitter: DomainEventEmitter,
    pub sessions: Arc<CheckoutSessionFactory>,
}

impl AppState {
    pub fn new(config: Config, emitter: DomainEventEmitter, sessions: Arc<CheckoutSessionFactory>) -> Self {
        Self {
            config: Arc::new(config),
            emitter,
            sessions,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Stripe Webhook
// =============================================================================

/// Acknowledgement body sent back to Stripe.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

/// Converts webhook failures into the status codes Stripe acts on.
///
/// 4xx tells Stripe the delivery is bad; 5xx makes it redeliver later.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match &self.0 {
            WebhookError::SignatureInvalid => (StatusCode::BAD_REQUEST, "invalid signature"),
            WebhookError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "malformed payload"),
            WebhookError::Emit(EmitError::Timeout { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "event bus timed out")
            }
            WebhookError::Emit(EmitError::Failed { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "event bus unavailable")
            }
        };
        (status, format!("Webhook Error: {}", reason)).into_response()
    }
}

/// Stripe webhook endpoint.
///
/// - 200 when the event was forwarded, ignored, or rejected as unattributable
///   (redelivery cannot add a missing order id)
/// - 400 on signature failure or a body that is not an event
/// - 5xx when the bus did not take the message, so Stripe retries
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let auth = WebhookAuth {
        secret: &state.config.stripe_endpoint_secret,
        tolerance_secs: state.config.signature_tolerance_secs,
    };

    let outcome = process_webhook(auth, &state.emitter, &body, signature).await?;

    let status = match outcome {
        DispatchOutcome::Forwarded(_) => "forwarded",
        DispatchOutcome::Ignored(_) => "ignored",
        DispatchOutcome::Rejected(_) => "rejected",
    };

    Ok(Json(WebhookResponse { status }))
}

// =============================================================================
// Checkout Sessions
// =============================================================================

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Converts checkout failures into HTTP responses.
pub struct CheckoutApiError(CheckoutError);

impl From<CheckoutError> for CheckoutApiError {
    fn from(err: CheckoutError) -> Self {
        Self(err)
    }
}

impl IntoResponse for CheckoutApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CheckoutError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CheckoutError::Provider(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            CheckoutError::Provider(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(ErrorResponse { error: self.0.public_message() })).into_response()
    }
}

/// Create a hosted checkout session for an order.
///
/// A body that does not deserialize gets the same JSON error shape as one
/// that fails validation.
pub async fn create_payment_session(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutSessionResult>, CheckoutApiError> {
    let Json(request) = payload.map_err(|rejection| {
        let reason = rejection.body_text();
        warn!(
            status = rejection.status().as_u16(),
            reason = %reason,
            "checkout_request_unparsable"
        );
        CheckoutError::InvalidRequest(reason)
    })?;

    // Provider failures are logged by the factory
    let result = state.sessions.create_session(&request).await.map_err(|e| {
        if let CheckoutError::InvalidRequest(reason) = &e {
            warn!(order_id = %request.order_id, reason = %reason, "checkout_request_invalid");
        }
        e
    })?;

    Ok(Json(result))
}

// =============================================================================
// Redirect Landing Pages
// =============================================================================

#[derive(Serialize)]
pub struct RedirectResponse {
    pub ok: bool,
    pub message: &'static str,
}

pub async fn payment_success() -> Json<RedirectResponse> {
    Json(RedirectResponse {
        ok: true,
        message: "Payment successful",
    })
}

pub async fn payment_cancel() -> Json<RedirectResponse> {
    Json(RedirectResponse {
        ok: false,
        message: "Payment cancelled",
    })
}

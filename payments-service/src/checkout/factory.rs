//! Hosted checkout session creation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::types::{to_minor_units, CheckoutRequest, CheckoutSessionResult};
use crate::error::{CheckoutError, ProviderError};

/// Metadata key carrying the order id. The webhook dispatcher reads it back
/// from `charge.metadata`.
pub const ORDER_ID_METADATA_KEY: &str = "orderId";

/// A line item in the processor's representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLineItem {
    pub name: String,
    pub currency: String,
    /// Price in minor units (cents)
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Everything the processor needs to open a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub order_id: String,
    pub line_items: Vec<ProviderLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

/// The processor's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSession {
    pub id: String,
    pub url: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// Port to the payment processor.
#[async_trait]
pub trait CreateSession: Send + Sync {
    async fn create_session(&self, params: &SessionParams) -> Result<ProviderSession, ProviderError>;
}

/// Builds session requests from orders and calls the processor once.
pub struct CheckoutSessionFactory {
    provider: Arc<dyn CreateSession>,
    success_url: String,
    cancel_url: String,
}

impl CheckoutSessionFactory {
    pub fn new(provider: Arc<dyn CreateSession>, success_url: String, cancel_url: String) -> Self {
        Self {
            provider,
            success_url,
            cancel_url,
        }
    }

    /// Translate the request into processor terms.
    pub fn build_params(&self, request: &CheckoutRequest) -> Result<SessionParams, CheckoutError> {
        request.validate()?;

        let line_items = request
            .items
            .iter()
            .map(|item| {
                let unit_amount = to_minor_units(item.price).ok_or_else(|| {
                    CheckoutError::InvalidRequest(format!("price of {} is out of range", item.name))
                })?;
                Ok(ProviderLineItem {
                    name: item.name.clone(),
                    currency: request.currency.clone(),
                    unit_amount,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, CheckoutError>>()?;

        Ok(SessionParams {
            order_id: request.order_id.clone(),
            line_items,
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
        })
    }

    /// Create a hosted checkout session for the order.
    pub async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSessionResult, CheckoutError> {
        let params = self.build_params(request)?;

        info!(
            order_id = %params.order_id,
            currency = %request.currency,
            line_items = params.line_items.len(),
            "checkout_session_creating"
        );

        let session = self.provider.create_session(&params).await.map_err(|e| {
            error!(
                order_id = %params.order_id,
                status = ?e.status,
                error = %e,
                "checkout_session_provider_error"
            );
            e
        })?;

        let session_url = session.url.ok_or_else(|| {
            error!(
                order_id = %params.order_id,
                session_id = %session.id,
                "checkout_session_missing_url"
            );
            ProviderError::network(format!("session {} has no url", session.id))
        })?;

        info!(
            order_id = %params.order_id,
            session_id = %session.id,
            "checkout_session_created"
        );

        Ok(CheckoutSessionResult {
            cancel_url: session.cancel_url.unwrap_or(params.cancel_url),
            success_url: session.success_url.unwrap_or(params.success_url),
            session_url,
        })
    }
}

//! Stripe Checkout API client.
//!
//! Reference: https://docs.stripe.com/api/checkout/sessions/create

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use super::factory::{CreateSession, ProviderSession, SessionParams, ORDER_ID_METADATA_KEY};
use crate::error::ProviderError;
use crate::Config;

/// Calls `POST /v1/checkout/sessions`. One round trip, no retries.
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret.clone(),
        })
    }
}

#[async_trait]
impl CreateSession for StripeClient {
    async fn create_session(&self, params: &SessionParams) -> Result<ProviderSession, ProviderError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&session_form(params))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!(error = %e, "stripe_request_timeout");
                } else {
                    error!(error = %e, "stripe_request_error");
                }
                ProviderError::network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::http(status.as_u16(), error_message(&body)));
        }

        let session: StripeCheckoutSession = serde_json::from_str(&body).map_err(|e| {
            ProviderError::http(status.as_u16(), format!("Failed to parse Stripe response: {}", e))
        })?;

        info!(
            session_id = %session.id,
            status_code = status.as_u16(),
            "stripe_session_created"
        );

        Ok(session.into())
    }
}

/// Encode session parameters in Stripe's bracketed form syntax.
pub fn session_form(params: &SessionParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), params.success_url.clone()),
        ("cancel_url".to_string(), params.cancel_url.clone()),
        (
            format!("payment_intent_data[metadata][{}]", ORDER_ID_METADATA_KEY),
            params.order_id.clone(),
        ),
    ];

    for (i, item) in params.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((format!("{}[price_data][currency]", prefix), item.currency.clone()));
        form.push((format!("{}[price_data][product_data][name]", prefix), item.name.clone()));
        form.push((format!("{}[price_data][unit_amount]", prefix), item.unit_amount.to_string()));
        form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }

    form
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    success_url: Option<String>,
    #[serde(default)]
    cancel_url: Option<String>,
}

impl From<StripeCheckoutSession> for ProviderSession {
    fn from(s: StripeCheckoutSession) -> Self {
        ProviderSession {
            id: s.id,
            url: s.url,
            success_url: s.success_url,
            cancel_url: s.cancel_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Pull `error.message` out of a Stripe error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<StripeErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::factory::ProviderLineItem;

    fn params() -> SessionParams {
        SessionParams {
            order_id: "ord_9".to_string(),
            line_items: vec![
                ProviderLineItem {
                    name: "A".to_string(),
                    currency: "usd".to_string(),
                    unit_amount: 2000,
                    quantity: 2,
                },
                ProviderLineItem {
                    name: "B".to_string(),
                    currency: "usd".to_string(),
                    unit_amount: 150,
                    quantity: 1,
                },
            ],
            success_url: "https://s".to_string(),
            cancel_url: "https://c".to_string(),
        }
    }

    fn get<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_form() {
        let form = session_form(&params());

        assert_eq!(get(&form, "mode"), Some("payment"));
        assert_eq!(get(&form, "success_url"), Some("https://s"));
        assert_eq!(get(&form, "cancel_url"), Some("https://c"));
        assert_eq!(get(&form, "payment_intent_data[metadata][orderId]"), Some("ord_9"));
        assert_eq!(get(&form, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get(&form, "line_items[0][price_data][product_data][name]"), Some("A"));
        assert_eq!(get(&form, "line_items[0][price_data][unit_amount]"), Some("2000"));
        assert_eq!(get(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(get(&form, "line_items[1][price_data][unit_amount]"), Some("150"));
        assert_eq!(form.len(), 4 + 2 * 4);
    }

    #[test]
    fn test_session_response_mapping() {
        let body = r#"{
            "id": "cs_test_a1",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_a1",
            "success_url": "https://s",
            "cancel_url": "https://c",
            "mode": "payment"
        }"#;

        let session: ProviderSession = serde_json::from_str::<StripeCheckoutSession>(body)
            .unwrap()
            .into();

        assert_eq!(session.id, "cs_test_a1");
        assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.com/c/pay/cs_test_a1"));
        assert_eq!(session.cancel_url.as_deref(), Some("https://c"));
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"Invalid currency: zzz"}}"#;
        assert_eq!(error_message(body), "Invalid currency: zzz");
        assert_eq!(error_message("upstream exploded"), "upstream exploded");
    }

    #[test]
    fn test_client_trims_base_url() {
        let config = Config {
            stripe_api_base: "http://localhost:12111/".to_string(),
            ..crate::config::test_config()
        };
        let client = StripeClient::new(&config).unwrap();
        assert_eq!(client.api_base, "http://localhost:12111");
    }
}

//! Payment session gateway.
//!
//! The gateway hosts the checkout page. Creating a session returns the URL
//! to send the customer to and an opaque session id; the provider later
//! redirects to our success or cancel callback carrying that id.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::PaymentConfig;

/// Placeholder the provider substitutes with the real session id
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub redirect_url: String,
    pub session_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to payment provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed payment provider response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout session charging `amount` minor currency units.
    /// Not idempotent: every call creates a new session.
    async fn create_session(&self, amount: i64) -> Result<CheckoutSession, GatewayError>;
}

/// Stripe Checkout client
pub struct StripeCheckout {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
    currency: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl StripeCheckout {
    pub fn new(config: &PaymentConfig, public_api_url: &str) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let base = public_api_url.trim_end_matches('/');

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
            success_url: format!(
                "{base}/connection/purchase-ticket/succeeded/{SESSION_ID_PLACEHOLDER}"
            ),
            cancel_url: format!("{base}/connection/purchase-ticket/failed/{SESSION_ID_PLACEHOLDER}"),
        })
    }

    fn form(&self, amount: i64) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.currency.clone()),
            ("line_items[0][price_data][unit_amount]", amount.to_string()),
            ("line_items[0][price_data][product_data][name]", "Ticket".to_string()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckout {
    async fn create_session(&self, amount: i64) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .form(&self.form(amount))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(rejection(status.as_u16(), &body));
        }

        let session = parse_session(&body)?;
        tracing::debug!(session_id = %session.session_id, amount, "Checkout session created");
        Ok(session)
    }
}

fn parse_session(body: &str) -> Result<CheckoutSession, GatewayError> {
    let parsed: SessionBody =
        serde_json::from_str(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;

    let redirect_url = parsed
        .url
        .ok_or_else(|| GatewayError::Malformed("session has no checkout url".to_string()))?;

    if parsed.id.is_empty() {
        return Err(GatewayError::Malformed("session id is empty".to_string()));
    }

    Ok(CheckoutSession {
        redirect_url,
        session_id: parsed.id,
    })
}

fn rejection(status: u16, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    GatewayError::Rejected { status, message }
}

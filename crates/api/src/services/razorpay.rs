//! Razorpay orders API client and payment signature check.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::RazorpayConfig;

/// Razorpay API base URL.
const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

type HmacSha256 = Hmac<Sha256>;

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum RazorpayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Razorpay error {code}: {description}")]
    Api { code: String, description: String },

    #[error("payment signature mismatch")]
    InvalidSignature,
}

/// An order created on the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    description: String,
}

/// Client for the Razorpay REST API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: SecretString,
    currency: String,
}

impl fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    #[must_use]
    pub fn new(config: &RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Public key id, handed to the storefront checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Create a gateway order for `amount_minor` in the configured currency.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::Api` with Razorpay's error code if rejected.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        amount_minor: i64,
        receipt: &str,
    ) -> Result<GatewayOrder, RazorpayError> {
        let response = self
            .client
            .post(format!("{RAZORPAY_API_BASE}/orders"))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount: amount_minor,
                currency: &self.currency,
                receipt,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }

        let order: GatewayOrder = serde_json::from_str(&body).map_err(|e| RazorpayError::Api {
            code: "PARSE_ERROR".to_owned(),
            description: e.to_string(),
        })?;
        debug!(gateway_order_id = %order.id, "Created gateway order");
        Ok(order)
    }

    /// Check the signature the checkout widget returns after payment.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::InvalidSignature` if it does not match.
    pub fn verify_payment_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), RazorpayError> {
        verify_signature(
            self.key_secret.expose_secret(),
            order_id,
            payment_id,
            signature,
        )
    }
}

/// Fresh receipt reference for a gateway order.
#[must_use]
pub fn new_receipt() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("order_rcptid_{suffix}")
}

fn parse_error(status: u16, body: &str) -> RazorpayError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => RazorpayError::Api {
            code: parsed.error.code,
            description: parsed.error.description,
        },
        Err(_) => RazorpayError::Api {
            code: format!("HTTP_{status}"),
            description: body.chars().take(200).collect(),
        },
    }
}

fn verify_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), RazorpayError> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|_| RazorpayError::InvalidSignature)?;
    mac.update(format!("{order_id}|{payment_id}").as_bytes());

    let expected =
        hex::decode(signature.trim()).map_err(|_| RazorpayError::InvalidSignature)?;
    mac.verify_slice(&expected)
        .map_err(|_| RazorpayError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret_value";
    const ORDER: &str = "order_IEIaMR65cu6nz3";
    const PAYMENT: &str = "pay_IH4NVgf4Dreq1l";
    const SIGNATURE: &str = "a52e2f389d0ff0ce51dfb342132c609fbef88d5e6f803b3c402b0bdbfb3184a9";

    #[test]
    fn test_valid_signature() {
        assert!(verify_signature(SECRET, ORDER, PAYMENT, SIGNATURE).is_ok());
    }

    #[test]
    fn test_tampered_signature() {
        assert!(verify_signature(SECRET, ORDER, "pay_other", SIGNATURE).is_err());
        assert!(verify_signature("other_secret", ORDER, PAYMENT, SIGNATURE).is_err());
        assert!(verify_signature(SECRET, ORDER, PAYMENT, "not-hex").is_err());
    }

    #[test]
    fn test_receipt_format() {
        let receipt = new_receipt();
        assert!(receipt.starts_with("order_rcptid_"));
        assert_eq!(receipt.len(), "order_rcptid_".len() + 12);
        assert_ne!(receipt, new_receipt());
    }

    #[test]
    fn test_parse_error_body() {
        let err = parse_error(
            400,
            r#"{"error": {"code": "BAD_REQUEST_ERROR", "description": "amount invalid"}}"#,
        );
        assert_eq!(err.to_string(), "Razorpay error BAD_REQUEST_ERROR: amount invalid");

        let err = parse_error(503, "gateway unavailable");
        assert_eq!(err.to_string(), "Razorpay error HTTP_503: gateway unavailable");
    }
}

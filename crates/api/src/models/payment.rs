//! Payment models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CustomerId, OrderId, PaymentId, PaymentMode, PaymentStatus};

/// Payment record for an order (one per order).
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub code: String,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub mode: PaymentMode,
    pub is_refunded: bool,
    /// Order id issued by the payment gateway.
    pub gateway_order_id: Option<String>,
    /// Payment id reported by the gateway on success.
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for the payment listing.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub mode: Option<PaymentMode>,
}

/// Body posted by the storefront after the gateway checkout completes.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    /// Our order id or code.
    pub order: String,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

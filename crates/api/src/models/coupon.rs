//! Coupon models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CouponId, CouponTerms, CustomerId, ProductId};

/// A discount code.
#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    /// The code customers type at checkout.
    pub coupon_name: String,
    /// Percentage off.
    pub discount: Decimal,
    pub minimum_amount: Decimal,
    pub up_to_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    /// Products the coupon is limited to; empty applies to everything.
    pub product_ids: Vec<ProductId>,
    /// Customers who have redeemed the coupon.
    pub used_by: Vec<CustomerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    #[must_use]
    pub fn terms(&self) -> CouponTerms {
        CouponTerms {
            discount_percent: self.discount,
            minimum_amount: self.minimum_amount,
            up_to_amount: self.up_to_amount,
            starts_at: self.start_date,
            ends_at: self.end_date,
            is_active: self.is_active,
            product_ids: self.product_ids.clone(),
        }
    }

    #[must_use]
    pub fn is_used_by(&self, customer: CustomerId) -> bool {
        self.used_by.contains(&customer)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub coupon_name: String,
    pub discount: Decimal,
    #[serde(default)]
    pub minimum_amount: Decimal,
    pub up_to_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "super::pickup::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
}

impl NewCoupon {
    #[must_use]
    pub fn terms(&self) -> CouponTerms {
        CouponTerms {
            discount_percent: self.discount,
            minimum_amount: self.minimum_amount,
            up_to_amount: self.up_to_amount,
            starts_at: self.start_date,
            ends_at: self.end_date,
            is_active: self.is_active,
            product_ids: self.product_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponUpdate {
    pub coupon_name: Option<String>,
    pub discount: Option<Decimal>,
    pub minimum_amount: Option<Decimal>,
    pub up_to_amount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub product_ids: Option<Vec<ProductId>>,
}

impl CouponUpdate {
    /// Terms after applying this update to `current`.
    #[must_use]
    pub fn merged_terms(&self, current: &Coupon) -> CouponTerms {
        CouponTerms {
            discount_percent: self.discount.unwrap_or(current.discount),
            minimum_amount: self.minimum_amount.unwrap_or(current.minimum_amount),
            up_to_amount: self.up_to_amount.unwrap_or(current.up_to_amount),
            starts_at: self.start_date.unwrap_or(current.start_date),
            ends_at: self.end_date.unwrap_or(current.end_date),
            is_active: self.is_active.unwrap_or(current.is_active),
            product_ids: self
                .product_ids
                .clone()
                .unwrap_or_else(|| current.product_ids.clone()),
        }
    }
}

/// Filters for the coupon listing.
#[derive(Debug, Clone, Default)]
pub struct CouponFilter {
    pub is_active: Option<bool>,
    /// Coupons starting on or after this instant.
    pub starts_from: Option<DateTime<Utc>>,
    /// Coupons ending on or before this instant.
    pub ends_until: Option<DateTime<Utc>>,
    pub product_id: Option<ProductId>,
    pub used_by: Option<CustomerId>,
    pub search: Option<String>,
}

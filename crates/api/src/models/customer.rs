//! Customer account models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CustomerId, Email};

use super::{ImageAsset, ProductSummary};

/// A customer account. The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub code: String,
    pub name: String,
    pub email: Email,
    pub mobile: String,
    pub is_login: bool,
    pub profile_image: Option<ImageAsset>,
    /// Free-form address objects as submitted by the storefront.
    pub addresses: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields a customer may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub addresses: Option<Vec<serde_json::Value>>,
    pub password: Option<String>,
}

/// One line of a cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product: ProductSummary,
    pub quantity: i32,
    pub line_total: Decimal,
    pub added_at: DateTime<Utc>,
}

/// A customer's cart with totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl Cart {
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|line| i64::from(line.quantity)).sum();
        let subtotal = lines.iter().map(|line| line.line_total).sum();
        Self {
            lines,
            item_count,
            subtotal,
        }
    }
}

/// A wishlist entry.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistEntry {
    pub product: ProductSummary,
    pub added_at: DateTime<Utc>,
}

/// Filters applied to a customer's wishlist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WishlistFilter {
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub category: Option<String>,
    pub name: Option<String>,
}

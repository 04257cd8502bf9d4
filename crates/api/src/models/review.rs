//! Product review models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{CustomerId, ProductId, ReviewId};

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub code: String,
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub rating: i16,
    pub title: String,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    /// Product id or code.
    pub product: String,
    pub rating: i16,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUpdate {
    pub rating: Option<i16>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_active: Option<bool>,
}

/// Filters for the review listing.
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub product_id: Option<ProductId>,
    pub customer_id: Option<CustomerId>,
    pub is_active: Option<bool>,
}

/// Ratings run from one to five stars.
#[must_use]
pub fn is_valid_rating(rating: i16) -> bool {
    (1..=5).contains(&rating)
}

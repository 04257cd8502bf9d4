//! Attribute models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{AttributeId, ProductId};

use super::pickup::default_true;

/// A filterable label attached to a set of products.
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub code: String,
    pub attribute_title: String,
    pub product_ids: Vec<ProductId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAttribute {
    pub attribute_title: String,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// `product_ids`, when present, replaces the linked set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeUpdate {
    pub attribute_title: Option<String>,
    pub product_ids: Option<Vec<ProductId>>,
    pub is_active: Option<bool>,
}

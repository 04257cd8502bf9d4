//! Pickup point models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::PickupId;

/// A dispatch origin that products ship from.
#[derive(Debug, Clone, Serialize)]
pub struct Pickup {
    pub id: PickupId,
    pub code: String,
    pub name: String,
    pub location: String,
    pub pin_code: String,
    pub mobile: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPickup {
    pub name: String,
    pub location: String,
    pub pin_code: String,
    pub mobile: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PickupUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub pin_code: Option<String>,
    pub mobile: Option<String>,
    pub is_active: Option<bool>,
}

pub(crate) const fn default_true() -> bool {
    true
}

//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use bazaar_core::{CustomerId, Email, StaffRole, StaffUserId};

/// Session-stored customer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Customer's database ID.
    pub id: CustomerId,
    /// Customer's public code.
    pub code: String,
    /// Customer's email address.
    pub email: Email,
}

/// Session-stored staff identity.
///
/// Only the id is trusted on later requests; the staff extractors reload the
/// account so deactivation and role changes apply immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStaff {
    pub id: StaffUserId,
    pub code: String,
    pub name: String,
    pub role: StaffRole,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for storing the logged-in staff user.
    pub const CURRENT_STAFF: &str = "current_staff";
}

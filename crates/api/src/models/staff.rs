//! Back-office staff accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{Email, StaffRole, StaffUserId};

use super::CurrentStaff;

#[derive(Debug, Clone, Serialize)]
pub struct StaffUser {
    pub id: StaffUserId,
    pub code: String,
    pub name: String,
    pub role: StaffRole,
    pub email: Option<Email>,
    pub phone: String,
    pub active_state: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StaffUser> for CurrentStaff {
    fn from(user: &StaffUser) -> Self {
        Self {
            id: user.id,
            code: user.code.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStaffUser {
    pub name: String,
    pub role: StaffRole,
    pub email: Option<String>,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffUserUpdate {
    pub name: Option<String>,
    pub role: Option<StaffRole>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub active_state: Option<bool>,
}

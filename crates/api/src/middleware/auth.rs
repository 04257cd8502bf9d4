//! Authentication extractors.
//!
//! Customer and staff identities are stored in the session at login. The
//! extractors read them back and reject with a JSON `401`/`403`. Staff
//! sessions are checked against the account on every request, so a deleted
//! or deactivated user is logged out and a role change applies at once.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn cart(RequireCustomer(customer): RequireCustomer) -> Result<Json<Cart>> {
//!     ...
//! }
//! ```

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tower_sessions::Session;

use crate::db::StaffRepository;
use crate::error::AppError;
use crate::models::{CurrentCustomer, CurrentStaff, StaffUser, session_keys};
use crate::state::AppState;

async fn session_value<T>(parts: &Parts, key: &str) -> Result<Option<T>, AppError>
where
    T: serde::de::DeserializeOwned,
{
    let Some(session) = parts.extensions.get::<Session>() else {
        return Ok(None);
    };
    Ok(session.get::<T>(key).await?)
}

/// Resolve the staff session against the stored account.
///
/// Missing or deactivated accounts yield `None` and are dropped from the
/// session.
async fn session_staff(parts: &Parts, state: &AppState) -> Result<Option<CurrentStaff>, AppError> {
    let Some(staff) = session_value::<CurrentStaff>(parts, session_keys::CURRENT_STAFF).await?
    else {
        return Ok(None);
    };
    let account = StaffRepository::new(state.pool())
        .get_by_id(staff.id)
        .await?;
    match active_staff(account) {
        Some(current) => Ok(Some(current)),
        None => {
            if let Some(session) = parts.extensions.get::<Session>() {
                clear_current_staff(session).await?;
            }
            tracing::info!(staff = %staff.code, "Revoked staff session");
            Ok(None)
        }
    }
}

fn active_staff(account: Option<StaffUser>) -> Option<CurrentStaff> {
    account
        .filter(|user| user.active_state)
        .map(|user| CurrentStaff::from(&user))
}

fn require_writer(staff: CurrentStaff) -> Result<CurrentStaff, AppError> {
    if staff.role.can_write() {
        Ok(staff)
    } else {
        Err(AppError::Forbidden("Read-only account".to_string()))
    }
}

fn require_super_admin(staff: CurrentStaff) -> Result<CurrentStaff, AppError> {
    if staff.role.can_manage_staff() {
        Ok(staff)
    } else {
        Err(AppError::Forbidden("Super admin access required".to_string()))
    }
}

/// Extractor that requires a logged-in customer.
pub struct RequireCustomer(pub CurrentCustomer);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_value(parts, session_keys::CURRENT_CUSTOMER)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))
    }
}

/// Extractor that optionally gets the current customer.
pub struct OptionalCustomer(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            session_value(parts, session_keys::CURRENT_CUSTOMER).await?,
        ))
    }
}

/// Extractor that requires a logged-in staff user of any role.
pub struct RequireStaff(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        session_staff(parts, &AppState::from_ref(state))
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Staff login required".to_string()))
    }
}

/// Extractor that optionally gets the current staff user.
pub struct OptionalStaff(pub Option<CurrentStaff>);

impl<S> FromRequestParts<S> for OptionalStaff
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_staff(parts, &AppState::from_ref(state)).await?))
    }
}

/// Extractor for staff allowed to change store data (not `viewer`).
pub struct RequireStaffWriter(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireStaffWriter
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireStaff(staff) = RequireStaff::from_request_parts(parts, state).await?;
        require_writer(staff).map(Self)
    }
}

/// Extractor for staff allowed to manage staff accounts.
pub struct RequireSuperAdmin(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireStaff(staff) = RequireStaff::from_request_parts(parts, state).await?;
        require_super_admin(staff).map(Self)
    }
}

/// Store the customer in the session, issuing a fresh session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Remove the customer from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    Ok(())
}

/// Store the staff user in the session, issuing a fresh session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_STAFF, staff).await
}

/// Remove the staff user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_staff(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentStaff>(session_keys::CURRENT_STAFF)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tower_sessions::MemoryStore;

    use bazaar_core::{StaffRole, StaffUserId};

    use super::*;

    fn staff(role: StaffRole) -> CurrentStaff {
        CurrentStaff {
            id: StaffUserId::new(1),
            code: "USR000001".to_string(),
            name: "Asha".to_string(),
            role,
        }
    }

    fn account(role: StaffRole, active_state: bool) -> StaffUser {
        StaffUser {
            id: StaffUserId::new(1),
            code: "USR000001".to_string(),
            name: "Asha".to_string(),
            role,
            email: None,
            phone: "9876543210".to_string(),
            active_state,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn parts_with_staff(role: Option<StaffRole>) -> Parts {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        if let Some(role) = role {
            session
                .insert(session_keys::CURRENT_STAFF, staff(role))
                .await
                .unwrap();
        }
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(session);
        parts
    }

    #[tokio::test]
    async fn test_staff_session_round_trips() {
        let parts = parts_with_staff(Some(StaffRole::Viewer)).await;
        let stored: Option<CurrentStaff> = session_value(&parts, session_keys::CURRENT_STAFF)
            .await
            .unwrap();
        assert_eq!(stored.unwrap().role, StaffRole::Viewer);

        let parts = parts_with_staff(None).await;
        let stored: Option<CurrentStaff> = session_value(&parts, session_keys::CURRENT_STAFF)
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[test]
    fn test_deleted_or_deactivated_staff_lose_access() {
        assert!(active_staff(None).is_none());
        assert!(active_staff(Some(account(StaffRole::Admin, false))).is_none());
        assert!(active_staff(Some(account(StaffRole::Admin, true))).is_some());
    }

    #[test]
    fn test_role_comes_from_the_account() {
        let current = active_staff(Some(account(StaffRole::Viewer, true))).unwrap();
        assert_eq!(current.role, StaffRole::Viewer);
        assert_eq!(current.code, "USR000001");
    }

    #[test]
    fn test_viewer_cannot_write() {
        let err = require_writer(staff(StaffRole::Viewer)).err().unwrap();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(require_writer(staff(StaffRole::Admin)).is_ok());
    }

    #[test]
    fn test_admin_is_not_super_admin() {
        assert!(require_super_admin(staff(StaffRole::Admin)).is_err());
        assert!(require_super_admin(staff(StaffRole::SuperAdmin)).is_ok());
    }

    #[tokio::test]
    async fn test_optional_customer_without_session_layer() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        let OptionalCustomer(customer) = OptionalCustomer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(customer.is_none());
    }

    #[tokio::test]
    async fn test_missing_customer_is_unauthorized() {
        let mut parts = parts_with_staff(Some(StaffRole::Admin)).await;
        let err = RequireCustomer::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}

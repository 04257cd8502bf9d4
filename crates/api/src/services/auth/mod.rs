//! Authentication service.
//!
//! Password login for customers and staff. Hashes are Argon2id in PHC
//! string format; the session layer keeps the logged-in identity.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use bazaar_core::{Email, Phone};

use crate::db::staff::{StaffChange, StaffInsert};
use crate::db::{CustomerRepository, RepositoryError, StaffRepository};
use crate::models::{Customer, NewStaffUser, StaffUser, StaffUserUpdate};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    customers: CustomerRepository<'a>,
    staff: StaffRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            customers: CustomerRepository::new(pool),
            staff: StaffRepository::new(pool),
        }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Register a customer with email, mobile and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` / `InvalidPhone` for malformed input.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::AlreadyExists` if the email or mobile is taken.
    pub async fn register_customer(
        &self,
        name: &str,
        email: &str,
        mobile: &str,
        password: &str,
    ) -> Result<Customer, AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::MissingName);
        }
        let email = Email::parse(email)?;
        let mobile = Phone::parse(mobile)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.customers
            .create(name, &email, mobile.as_str(), &password_hash)
            .await
            .map_err(conflict_to_exists)
    }

    /// Log a customer in by email or mobile and mark them logged in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the account or password is wrong.
    pub async fn login_customer(
        &self,
        email_or_mobile: &str,
        password: &str,
    ) -> Result<Customer, AuthError> {
        let (id, password_hash) = self
            .customers
            .get_credentials(email_or_mobile)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(self.customers.set_login(id, true).await?)
    }

    // =========================================================================
    // Staff
    // =========================================================================

    /// Log a staff user in by email or phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the account or password is wrong.
    /// Returns `AuthError::AccountDisabled` if the account is inactive.
    pub async fn login_staff(
        &self,
        email_or_phone: &str,
        password: &str,
    ) -> Result<StaffUser, AuthError> {
        let credentials = self
            .staff
            .get_credentials(email_or_phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        if !credentials.active_state {
            return Err(AuthError::AccountDisabled);
        }

        self.staff
            .get_by_id(credentials.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Create a staff account.
    ///
    /// # Errors
    ///
    /// Returns validation errors for malformed input.
    /// Returns `AuthError::AlreadyExists` if the email or phone is taken.
    pub async fn create_staff(&self, input: &NewStaffUser) -> Result<StaffUser, AuthError> {
        let email = input
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(Email::parse)
            .transpose()?;
        let phone = Phone::parse(&input.phone)?;
        validate_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        self.staff
            .create(&StaffInsert {
                name: &input.name,
                role: input.role,
                email: email.as_ref(),
                phone: phone.as_str(),
                password_hash: &password_hash,
            })
            .await
            .map_err(conflict_to_exists)
    }

    /// Update a staff account, re-hashing a new password.
    ///
    /// # Errors
    ///
    /// Returns validation errors for malformed input.
    /// Returns `AuthError::AlreadyExists` if the new email or phone is taken.
    pub async fn update_staff(
        &self,
        id: bazaar_core::StaffUserId,
        update: &StaffUserUpdate,
    ) -> Result<StaffUser, AuthError> {
        let email = update.email.as_deref().map(Email::parse).transpose()?;
        let phone = update.phone.as_deref().map(Phone::parse).transpose()?;
        let password_hash = match update.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        self.staff
            .update(
                id,
                &StaffChange {
                    name: update.name.as_deref(),
                    role: update.role,
                    email: email.as_ref(),
                    phone: phone.as_ref().map(Phone::as_str),
                    password_hash: password_hash.as_deref(),
                    active_state: update.active_state,
                },
            )
            .await
            .map_err(conflict_to_exists)
    }
}

fn conflict_to_exists(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::Conflict(msg) => AuthError::AlreadyExists(msg),
        other => AuthError::Repository(other),
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password does not match.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }
}

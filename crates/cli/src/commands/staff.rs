//! Staff account bootstrap.
//!
//! # Usage
//!
//! ```bash
//! BAZAAR_STAFF_PASSWORD='...' bazaar-cli staff create -n "Asha" -p 9876543210 -r super_admin
//! ```
//!
//! The password is read from `--password` or `BAZAAR_STAFF_PASSWORD`, so it
//! can be kept out of shell history.

use bazaar_api::models::NewStaffUser;
use bazaar_api::services::auth::AuthService;
use bazaar_core::StaffRole;

use super::{CommandError, connect};

/// Environment variable consulted when `--password` is not given.
pub const PASSWORD_VAR: &str = "BAZAAR_STAFF_PASSWORD";

/// Pick the password from the flag, then the environment.
fn resolve_password(flag: Option<String>, env: Option<String>) -> Result<String, CommandError> {
    flag.or(env)
        .filter(|p| !p.is_empty())
        .ok_or(CommandError::MissingEnvVar(PASSWORD_VAR))
}

fn parse_role(role: &str) -> Result<StaffRole, CommandError> {
    role.parse().map_err(|_| {
        CommandError::Invalid(format!(
            "Invalid role: {role}. Valid roles: super_admin, admin, viewer"
        ))
    })
}

/// Create a staff user.
///
/// # Errors
///
/// Returns an error for an unknown role, a missing password, invalid input
/// or an email/phone that is already registered.
pub async fn create(
    name: &str,
    phone: &str,
    email: Option<String>,
    role: &str,
    password: Option<String>,
) -> Result<(), CommandError> {
    let role = parse_role(role)?;
    let password = resolve_password(password, std::env::var(PASSWORD_VAR).ok())?;
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .create_staff(&NewStaffUser {
            name: name.to_owned(),
            role,
            email,
            phone: phone.to_owned(),
            password,
        })
        .await?;

    tracing::info!(
        "Staff user created successfully! Code: {}, Phone: {}, Role: {}",
        user.code,
        user.phone,
        user.role
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_env() {
        let password =
            resolve_password(Some("from-flag".into()), Some("from-env".into())).unwrap();
        assert_eq!(password, "from-flag");
        assert_eq!(
            resolve_password(None, Some("from-env".into())).unwrap(),
            "from-env"
        );
    }

    #[test]
    fn test_missing_password() {
        assert!(matches!(
            resolve_password(None, Some(String::new())),
            Err(CommandError::MissingEnvVar(PASSWORD_VAR))
        ));
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("super_admin").unwrap(), StaffRole::SuperAdmin);
        assert!(parse_role("owner").is_err());
    }
}

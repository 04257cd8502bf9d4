//! Staff account handlers.
//!
//! Login, logout and check-auth are open to any staff user. Account
//! management needs the `super_admin` role.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{PageRequest, SortOrder, StaffUserId, pagination::DEFAULT_LIMIT};

use crate::db::{RecordSort, StaffRepository};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    RequireStaff, RequireSuperAdmin, clear_current_staff, login_rate_limiter, set_current_staff,
};
use crate::models::{CurrentStaff, NewStaffUser, StaffUser, StaffUserUpdate};
use crate::services::auth::AuthService;
use crate::state::AppState;

use super::{Message, Paged, found, record, required};

/// Build the staff router.
pub fn router() -> Router<AppState> {
    let login = Router::new()
        .route("/staff/login", post(login))
        .route_layer(login_rate_limiter());

    Router::new()
        .merge(login)
        .route("/staff/logout", post(logout))
        .route("/staff/check-auth", get(check_auth))
        .route("/staff", get(list).post(create))
        .route("/staff/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email_or_phone: String,
    password: String,
}

#[instrument(skip(state, session, form))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<StaffUser>> {
    let user = AuthService::new(state.pool())
        .login_staff(form.email_or_phone.trim(), &form.password)
        .await?;

    set_current_staff(&session, &CurrentStaff::from(&user)).await?;
    set_sentry_user(&user.code, user.email.as_ref().map(|e| e.as_str()));

    tracing::info!(staff = %user.code, role = %user.role, "Staff logged in");
    Ok(Json(user))
}

async fn logout(session: Session, RequireStaff(staff): RequireStaff) -> Result<Json<Message>> {
    clear_current_staff(&session).await?;
    session.flush().await?;
    clear_sentry_user();

    tracing::info!(staff = %staff.code, "Staff logged out");
    Ok(Json(Message::new("Logged out")))
}

async fn check_auth(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> Result<Json<StaffUser>> {
    let user = StaffRepository::new(state.pool())
        .get_by_id(staff.id)
        .await?;
    user.map(Json)
        .ok_or_else(|| AppError::Unauthorized("Staff login required".to_string()))
}

#[instrument(skip(state, input), fields(staff = %admin.code))]
async fn create(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(input): Json<NewStaffUser>,
) -> Result<(StatusCode, Json<StaffUser>)> {
    required(&input.name, "name")?;
    let user = AuthService::new(state.pool()).create_staff(&input).await?;

    tracing::info!(user = %user.code, role = %user.role, "Staff user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Default, Deserialize)]
struct StaffQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: RecordSort,
    #[serde(default)]
    order: SortOrder,
    active_state: Option<bool>,
}

async fn list(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
    Query(query): Query<StaffQuery>,
) -> Result<Json<Paged<StaffUser>>> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);
    let result = StaffRepository::new(state.pool())
        .list(query.active_state, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn show(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StaffUser>> {
    let user = StaffRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(user, "Staff user")?))
}

#[instrument(skip(state, update), fields(staff = %admin.code))]
async fn update(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StaffUserUpdate>,
) -> Result<Json<StaffUser>> {
    if let Some(name) = update.name.as_deref() {
        required(name, "name")?;
    }
    let user = found(
        StaffRepository::new(state.pool())
            .get(&record(&id))
            .await?,
        "Staff user",
    )?;

    let updated = AuthService::new(state.pool())
        .update_staff(user.id, &update)
        .await?;
    Ok(Json(updated))
}

fn check_not_self(admin: StaffUserId, target: StaffUserId) -> Result<()> {
    if admin == target {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }
    Ok(())
}

#[instrument(skip(state), fields(staff = %admin.code))]
async fn destroy(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let repo = StaffRepository::new(state.pool());
    let user = found(repo.get(&record(&id)).await?, "Staff user")?;
    check_not_self(admin.id, user.id)?;

    repo.delete(user.id).await?;
    tracing::info!(user = %user.code, "Staff user deleted");
    Ok(Json(Message::new("Staff user deleted")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::StaffRole;

    use super::*;

    #[test]
    fn test_cannot_delete_self() {
        assert!(check_not_self(StaffUserId::new(1), StaffUserId::new(2)).is_ok());
        assert!(matches!(
            check_not_self(StaffUserId::new(3), StaffUserId::new(3)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_new_staff_user_role_names() {
        let input: NewStaffUser = serde_json::from_value(serde_json::json!({
            "name": "Ravi",
            "role": "viewer",
            "phone": "9876543210",
            "password": "correct horse"
        }))
        .unwrap();
        assert_eq!(input.role, StaffRole::Viewer);
        assert!(input.email.is_none());
    }
}

//! Pickup point handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bazaar_core::Phone;

use crate::db::PickupRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireStaff, RequireStaffWriter};
use crate::models::{NewPickup, Pickup, PickupUpdate};
use crate::state::AppState;

use super::{ListQuery, Message, Paged, found, record, required};

/// Build the pickups router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pickups", get(list).post(create))
        .route("/pickups/check-mobile", get(check_mobile))
        .route("/pickups/{id}", get(show).put(update).delete(destroy))
}

fn normalize_mobile(raw: &str) -> Result<String> {
    Ok(Phone::parse(raw)
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .into())
}

#[instrument(skip(state, input), fields(staff = %staff.code))]
async fn create(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Json(mut input): Json<NewPickup>,
) -> Result<(StatusCode, Json<Pickup>)> {
    required(&input.name, "name")?;
    required(&input.location, "location")?;
    required(&input.pin_code, "pin_code")?;
    input.mobile = normalize_mobile(&input.mobile)?;

    let pickup = PickupRepository::new(state.pool()).create(&input).await?;
    tracing::info!(pickup = %pickup.code, "Pickup created");
    Ok((StatusCode::CREATED, Json(pickup)))
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paged<Pickup>>> {
    let page = query.page();
    let result = PickupRepository::new(state.pool())
        .list(&query.filter(), page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

#[derive(Debug, Deserialize)]
struct MobileQuery {
    mobile: String,
}

#[derive(Debug, Serialize)]
struct MobileCheck {
    exists: bool,
}

async fn check_mobile(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<MobileQuery>,
) -> Result<Json<MobileCheck>> {
    let mobile = normalize_mobile(&query.mobile)?;
    let exists = PickupRepository::new(state.pool())
        .mobile_exists(&mobile)
        .await?;
    Ok(Json(MobileCheck { exists }))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Pickup>> {
    let pickup = PickupRepository::new(state.pool()).get(&record(&id)).await?;
    Ok(Json(found(pickup, "Pickup")?))
}

#[instrument(skip(state, update), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut update): Json<PickupUpdate>,
) -> Result<Json<Pickup>> {
    if let Some(mobile) = update.mobile.as_deref() {
        update.mobile = Some(normalize_mobile(mobile)?);
    }
    let pickup = PickupRepository::new(state.pool())
        .update(&record(&id), &update)
        .await?;
    Ok(Json(pickup))
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    PickupRepository::new(state.pool())
        .delete(&record(&id))
        .await?;
    Ok(Json(Message::new("Pickup deleted")))
}

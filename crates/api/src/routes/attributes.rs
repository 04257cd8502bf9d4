//! Attribute handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tracing::instrument;

use crate::db::AttributeRepository;
use crate::error::Result;
use crate::middleware::RequireStaffWriter;
use crate::models::{Attribute, AttributeUpdate, NewAttribute};
use crate::state::AppState;

use super::{ListQuery, Message, Paged, SearchQuery, found, record, required};

/// Build the attributes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attributes", get(list).post(create))
        .route("/attributes/search", get(search))
        .route("/attributes/{id}", get(show).put(update).delete(destroy))
}

#[instrument(skip(state, input), fields(staff = %staff.code))]
async fn create(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Json(input): Json<NewAttribute>,
) -> Result<(StatusCode, Json<Attribute>)> {
    required(&input.attribute_title, "attribute_title")?;
    let attribute = AttributeRepository::new(state.pool())
        .create(&input)
        .await?;
    tracing::info!(attribute = %attribute.code, "Attribute created");
    Ok((StatusCode::CREATED, Json(attribute)))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paged<Attribute>>> {
    let page = query.page();
    let result = AttributeRepository::new(state.pool())
        .list(&query.filter(), page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Attribute>>> {
    let attributes = AttributeRepository::new(state.pool())
        .search(&query.q, query.page().limit_i64())
        .await?;
    Ok(Json(attributes))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Attribute>> {
    let attribute = AttributeRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(attribute, "Attribute")?))
}

#[instrument(skip(state, update), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<AttributeUpdate>,
) -> Result<Json<Attribute>> {
    if let Some(title) = update.attribute_title.as_deref() {
        required(title, "attribute_title")?;
    }
    let attribute = AttributeRepository::new(state.pool())
        .update(&record(&id), &update)
        .await?;
    Ok(Json(attribute))
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    AttributeRepository::new(state.pool())
        .delete(&record(&id))
        .await?;
    Ok(Json(Message::new("Attribute deleted")))
}

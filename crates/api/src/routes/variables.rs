//! Variable definition handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tracing::instrument;

use crate::db::VariableRepository;
use crate::error::Result;
use crate::middleware::RequireStaffWriter;
use crate::models::variable::normalize_types;
use crate::models::{NewVariable, Variable, VariableUpdate};
use crate::state::AppState;

use super::{ListQuery, Message, Paged, found, record, required};

/// Default page size for variables.
const VARIABLES_DEFAULT_LIMIT: u32 = 20;

/// Build the variables router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/variables", get(list).post(create))
        .route("/variables/{id}", get(show).put(update).delete(destroy))
}

#[instrument(skip(state, input), fields(staff = %staff.code))]
async fn create(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Json(mut input): Json<NewVariable>,
) -> Result<(StatusCode, Json<Variable>)> {
    required(&input.variable_name, "variable_name")?;
    input.variable_types = normalize_types(input.variable_types);

    let variable = VariableRepository::new(state.pool()).create(input).await?;
    tracing::info!(variable = %variable.code, "Variable created");
    Ok((StatusCode::CREATED, Json(variable)))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paged<Variable>>> {
    let page = query.page_with_default(VARIABLES_DEFAULT_LIMIT);
    let result = VariableRepository::new(state.pool())
        .list(&query.filter(), page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Variable>> {
    let variable = VariableRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(variable, "Variable")?))
}

#[instrument(skip(state, update), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut update): Json<VariableUpdate>,
) -> Result<Json<Variable>> {
    if let Some(name) = update.variable_name.as_deref() {
        required(name, "variable_name")?;
    }
    update.variable_types = update.variable_types.map(normalize_types);

    let variable = VariableRepository::new(state.pool())
        .update(&record(&id), update)
        .await?;
    Ok(Json(variable))
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    VariableRepository::new(state.pool())
        .delete(&record(&id))
        .await?;
    Ok(Json(Message::new("Variable deleted")))
}

//! Display component handlers (sliders, banners, logos, popups).

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{ComponentKind, SortOrder};

use crate::db::{ComponentRepository, RecordSort};
use crate::error::Result;
use crate::middleware::RequireStaffWriter;
use crate::models::{Component, ComponentOption, ComponentUpdate, NewComponent};
use crate::services::uploads::UploadForm;
use crate::state::AppState;

use super::{Message, Paged, SearchQuery, UPLOAD_BODY_LIMIT, found, record, upload};

/// Build the components router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/components", get(list).post(create))
        .route("/components/dropdown", get(dropdown))
        .route("/components/{id}", get(show).put(update).delete(destroy))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

#[derive(Debug, Deserialize)]
struct ComponentQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: RecordSort,
    #[serde(default)]
    order: SortOrder,
    #[serde(rename = "type")]
    kind: Option<ComponentKind>,
    is_active: Option<bool>,
}

#[instrument(skip(state, multipart), fields(staff = %staff.code))]
async fn create(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Component>)> {
    let mut form = UploadForm::read(multipart).await?;
    let name = form.required_text("name")?.to_owned();
    let kind: ComponentKind = form.required("type")?;
    let is_active = form.parse("is_active")?.unwrap_or(true);
    let file = form.require_file("image")?;

    let image = upload(&state, file).await?;
    let input = NewComponent {
        name,
        kind,
        image,
        is_active,
    };

    match ComponentRepository::new(state.pool()).create(&input).await {
        Ok(component) => {
            tracing::info!(component = %component.code, "Component created");
            Ok((StatusCode::CREATED, Json(component)))
        }
        Err(e) => {
            state.cloudinary().destroy_quietly(std::slice::from_ref(&input.image)).await;
            Err(e.into())
        }
    }
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ComponentQuery>,
) -> Result<Json<Paged<Component>>> {
    let page = bazaar_core::PageRequest::new(
        query.page,
        query.limit,
        bazaar_core::pagination::DEFAULT_LIMIT,
    );
    let result = ComponentRepository::new(state.pool())
        .list(query.kind, query.is_active, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn dropdown(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ComponentOption>>> {
    let options = ComponentRepository::new(state.pool())
        .dropdown(&query.q)
        .await?;
    Ok(Json(options))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Component>> {
    let component = ComponentRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(component, "Component")?))
}

#[instrument(skip(state, multipart), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Component>> {
    let repo = ComponentRepository::new(state.pool());
    let existing = found(repo.get(&record(&id)).await?, "Component")?;

    let mut form = UploadForm::read(multipart).await?;
    let mut update = ComponentUpdate {
        name: form.text("name").map(str::to_owned),
        kind: form.parse("type")?,
        image: None,
        is_active: form.parse("is_active")?,
    };
    if let Some(file) = form.take_file("image") {
        update.image = Some(upload(&state, file).await?);
    }

    match repo.update(existing.id, &update).await {
        Ok(component) => {
            if update.image.is_some() {
                state.cloudinary().destroy_quietly(std::slice::from_ref(&existing.image)).await;
            }
            Ok(Json(component))
        }
        Err(e) => {
            state.cloudinary().destroy_quietly(update.image.as_slice()).await;
            Err(e.into())
        }
    }
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let repo = ComponentRepository::new(state.pool());
    let component = found(repo.get(&record(&id)).await?, "Component")?;

    repo.delete(component.id).await?;
    state.cloudinary().destroy_quietly(std::slice::from_ref(&component.image)).await;
    Ok(Json(Message::new("Component deleted")))
}

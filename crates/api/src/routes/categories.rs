//! Category tree handlers.
//!
//! Create and update take `multipart/form-data` so the category image can
//! travel with the fields. Nested subcategories arrive as a JSON string in
//! the `subcategories` field.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tracing::instrument;

use crate::db::CategoryRepository;
use crate::error::Result;
use crate::middleware::RequireStaffWriter;
use crate::models::{Category, CategoryUpdate, NewCategory};
use crate::services::uploads::UploadForm;
use crate::state::AppState;

use super::{ListQuery, Message, Paged, UPLOAD_BODY_LIMIT, found, record, upload};

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/{id}", get(show).put(update).delete(destroy))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

#[instrument(skip(state, multipart), fields(staff = %staff.code))]
async fn create(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Category>)> {
    let mut form = UploadForm::read(multipart).await?;
    let input = NewCategory {
        main_category: form.required_text("main_category")?.to_owned(),
        is_active: form.parse("is_active")?.unwrap_or(true),
        subcategories: form.json("subcategories")?.unwrap_or_default(),
    };
    let file = form.require_file("category_image")?;

    let image = upload(&state, file).await?;
    let created = CategoryRepository::new(state.pool())
        .create(&input, &image)
        .await;

    match created {
        Ok(category) => {
            tracing::info!(category = %category.code, "Category created");
            Ok((StatusCode::CREATED, Json(category)))
        }
        Err(e) => {
            state.cloudinary().destroy_quietly(std::slice::from_ref(&image)).await;
            Err(e.into())
        }
    }
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paged<Category>>> {
    let page = query.page();
    let (categories, total) = CategoryRepository::new(state.pool())
        .list(&query.filter(), page, query.sort_by, query.order)
        .await?;
    let categories = categories
        .into_iter()
        .map(Category::without_inactive_children)
        .collect();
    Ok(Json(Paged::new((categories, total), page)))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Category>> {
    let category = CategoryRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(category, "Category")?))
}

#[instrument(skip(state, multipart), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Category>> {
    let repo = CategoryRepository::new(state.pool());
    let existing = found(repo.get(&record(&id)).await?, "Category")?;

    let mut form = UploadForm::read(multipart).await?;
    let mut update = CategoryUpdate {
        main_category: form.text("main_category").map(str::to_owned),
        is_active: form.parse("is_active")?,
        image: None,
        subcategories: form.json("subcategories")?.unwrap_or_default(),
    };

    if let Some(file) = form.take_file("category_image") {
        update.image = Some(upload(&state, file).await?);
    }

    match repo.update(existing.id, &update).await {
        Ok(category) => {
            if update.image.is_some() {
                state.cloudinary().destroy_quietly(std::slice::from_ref(&existing.image)).await;
            }
            Ok(Json(category))
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
    let repo = CategoryRepository::new(state.pool());
    let category = found(repo.get(&record(&id)).await?, "Category")?;

    repo.delete(category.id).await?;
    state.cloudinary().destroy_quietly(std::slice::from_ref(&category.image)).await;

    tracing::info!(category = %category.code, "Category deleted");
    Ok(Json(Message::new("Category deleted")))
}

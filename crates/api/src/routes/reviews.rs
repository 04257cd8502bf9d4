//! Product review handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{PageRequest, SortOrder, pagination::DEFAULT_LIMIT};

use crate::db::{ProductRepository, RecordSort, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalCustomer, OptionalStaff, RequireCustomer};
use crate::models::review::is_valid_rating;
use crate::models::{CurrentCustomer, CurrentStaff, NewReview, Review, ReviewFilter, ReviewUpdate};
use crate::state::AppState;

use super::{Message, Paged, found, record, required};

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(list).post(create))
        .route("/reviews/{id}", get(show).put(update).delete(destroy))
}

fn check_rating(rating: i16) -> Result<()> {
    if is_valid_rating(rating) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ))
    }
}

/// Who is changing a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Editor {
    Staff,
    Owner,
}

/// Staff with write access may change any review; customers only their own.
fn editor(
    staff: Option<&CurrentStaff>,
    customer: Option<&CurrentCustomer>,
    review: &Review,
) -> Result<Editor> {
    if let Some(staff) = staff
        && staff.role.can_write()
    {
        return Ok(Editor::Staff);
    }
    match customer {
        Some(customer) if customer.id == review.customer_id => Ok(Editor::Owner),
        Some(_) => Err(AppError::Forbidden(
            "You can only change your own reviews".to_string(),
        )),
        None if staff.is_some() => Err(AppError::Forbidden("Read-only account".to_string())),
        None => Err(AppError::Unauthorized("Please log in".to_string())),
    }
}

#[instrument(skip(state, input), fields(customer = %customer.code))]
async fn create(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Json(input): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>)> {
    check_rating(input.rating)?;
    required(&input.title, "title")?;

    let product = found(
        ProductRepository::new(state.pool())
            .get(&record(&input.product))
            .await?,
        "Product",
    )?;

    let review = ReviewRepository::new(state.pool())
        .create(
            product.id,
            customer.id,
            input.rating,
            input.title.trim(),
            input.content.trim(),
        )
        .await?;
    tracing::info!(review = %review.code, product = %product.code, "Review added");
    Ok((StatusCode::CREATED, Json(review)))
}

#[derive(Debug, Default, Deserialize)]
struct ReviewQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: RecordSort,
    #[serde(default)]
    order: SortOrder,
    /// Product id or code.
    product: Option<String>,
    is_active: Option<bool>,
}

async fn list(
    OptionalStaff(staff): OptionalStaff,
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Paged<Review>>> {
    let mut filter = ReviewFilter {
        // Hidden reviews are only listed for staff.
        is_active: if staff.is_some() {
            query.is_active
        } else {
            Some(true)
        },
        ..ReviewFilter::default()
    };
    if let Some(raw) = query.product.as_deref() {
        let product = ProductRepository::new(state.pool())
            .get(&record(raw))
            .await?;
        filter.product_id = Some(found(product, "Product")?.id);
    }

    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);
    let result = ReviewRepository::new(state.pool())
        .list(&filter, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Review>> {
    let review = ReviewRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(review, "Review")?))
}

#[instrument(skip(state, staff, customer, update))]
async fn update(
    OptionalStaff(staff): OptionalStaff,
    OptionalCustomer(customer): OptionalCustomer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut update): Json<ReviewUpdate>,
) -> Result<Json<Review>> {
    if let Some(rating) = update.rating {
        check_rating(rating)?;
    }
    if let Some(title) = update.title.as_deref() {
        required(title, "title")?;
    }

    let repo = ReviewRepository::new(state.pool());
    let review = found(repo.get(&record(&id)).await?, "Review")?;
    if editor(staff.as_ref(), customer.as_ref(), &review)? == Editor::Owner {
        // Visibility is a moderation decision.
        update.is_active = None;
    }

    Ok(Json(repo.update(review.id, &update).await?))
}

#[instrument(skip(state, staff, customer))]
async fn destroy(
    OptionalStaff(staff): OptionalStaff,
    OptionalCustomer(customer): OptionalCustomer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let repo = ReviewRepository::new(state.pool());
    let review = found(repo.get(&record(&id)).await?, "Review")?;
    editor(staff.as_ref(), customer.as_ref(), &review)?;

    repo.delete(review.id).await?;
    tracing::info!(review = %review.code, "Review deleted");
    Ok(Json(Message::new("Review deleted")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{CustomerId, Email, ProductId, ReviewId, StaffRole, StaffUserId};
    use chrono::Utc;

    use super::*;

    fn review(owner: i32) -> Review {
        Review {
            id: ReviewId::new(1),
            code: "REV000001".to_string(),
            product_id: ProductId::new(2),
            customer_id: CustomerId::new(owner),
            customer_name: "Meera".to_string(),
            rating: 4,
            title: "Soft fabric".to_string(),
            content: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn customer(id: i32) -> CurrentCustomer {
        CurrentCustomer {
            id: CustomerId::new(id),
            code: format!("CUS{id:06}"),
            email: Email::parse("meera@example.com").unwrap(),
        }
    }

    fn staff(role: StaffRole) -> CurrentStaff {
        CurrentStaff {
            id: StaffUserId::new(1),
            code: "USR000001".to_string(),
            name: "Asha".to_string(),
            role,
        }
    }

    #[test]
    fn test_owner_and_staff_may_edit() {
        let review = review(7);
        assert_eq!(
            editor(None, Some(&customer(7)), &review).unwrap(),
            Editor::Owner
        );
        assert_eq!(
            editor(Some(&staff(StaffRole::Admin)), None, &review).unwrap(),
            Editor::Staff
        );
    }

    #[test]
    fn test_others_are_rejected() {
        let review = review(7);
        assert!(matches!(
            editor(None, Some(&customer(8)), &review),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            editor(Some(&staff(StaffRole::Viewer)), None, &review),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            editor(None, None, &review),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_rating_bounds() {
        assert!(check_rating(1).is_ok());
        assert!(check_rating(5).is_ok());
        assert!(check_rating(0).is_err());
        assert!(check_rating(6).is_err());
    }
}

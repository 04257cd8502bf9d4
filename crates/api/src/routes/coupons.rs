//! Coupon handlers.
//!
//! Coupon management is staff-only. Customers can preview a coupon against
//! their cart with `POST /coupons/use/{name}`; redemption happens at
//! checkout.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{
    CouponDiscount, CustomerId, PageRequest, ProductId, SortOrder, pagination::DEFAULT_LIMIT,
};

use crate::db::{CouponRepository, CustomerRepository, DateRange, ProductRepository, RecordSort};
use crate::error::{AppError, Result};
use crate::middleware::{RequireCustomer, RequireStaff, RequireStaffWriter};
use crate::models::{Coupon, CouponFilter, CouponUpdate, NewCoupon};
use crate::services::checkout;
use crate::state::AppState;

use super::{Message, Paged, SearchQuery, found, record, required};

/// Build the coupons router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list).post(create))
        .route("/coupons/search", get(search))
        .route("/coupons/use/{name}", post(preview))
        .route("/coupons/{id}", get(show).put(update).delete(destroy))
}

#[instrument(skip(state, input), fields(staff = %staff.code))]
async fn create(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Json(input): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>)> {
    required(&input.coupon_name, "coupon_name")?;
    input.terms().validate()?;

    let coupon = CouponRepository::new(state.pool()).create(&input).await?;
    tracing::info!(coupon = %coupon.code, name = %coupon.coupon_name, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

#[derive(Debug, Default, Deserialize)]
struct CouponQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: RecordSort,
    #[serde(default)]
    order: SortOrder,
    is_active: Option<bool>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    /// Product id or code.
    product: Option<String>,
    /// Customer id or code.
    used_by: Option<String>,
}

async fn product_ref(state: &AppState, raw: &str) -> Result<ProductId> {
    let product = ProductRepository::new(state.pool())
        .get(&record(raw))
        .await?;
    Ok(found(product, "Product")?.id)
}

async fn customer_ref(state: &AppState, raw: &str) -> Result<CustomerId> {
    let customer = CustomerRepository::new(state.pool())
        .get(&record(raw))
        .await?;
    Ok(found(customer, "Customer")?.id)
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<CouponQuery>,
) -> Result<Json<Paged<Coupon>>> {
    let dates = DateRange::from_dates(query.start_date, query.end_date);
    let mut filter = CouponFilter {
        is_active: query.is_active,
        starts_from: dates.from,
        ends_until: dates.to,
        ..CouponFilter::default()
    };
    if let Some(raw) = query.product.as_deref() {
        filter.product_id = Some(product_ref(&state, raw).await?);
    }
    if let Some(raw) = query.used_by.as_deref() {
        filter.used_by = Some(customer_ref(&state, raw).await?);
    }

    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);
    let result = CouponRepository::new(state.pool())
        .list(&filter, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn search(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Paged<Coupon>>> {
    let filter = CouponFilter {
        search: Some(query.q.clone()),
        ..CouponFilter::default()
    };
    let page = query.page();
    let result = CouponRepository::new(state.pool())
        .list(&filter, page, RecordSort::CreatedAt, SortOrder::Desc)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Coupon>> {
    let coupon = CouponRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(coupon, "Coupon")?))
}

#[instrument(skip(state, update), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<CouponUpdate>,
) -> Result<Json<Coupon>> {
    if let Some(name) = update.coupon_name.as_deref() {
        required(name, "coupon_name")?;
    }

    let repo = CouponRepository::new(state.pool());
    let existing = found(repo.get(&record(&id)).await?, "Coupon")?;
    update.merged_terms(&existing).validate()?;

    Ok(Json(repo.update(existing.id, &update).await?))
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let repo = CouponRepository::new(state.pool());
    let coupon = found(repo.get(&record(&id)).await?, "Coupon")?;
    repo.delete(coupon.id).await?;

    tracing::info!(coupon = %coupon.code, "Coupon deleted");
    Ok(Json(Message::new("Coupon deleted")))
}

#[instrument(skip(state), fields(customer = %customer.code))]
async fn preview(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CouponDiscount>> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("coupon name is required".to_string()));
    }
    let discount =
        checkout::preview_coupon(state.pool(), customer.id, &name, Utc::now()).await?;
    Ok(Json(discount))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::RecordRef;

    use super::*;

    #[test]
    fn test_coupon_query_parses_refs_and_dates() {
        let query: CouponQuery = serde_json::from_value(serde_json::json!({
            "is_active": true,
            "start_date": "2026-01-01",
            "product": "PRD000007",
            "used_by": "12"
        }))
        .unwrap();
        assert_eq!(query.is_active, Some(true));
        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(
            record(query.product.as_deref().unwrap()),
            RecordRef::Code("PRD000007".into())
        );
        assert_eq!(record(query.used_by.as_deref().unwrap()), RecordRef::Id(12));
    }
}

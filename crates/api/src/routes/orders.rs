//! Order handlers.
//!
//! Checkout, status changes and deletion run through the checkout service so
//! stock, payments and coupon redemptions move together in one transaction.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{OrderStatus, PageRequest, SortOrder, pagination::DEFAULT_LIMIT};

use crate::db::{CustomerRepository, OrderRepository, RecordSort};
use crate::error::{AppError, Result};
use crate::middleware::{
    OptionalCustomer, OptionalStaff, RequireCustomer, RequireStaff, RequireStaffWriter,
};
use crate::models::{CheckoutRequest, Order, OrderFilter, OrderUpdate, PlacedOrder};
use crate::services::checkout;
use crate::state::AppState;

use super::{Message, Paged, SearchQuery, found, record};

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list).post(create))
        .route("/orders/search", get(search))
        .route("/orders/mine", get(mine))
        .route("/orders/{id}", get(show).put(update).delete(destroy))
}

#[instrument(skip(state, request), fields(customer = %customer.code))]
async fn create(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>)> {
    if !request.delivery_location.is_object() {
        return Err(AppError::BadRequest(
            "delivery_location must be an object".to_string(),
        ));
    }

    let placed =
        checkout::place_order(state.pool(), customer.id, &request, Utc::now()).await?;
    tracing::info!(
        order = %placed.order.code,
        total = %placed.order.total_amount,
        mode = %placed.payment.mode,
        "Order placed"
    );
    Ok((StatusCode::CREATED, Json(placed)))
}

#[derive(Debug, Default, Deserialize)]
struct OrderQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: RecordSort,
    #[serde(default)]
    order: SortOrder,
    status: Option<OrderStatus>,
    /// Customer id or code.
    customer: Option<String>,
}

impl OrderQuery {
    fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_LIMIT)
    }
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Paged<Order>>> {
    let mut filter = OrderFilter {
        status: query.status,
        ..OrderFilter::default()
    };
    if let Some(raw) = query.customer.as_deref() {
        let customer = CustomerRepository::new(state.pool())
            .get(&record(raw))
            .await?;
        filter.customer_id = Some(found(customer, "Customer")?.id);
    }

    let page = query.page();
    let result = OrderRepository::new(state.pool())
        .list(&filter, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn search(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Paged<Order>>> {
    let filter = OrderFilter {
        search: Some(query.q.clone()),
        ..OrderFilter::default()
    };
    let page = query.page();
    let result = OrderRepository::new(state.pool())
        .list(&filter, page, RecordSort::CreatedAt, SortOrder::Desc)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn mine(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Paged<Order>>> {
    let filter = OrderFilter {
        status: query.status,
        customer_id: Some(customer.id),
        search: None,
    };
    let page = query.page();
    let result = OrderRepository::new(state.pool())
        .list(&filter, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn show(
    OptionalStaff(staff): OptionalStaff,
    OptionalCustomer(customer): OptionalCustomer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    if staff.is_none() && customer.is_none() {
        return Err(AppError::Unauthorized("Please log in".to_string()));
    }

    let order = found(
        OrderRepository::new(state.pool()).get(&record(&id)).await?,
        "Order",
    )?;

    let is_owner = customer.is_some_and(|c| c.id == order.customer_id);
    if staff.is_none() && !is_owner {
        // Other customers' orders are reported as missing.
        return Err(AppError::NotFound("Order not found".to_string()));
    }
    Ok(Json(order))
}

#[instrument(skip(state, update), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<OrderUpdate>,
) -> Result<Json<Order>> {
    if update
        .delivery_location
        .as_ref()
        .is_some_and(|location| !location.is_object())
    {
        return Err(AppError::BadRequest(
            "delivery_location must be an object".to_string(),
        ));
    }

    let order = checkout::update_order(state.pool(), &record(&id), &update).await?;
    tracing::info!(order = %order.code, status = %order.status, "Order updated");
    Ok(Json(order))
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    checkout::delete_order(state.pool(), &record(&id)).await?;
    tracing::info!(order = %id, "Order deleted");
    Ok(Json(Message::new("Order deleted")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_query_status_filter() {
        let query: OrderQuery = serde_json::from_value(serde_json::json!({
            "status": "shipped",
            "customer": "CUS000003"
        }))
        .unwrap();
        assert_eq!(query.status, Some(OrderStatus::Shipped));
        assert_eq!(query.customer.as_deref(), Some("CUS000003"));
        assert_eq!(query.page().page(), 1);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let parsed = serde_json::from_value::<OrderQuery>(serde_json::json!({ "status": "lost" }));
        assert!(parsed.is_err());
    }
}

//! Payment handlers.
//!
//! Staff can list, view and delete payment records. Customers paying online
//! first ask for a gateway order, complete the checkout widget, then post the
//! signed result back to `/payments/razorpay/success`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bazaar_core::{
    CustomerId, OrderStatus, PageRequest, PaymentMode, PaymentStatus, SortOrder, pagination::DEFAULT_LIMIT,
    to_minor_units,
};

use crate::db::{OrderRepository, PaymentRepository, RecordSort};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireCustomer, RequireStaff, RequireStaffWriter};
use crate::models::{Order, Payment, PaymentConfirmation, PaymentFilter};
use crate::services::razorpay::{GatewayOrder, new_receipt};
use crate::state::AppState;

use super::{Message, Paged, found, record};

/// Build the payments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list))
        .route("/payments/razorpay/order", post(create_gateway_order))
        .route("/payments/razorpay/success", post(confirm))
        .route("/payments/{id}", get(show).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
struct PaymentQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: RecordSort,
    #[serde(default)]
    order: SortOrder,
    status: Option<PaymentStatus>,
    payment_mode: Option<PaymentMode>,
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<Paged<Payment>>> {
    let filter = PaymentFilter {
        status: query.status,
        mode: query.payment_mode,
    };
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);
    let result = PaymentRepository::new(state.pool())
        .list(&filter, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Payment>> {
    let payment = PaymentRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(payment, "Payment")?))
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let repo = PaymentRepository::new(state.pool());
    let payment = found(repo.get(&record(&id)).await?, "Payment")?;
    repo.delete(payment.id).await?;

    tracing::info!(payment = %payment.code, "Payment deleted");
    Ok(Json(Message::new("Payment deleted")))
}

// =============================================================================
// Gateway
// =============================================================================

/// Load an order owned by `customer` together with its payment.
async fn own_order_payment(
    state: &AppState,
    customer: CustomerId,
    order: &str,
) -> Result<(Order, Payment)> {
    let order = found(
        OrderRepository::new(state.pool()).get(&record(order)).await?,
        "Order",
    )?;
    if order.customer_id != customer {
        return Err(AppError::NotFound("Order not found".to_string()));
    }
    let payment = found(
        PaymentRepository::new(state.pool())
            .get_for_order(order.id)
            .await?,
        "Payment",
    )?;
    Ok((order, payment))
}

/// Only pending online payments can go through the gateway.
fn check_payable(payment: &Payment) -> Result<()> {
    if payment.mode != PaymentMode::Online {
        return Err(AppError::BadRequest(
            "order is not paid online".to_string(),
        ));
    }
    if payment.status != PaymentStatus::Pending {
        return Err(AppError::Conflict("payment already completed".to_string()));
    }
    Ok(())
}

/// A gateway order can only be opened for an order nobody has touched yet.
fn check_order_open(status: OrderStatus) -> Result<()> {
    check_order_not_withdrawn(status)?;
    if status != OrderStatus::Ordered {
        return Err(AppError::BadRequest(format!("order is already {status}")));
    }
    Ok(())
}

/// A confirmation may still land after shipping, but never on a withdrawn order.
fn check_order_not_withdrawn(status: OrderStatus) -> Result<()> {
    match status {
        OrderStatus::Canceled | OrderStatus::RefundGenerated | OrderStatus::Refunded => Err(
            AppError::Conflict(format!("order is {status} and cannot be paid")),
        ),
        _ => Ok(()),
    }
}

/// Check the confirmation belongs to the gateway order stored on the payment.
fn check_gateway_order(payment: &Payment, gateway_order_id: &str) -> Result<()> {
    match payment.gateway_order_id.as_deref() {
        Some(stored) if stored == gateway_order_id => Ok(()),
        Some(_) => Err(AppError::BadRequest(
            "gateway order does not match this payment".to_string(),
        )),
        None => Err(AppError::BadRequest(
            "no gateway order was created for this payment".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct GatewayOrderRequest {
    /// Our order id or code.
    order: String,
}

#[derive(Debug, Serialize)]
struct GatewayCheckout {
    /// Public key the checkout widget is opened with.
    key_id: String,
    gateway_order: GatewayOrder,
    payment: Payment,
}

#[instrument(skip(state), fields(customer = %customer.code))]
async fn create_gateway_order(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Json(input): Json<GatewayOrderRequest>,
) -> Result<Json<GatewayCheckout>> {
    let (order, payment) = own_order_payment(&state, customer.id, &input.order).await?;
    check_order_open(order.status)?;
    check_payable(&payment)?;

    let amount = to_minor_units(order.total_amount).ok_or_else(|| {
        AppError::Internal(format!("order {} has an invalid total", order.code))
    })?;
    let gateway_order = state
        .razorpay()
        .create_order(amount, &new_receipt())
        .await?;

    let payment = PaymentRepository::new(state.pool())
        .set_gateway_order(payment.id, &gateway_order.id)
        .await?;

    add_breadcrumb(
        "payment",
        "Gateway order created",
        Some(&[
            ("order", order.code.as_str()),
            ("gateway_order", gateway_order.id.as_str()),
        ]),
    );
    tracing::info!(
        order = %order.code,
        gateway_order = %gateway_order.id,
        amount,
        "Gateway order created"
    );

    Ok(Json(GatewayCheckout {
        key_id: state.razorpay().key_id().to_owned(),
        gateway_order,
        payment,
    }))
}

#[instrument(skip(state, confirmation), fields(customer = %customer.code))]
async fn confirm(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<Json<Payment>> {
    state.razorpay().verify_payment_signature(
        &confirmation.razorpay_order_id,
        &confirmation.razorpay_payment_id,
        &confirmation.razorpay_signature,
    )?;

    let (order, payment) = own_order_payment(&state, customer.id, &confirmation.order).await?;
    check_gateway_order(&payment, &confirmation.razorpay_order_id)?;

    if payment.status == PaymentStatus::Completed {
        return Ok(Json(payment));
    }
    check_order_not_withdrawn(order.status)?;

    let payment = PaymentRepository::new(state.pool())
        .complete(payment.id, &confirmation.razorpay_payment_id)
        .await?;
    tracing::info!(
        order = %order.code,
        payment = %payment.code,
        gateway_payment = %confirmation.razorpay_payment_id,
        "Payment completed"
    );
    Ok(Json(payment))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{OrderId, PaymentId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn payment(mode: PaymentMode, status: PaymentStatus, gateway: Option<&str>) -> Payment {
        Payment {
            id: PaymentId::new(1),
            code: "PAY000001".to_string(),
            customer_id: CustomerId::new(4),
            order_id: OrderId::new(9),
            amount: Decimal::new(49_900, 2),
            status,
            mode,
            is_refunded: false,
            gateway_order_id: gateway.map(str::to_owned),
            gateway_payment_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_pending_online_payments_are_payable() {
        let pending = payment(PaymentMode::Online, PaymentStatus::Pending, None);
        assert!(check_payable(&pending).is_ok());
        assert!(matches!(
            check_payable(&payment(PaymentMode::Cod, PaymentStatus::Pending, None)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            check_payable(&payment(PaymentMode::Online, PaymentStatus::Completed, None)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_only_open_orders_get_a_gateway_order() {
        assert!(check_order_open(OrderStatus::Ordered).is_ok());
        assert!(matches!(
            check_order_open(OrderStatus::Canceled),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            check_order_open(OrderStatus::Shipped),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_canceled_orders_cannot_be_confirmed() {
        assert!(check_order_not_withdrawn(OrderStatus::Ordered).is_ok());
        assert!(check_order_not_withdrawn(OrderStatus::Shipped).is_ok());
        assert!(check_order_not_withdrawn(OrderStatus::Canceled).is_err());
        assert!(check_order_not_withdrawn(OrderStatus::Refunded).is_err());
    }

    #[test]
    fn test_gateway_order_must_match() {
        let stored = payment(PaymentMode::Online, PaymentStatus::Pending, Some("order_A1"));
        assert!(check_gateway_order(&stored, "order_A1").is_ok());
        assert!(check_gateway_order(&stored, "order_B2").is_err());

        let missing = payment(PaymentMode::Online, PaymentStatus::Pending, None);
        assert!(check_gateway_order(&missing, "order_A1").is_err());
    }

    #[test]
    fn test_payment_query_modes() {
        let query: PaymentQuery = serde_json::from_value(serde_json::json!({
            "status": "completed",
            "payment_mode": "ONLINE"
        }))
        .unwrap();
        assert_eq!(query.status, Some(PaymentStatus::Completed));
        assert_eq!(query.payment_mode, Some(PaymentMode::Online));
    }
}

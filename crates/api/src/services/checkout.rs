//! Order workflow: placing, changing and deleting orders.
//!
//! Each operation runs in one transaction. Products are locked before stock
//! is read, so two checkouts for the last unit cannot both succeed, and a
//! failure at any step leaves orders, payments, stock, carts and coupon
//! redemptions untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use bazaar_core::{
    CouponDiscount, CouponRejection, CustomerId, OrderLine, OrderStatus, PaymentMode, ProductId,
    RecordRef, StatusTransitionError, coupon::subtotal, round_money,
};

use crate::db::orders::{self, OrderInsert, StockRow};
use crate::db::{CustomerRepository, RepositoryError, coupons, payments};
use crate::models::{CheckoutItem, CheckoutRequest, Order, OrderUpdate, PlacedOrder};

/// Errors from the order workflow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("order has no items")]
    EmptyOrder,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("product {0} does not exist")]
    ProductNotFound(ProductId),

    #[error("product {0} is not available")]
    ProductUnavailable(String),

    #[error("only {available} of {product} left, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },

    #[error("coupon not found")]
    CouponNotFound,

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    #[error("order not found")]
    OrderNotFound,

    #[error("delivery location can only change before shipping")]
    DeliveryLocked,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Combine repeated products and reject empty or non-positive lines.
///
/// The result is ordered by product id.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyOrder` or `CheckoutError::InvalidQuantity`.
pub fn merge_items(items: &[CheckoutItem]) -> Result<Vec<(ProductId, i32)>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let mut merged: BTreeMap<i32, i32> = BTreeMap::new();
    for item in items {
        if item.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity);
        }
        let entry = merged.entry(item.product_id.as_i32()).or_insert(0);
        *entry = entry
            .checked_add(item.quantity)
            .ok_or(CheckoutError::InvalidQuantity)?;
    }

    Ok(merged
        .into_iter()
        .map(|(id, quantity)| (ProductId::new(id), quantity))
        .collect())
}

/// Price requested lines against locked stock rows.
///
/// # Errors
///
/// Returns the first missing, inactive or understocked product.
pub fn price_lines(
    requested: &[(ProductId, i32)],
    stock: &[StockRow],
) -> Result<Vec<OrderLine>, CheckoutError> {
    requested
        .iter()
        .map(|&(product_id, quantity)| {
            let row = stock
                .iter()
                .find(|row| row.id == product_id)
                .ok_or(CheckoutError::ProductNotFound(product_id))?;

            if !row.is_active {
                return Err(CheckoutError::ProductUnavailable(row.code.clone()));
            }
            if row.in_stock < quantity {
                return Err(CheckoutError::InsufficientStock {
                    product: row.code.clone(),
                    available: row.in_stock,
                    requested: quantity,
                });
            }

            Ok(OrderLine {
                product_id,
                quantity,
                unit_price: row.price,
            })
        })
        .collect()
}

/// Subtotal, discount and payable total for priced lines.
#[must_use]
pub fn order_totals(lines: &[OrderLine], discount: Option<CouponDiscount>) -> (Decimal, Decimal, Decimal) {
    let subtotal = round_money(subtotal(lines));
    let discount = discount.map_or(Decimal::ZERO, |d| d.discount.min(subtotal));
    (subtotal, discount, subtotal - discount)
}

/// Place an order for `customer_id`.
///
/// # Errors
///
/// Returns a `CheckoutError` describing the first failed check; nothing is
/// written in that case.
#[instrument(skip(pool, request), fields(customer_id = %customer_id))]
pub async fn place_order(
    pool: &PgPool,
    customer_id: CustomerId,
    request: &CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<PlacedOrder, CheckoutError> {
    let requested = merge_items(&request.items)?;
    let product_ids: Vec<ProductId> = requested.iter().map(|(id, _)| *id).collect();

    let mut tx = pool.begin().await?;

    let stock = orders::lock_products(&mut tx, &product_ids).await?;
    let lines = price_lines(&requested, &stock)?;

    let coupon = match request.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(name) => Some(
            coupons::find_by_name(&mut tx, name)
                .await?
                .ok_or(CheckoutError::CouponNotFound)?,
        ),
        None => None,
    };

    let discount = match &coupon {
        Some(coupon) => {
            let used = orders::coupon_redeemed(&mut tx, coupon.id, customer_id).await?;
            Some(coupon.terms().evaluate(&lines, used, now)?)
        }
        None => None,
    };

    let (subtotal, discount_amount, total_amount) = order_totals(&lines, discount);

    let items: Vec<(ProductId, i32, Decimal)> = lines
        .iter()
        .map(|line| (line.product_id, line.quantity, line.unit_price))
        .collect();

    let order_id = orders::insert_order(
        &mut tx,
        &OrderInsert {
            customer_id,
            coupon_id: coupon.as_ref().map(|c| c.id),
            subtotal,
            discount_amount,
            total_amount,
            delivery_location: &request.delivery_location,
        },
        &items,
    )
    .await?;

    let payment = payments::insert_payment(
        &mut tx,
        customer_id,
        order_id,
        total_amount,
        request.payment_mode,
    )
    .await?;
    orders::link_payment(&mut tx, order_id, payment.id).await?;

    for line in &lines {
        orders::decrement_stock(&mut tx, line.product_id, line.quantity).await?;
    }

    if let Some(coupon) = &coupon {
        orders::record_redemption(&mut tx, coupon.id, customer_id, order_id)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CheckoutError::Coupon(CouponRejection::AlreadyUsed),
                other => CheckoutError::Repository(other),
            })?;
    }

    orders::remove_from_cart(&mut tx, customer_id, &product_ids).await?;

    let order = orders::load_order(&mut tx, order_id).await?;
    tx.commit().await?;

    info!(order = %order.code, total = %order.total_amount, "Order placed");
    Ok(PlacedOrder { order, payment })
}

/// Apply a staff change to an order.
///
/// Cancelling puts stock back and frees the coupon; refunding flags the
/// payment; delivering a cash-on-delivery order settles its payment.
///
/// # Errors
///
/// Returns `CheckoutError::Transition` for a disallowed status change.
#[instrument(skip(pool, update), fields(order = %record))]
pub async fn update_order(
    pool: &PgPool,
    record: &RecordRef,
    update: &OrderUpdate,
) -> Result<Order, CheckoutError> {
    let mut tx = pool.begin().await?;

    let current = orders::lock_order(&mut tx, record)
        .await?
        .ok_or(CheckoutError::OrderNotFound)?;

    let next = match update.status {
        Some(next) if next != current.status => current.status.transition_to(next)?,
        _ => current.status,
    };

    if update.delivery_location.is_some() && current.status != OrderStatus::Ordered {
        return Err(CheckoutError::DeliveryLocked);
    }

    if next != current.status {
        match next {
            OrderStatus::Canceled => {
                if current.status.holds_stock() {
                    orders::restock(&mut tx, current.id).await?;
                }
                orders::release_redemption(&mut tx, current.id).await?;
            }
            OrderStatus::Refunded => {
                if let Some(payment_id) = current.payment_id {
                    payments::mark_refunded(&mut tx, payment_id).await?;
                }
            }
            OrderStatus::Delivered => {
                if let Some(payment_id) = current.payment_id {
                    let payment = payments::load_payment(&mut tx, payment_id).await?;
                    if payment.mode == PaymentMode::Cod {
                        payments::complete_cod(&mut tx, payment_id).await?;
                    }
                }
            }
            _ => {}
        }
    }

    orders::write_order(&mut tx, current.id, next, update.delivery_location.as_ref()).await?;
    let order = orders::load_order(&mut tx, current.id).await?;
    tx.commit().await?;

    info!(order = %order.code, status = %order.status, "Order updated");
    Ok(order)
}

/// Delete an order and its payment.
///
/// An order still holding stock returns it; any coupon redemption is freed.
///
/// # Errors
///
/// Returns `CheckoutError::OrderNotFound` if no order matches.
#[instrument(skip(pool), fields(order = %record))]
pub async fn delete_order(pool: &PgPool, record: &RecordRef) -> Result<(), CheckoutError> {
    let mut tx = pool.begin().await?;

    let current = orders::lock_order(&mut tx, record)
        .await?
        .ok_or(CheckoutError::OrderNotFound)?;

    if current.status.holds_stock() {
        orders::restock(&mut tx, current.id).await?;
    }
    orders::release_redemption(&mut tx, current.id).await?;
    orders::delete_order(&mut tx, current.id).await?;

    tx.commit().await?;
    info!(order_id = %current.id, "Order deleted");
    Ok(())
}

/// Evaluate a coupon against the customer's current cart without redeeming it.
///
/// # Errors
///
/// Returns `CheckoutError::CouponNotFound`, `CheckoutError::EmptyOrder` for an
/// empty cart, or the coupon's rejection.
pub async fn preview_coupon(
    pool: &PgPool,
    customer_id: CustomerId,
    coupon_name: &str,
    now: DateTime<Utc>,
) -> Result<CouponDiscount, CheckoutError> {
    let mut conn = pool.acquire().await?;
    let coupon = coupons::find_by_name(&mut conn, coupon_name)
        .await?
        .ok_or(CheckoutError::CouponNotFound)?;
    let used = orders::coupon_redeemed(&mut conn, coupon.id, customer_id).await?;
    drop(conn);

    let cart = CustomerRepository::new(pool).cart(customer_id).await?;
    if cart.lines.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let lines: Vec<OrderLine> = cart
        .lines
        .iter()
        .map(|line| OrderLine {
            product_id: line.product.id,
            quantity: line.quantity,
            unit_price: line.product.price,
        })
        .collect();

    Ok(coupon.terms().evaluate(&lines, used, now)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(product: i32, quantity: i32) -> CheckoutItem {
        CheckoutItem {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    fn stock(id: i32, price: &str, in_stock: i32, is_active: bool) -> StockRow {
        StockRow {
            id: ProductId::new(id),
            code: format!("PRD{id:06}"),
            title: format!("Product {id}"),
            price: dec(price),
            in_stock,
            is_active,
        }
    }

    #[test]
    fn test_merge_items_sums_duplicates() {
        let merged = merge_items(&[item(7, 1), item(3, 2), item(7, 4)]).unwrap();
        assert_eq!(
            merged,
            vec![(ProductId::new(3), 2), (ProductId::new(7), 5)]
        );
    }

    #[test]
    fn test_merge_items_rejects_bad_input() {
        assert!(matches!(merge_items(&[]), Err(CheckoutError::EmptyOrder)));
        assert!(matches!(
            merge_items(&[item(1, 0)]),
            Err(CheckoutError::InvalidQuantity)
        ));
        assert!(matches!(
            merge_items(&[item(1, i32::MAX), item(1, 1)]),
            Err(CheckoutError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_price_lines_uses_stored_prices() {
        let rows = [stock(1, "250.00", 5, true), stock(2, "99.99", 1, true)];
        let lines = price_lines(&[(ProductId::new(1), 2), (ProductId::new(2), 1)], &rows).unwrap();
        assert_eq!(lines[0].unit_price, dec("250.00"));
        assert_eq!(subtotal(&lines), dec("599.99"));
    }

    #[test]
    fn test_price_lines_checks_stock_and_status() {
        let rows = [stock(1, "10", 2, true), stock(2, "10", 9, false)];

        match price_lines(&[(ProductId::new(1), 3)], &rows) {
            Err(CheckoutError::InsufficientStock {
                available,
                requested,
                ..
            }) => assert_eq!((available, requested), (2, 3)),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert!(matches!(
            price_lines(&[(ProductId::new(2), 1)], &rows),
            Err(CheckoutError::ProductUnavailable(_))
        ));
        assert!(matches!(
            price_lines(&[(ProductId::new(3), 1)], &rows),
            Err(CheckoutError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_order_totals() {
        let lines = [OrderLine {
            product_id: ProductId::new(1),
            quantity: 3,
            unit_price: dec("33.33"),
        }];
        assert_eq!(
            order_totals(&lines, None),
            (dec("99.99"), Decimal::ZERO, dec("99.99"))
        );

        let discount = CouponDiscount {
            eligible_subtotal: dec("99.99"),
            discount: dec("10.00"),
        };
        assert_eq!(
            order_totals(&lines, Some(discount)),
            (dec("99.99"), dec("10.00"), dec("89.99"))
        );
    }
}

//! Order repository.
//!
//! Reads go through [`OrderRepository`]. The write steps of the order
//! workflow are free functions over a `PgConnection` so the checkout service
//! can run them inside a single transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{
    CouponId, CustomerId, OrderId, OrderStatus, PageRequest, PaymentId, ProductId, PublicIdKind,
    RecordRef, SortOrder,
};

use super::{RecordSort, RepositoryError, contains_pattern, next_public_code};
use crate::models::{Order, OrderFilter, OrderItem};

const ORDER_COLUMNS: &str = r"
    o.id, o.code, o.customer_id, o.coupon_id, o.payment_id, o.status, o.subtotal,
    o.discount_amount, o.total_amount, o.delivery_location, o.created_at, o.updated_at
";

const ORDER_FILTER: &str = r"
    ($1::shop.order_status IS NULL OR o.status = $1)
    AND ($2::integer IS NULL OR o.customer_id = $2)
    AND ($3::text IS NULL OR o.code ILIKE $3)
";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    code: String,
    customer_id: CustomerId,
    coupon_id: Option<CouponId>,
    payment_id: Option<PaymentId>,
    status: OrderStatus,
    subtotal: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    delivery_location: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            code: self.code,
            customer_id: self.customer_id,
            coupon_id: self.coupon_id,
            payment_id: self.payment_id,
            status: self.status,
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
            delivery_location: self.delivery_location.0,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: OrderId,
    product_id: ProductId,
    product_code: String,
    title: String,
    quantity: i32,
    unit_price: Decimal,
}

/// Current stock and price of a product, read under a row lock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRow {
    pub id: ProductId,
    pub code: String,
    pub title: String,
    pub price: Decimal,
    pub in_stock: i32,
    pub is_active: bool,
}

/// The locked parts of an order that its status changes depend on.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct OrderLock {
    pub id: OrderId,
    pub status: OrderStatus,
    pub payment_id: Option<PaymentId>,
}

/// Totals and references for a new order row.
#[derive(Debug, Clone)]
pub struct OrderInsert<'a> {
    pub customer_id: CustomerId,
    pub coupon_id: Option<CouponId>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub delivery_location: &'a serde_json::Value,
}

async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[i32],
) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
    let rows = sqlx::query_as::<_, ItemRow>(
        r"
        SELECT oi.order_id, oi.product_id, p.code AS product_code, p.title,
               oi.quantity, oi.unit_price
        FROM shop.order_item oi
        JOIN shop.product p ON p.id = oi.product_id
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.order_id, oi.product_id
        ",
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        by_order.entry(row.order_id).or_default().push(OrderItem {
            product_id: row.product_id,
            product_code: row.product_code,
            title: row.title,
            quantity: row.quantity,
            line_total: row.unit_price * Decimal::from(row.quantity),
            unit_price: row.unit_price,
        });
    }
    Ok(by_order)
}

async fn assemble(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
    let mut items = load_items(conn, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        })
        .collect())
}

// =============================================================================
// Transaction steps
// =============================================================================

/// Lock the given products in id order and return their stock rows.
///
/// Locking in a fixed order keeps concurrent checkouts from deadlocking.
pub(crate) async fn lock_products(
    conn: &mut PgConnection,
    product_ids: &[ProductId],
) -> Result<Vec<StockRow>, RepositoryError> {
    let raw: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();
    let rows = sqlx::query_as::<_, StockRow>(
        r"
        SELECT id, code, title, price, in_stock, is_active
        FROM shop.product
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(&raw)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Whether `customer_id` has already redeemed `coupon_id`.
pub(crate) async fn coupon_redeemed(
    conn: &mut PgConnection,
    coupon_id: CouponId,
    customer_id: CustomerId,
) -> Result<bool, RepositoryError> {
    let used: bool = sqlx::query_scalar(
        r"
        SELECT EXISTS (
            SELECT 1 FROM shop.coupon_redemption WHERE coupon_id = $1 AND customer_id = $2
        )
        ",
    )
    .bind(coupon_id)
    .bind(customer_id)
    .fetch_one(conn)
    .await?;
    Ok(used)
}

/// Insert the order row and its items.
pub(crate) async fn insert_order(
    conn: &mut PgConnection,
    order: &OrderInsert<'_>,
    items: &[(ProductId, i32, Decimal)],
) -> Result<OrderId, RepositoryError> {
    let code = next_public_code(&mut *conn, PublicIdKind::Order).await?;

    let id: OrderId = sqlx::query_scalar(
        r"
        INSERT INTO shop.customer_order (
            code, customer_id, coupon_id, subtotal, discount_amount, total_amount,
            delivery_location
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        ",
    )
    .bind(&code)
    .bind(order.customer_id)
    .bind(order.coupon_id)
    .bind(order.subtotal)
    .bind(order.discount_amount)
    .bind(order.total_amount)
    .bind(Json(order.delivery_location))
    .fetch_one(&mut *conn)
    .await?;

    let product_ids: Vec<i32> = items.iter().map(|(p, _, _)| p.as_i32()).collect();
    let quantities: Vec<i32> = items.iter().map(|(_, q, _)| *q).collect();
    let prices: Vec<Decimal> = items.iter().map(|(_, _, price)| *price).collect();

    sqlx::query(
        r"
        INSERT INTO shop.order_item (order_id, product_id, quantity, unit_price)
        SELECT $1, item.product_id, item.quantity, item.unit_price
        FROM UNNEST($2::integer[], $3::integer[], $4::numeric[])
            AS item (product_id, quantity, unit_price)
        ",
    )
    .bind(id)
    .bind(&product_ids)
    .bind(&quantities)
    .bind(&prices)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Point the order at its payment record.
pub(crate) async fn link_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
    payment_id: PaymentId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.customer_order SET payment_id = $2 WHERE id = $1")
        .bind(order_id)
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Take `quantity` units out of stock. Caller must hold the row lock.
pub(crate) async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.product SET in_stock = in_stock - $2 WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(())
}

/// Put an order's items back into stock.
pub(crate) async fn restock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.product p
        SET in_stock = p.in_stock + oi.quantity
        FROM shop.order_item oi
        WHERE oi.order_id = $1 AND oi.product_id = p.id
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record that the customer used the coupon on this order.
///
/// A concurrent checkout with the same coupon hits the primary key and
/// surfaces as `Conflict`.
pub(crate) async fn record_redemption(
    conn: &mut PgConnection,
    coupon_id: CouponId,
    customer_id: CustomerId,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shop.coupon_redemption (coupon_id, customer_id, order_id)
        VALUES ($1, $2, $3)
        ",
    )
    .bind(coupon_id)
    .bind(customer_id)
    .bind(order_id)
    .execute(conn)
    .await
    .map_err(|e| RepositoryError::on_write(e, "coupon has already been used"))?;
    Ok(())
}

/// Free the coupon redemption made by an order, if any.
pub(crate) async fn release_redemption(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.coupon_redemption WHERE order_id = $1")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Drop ordered products from the customer's cart.
pub(crate) async fn remove_from_cart(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    let raw: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();
    sqlx::query("DELETE FROM shop.cart_item WHERE customer_id = $1 AND product_id = ANY($2)")
        .bind(customer_id)
        .bind(&raw)
        .execute(conn)
        .await?;
    Ok(())
}

/// Lock an order row for a status change.
pub(crate) async fn lock_order(
    conn: &mut PgConnection,
    record: &RecordRef,
) -> Result<Option<OrderLock>, RepositoryError> {
    let (id, code) = record.as_bind();
    let lock = sqlx::query_as::<_, OrderLock>(
        r"
        SELECT id, status, payment_id
        FROM shop.customer_order
        WHERE id = $1 OR code = $2
        FOR UPDATE
        ",
    )
    .bind(id)
    .bind(code)
    .fetch_optional(conn)
    .await?;
    Ok(lock)
}

/// Write a new status and optionally a new delivery location.
pub(crate) async fn write_order(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
    delivery_location: Option<&serde_json::Value>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.customer_order SET
            status = $2,
            delivery_location = COALESCE($3, delivery_location)
        WHERE id = $1
        ",
    )
    .bind(order_id)
    .bind(status)
    .bind(delivery_location.map(Json))
    .execute(conn)
    .await?;
    Ok(())
}

/// Delete an order; its items and payment go with it.
pub(crate) async fn delete_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.customer_order WHERE id = $1")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Load a full order on any connection.
pub(crate) async fn load_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM shop.customer_order o WHERE o.id = $1"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    assemble(conn, vec![row])
        .await?
        .pop()
        .ok_or(RepositoryError::NotFound)
}

// =============================================================================
// Reads
// =============================================================================

/// Repository for reading orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders; `filter.search` matches the order code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let pattern = filter
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(contains_pattern);
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.customer_order o WHERE {ORDER_FILTER}"
        ))
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(pattern.as_deref())
        .fetch_one(&mut *conn)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop.customer_order o
            WHERE {ORDER_FILTER}
            ORDER BY o.{} {}, o.id
            LIMIT $4 OFFSET $5
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(pattern.as_deref())
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        Ok((assemble(&mut conn, rows).await?, total))
    }

    /// Get an order by id or code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Order>, RepositoryError> {
        let (id, code) = record.as_bind();
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order o WHERE o.id = $1 OR o.code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(assemble(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

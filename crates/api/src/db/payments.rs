//! Payment repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{
    CustomerId, OrderId, PageRequest, PaymentId, PaymentMode, PaymentStatus, PublicIdKind,
    RecordRef, SortOrder,
};

use super::{RecordSort, RepositoryError, next_public_code};
use crate::models::{Payment, PaymentFilter};

const PAYMENT_COLUMNS: &str = r"
    id, code, customer_id, order_id, amount, status, mode, is_refunded,
    gateway_order_id, gateway_payment_id, created_at, updated_at
";

const PAYMENT_FILTER: &str = r"
    ($1::shop.payment_status IS NULL OR status = $1)
    AND ($2::shop.payment_mode IS NULL OR mode = $2)
";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: PaymentId,
    code: String,
    customer_id: CustomerId,
    order_id: OrderId,
    amount: Decimal,
    status: PaymentStatus,
    mode: PaymentMode,
    is_refunded: bool,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            customer_id: row.customer_id,
            order_id: row.order_id,
            amount: row.amount,
            status: row.status,
            mode: row.mode,
            is_refunded: row.is_refunded,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert a pending payment for an order.
pub(crate) async fn insert_payment(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    order_id: OrderId,
    amount: Decimal,
    mode: PaymentMode,
) -> Result<Payment, RepositoryError> {
    let code = next_public_code(&mut *conn, PublicIdKind::Payment).await?;
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        r"
        INSERT INTO shop.payment (code, customer_id, order_id, amount, mode)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(&code)
    .bind(customer_id)
    .bind(order_id)
    .bind(amount)
    .bind(mode)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

/// Mark a payment refunded.
pub(crate) async fn mark_refunded(
    conn: &mut PgConnection,
    payment_id: PaymentId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.payment SET is_refunded = TRUE WHERE id = $1")
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Settle a cash-on-delivery payment once the order is delivered.
pub(crate) async fn complete_cod(
    conn: &mut PgConnection,
    payment_id: PaymentId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.payment SET status = 'completed'
        WHERE id = $1 AND mode = 'COD' AND status = 'pending'
        ",
    )
    .bind(payment_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Load a payment on any connection.
pub(crate) async fn load_payment(
    conn: &mut PgConnection,
    payment_id: PaymentId,
) -> Result<Payment, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM shop.payment WHERE id = $1"
    ))
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    row.map(Payment::from).ok_or(RepositoryError::NotFound)
}

/// Repository for payments.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Payment>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.payment WHERE {PAYMENT_FILTER}"
        ))
        .bind(filter.status)
        .bind(filter.mode)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            SELECT {PAYMENT_COLUMNS}
            FROM shop.payment
            WHERE {PAYMENT_FILTER}
            ORDER BY {} {}, id
            LIMIT $3 OFFSET $4
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.status)
        .bind(filter.mode)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Payment::from).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Payment>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM shop.payment WHERE id = $1 OR code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Payment::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM shop.payment WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Payment::from))
    }

    /// Store the gateway order id issued for a pending payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment is gone or settled.
    pub async fn set_gateway_order(
        &self,
        id: PaymentId,
        gateway_order_id: &str,
    ) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            UPDATE shop.payment SET gateway_order_id = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(gateway_order_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_write(e, "gateway order already linked"))?;

        row.map(Payment::from).ok_or(RepositoryError::NotFound)
    }

    /// Mark an online payment completed with the gateway's payment id.
    ///
    /// Completing an already completed payment returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist.
    pub async fn complete(
        &self,
        id: PaymentId,
        gateway_payment_id: &str,
    ) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            UPDATE shop.payment SET
                status = 'completed',
                gateway_payment_id = COALESCE(gateway_payment_id, $2)
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(gateway_payment_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Payment::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a payment and unlink it from its order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist.
    pub async fn delete(&self, id: PaymentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.payment WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

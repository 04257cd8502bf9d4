//! Coupon repository.
//!
//! Redemptions are written by the order workflow (see `orders`); this
//! repository only reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{CouponId, CustomerId, PageRequest, ProductId, PublicIdKind, RecordRef, SortOrder};

use super::{RecordSort, RepositoryError, contains_pattern, next_public_code};
use crate::models::{Coupon, CouponFilter, CouponUpdate, NewCoupon};

const DUPLICATE_NAME: &str = "a coupon with this name already exists";

const COUPON_SELECT: &str = r"
    SELECT c.id, c.code, c.coupon_name, c.discount, c.minimum_amount, c.up_to_amount,
           c.start_date, c.end_date, c.is_active, c.created_at, c.updated_at,
           COALESCE(
               (SELECT ARRAY_AGG(cp.product_id ORDER BY cp.product_id)
                FROM shop.coupon_product cp WHERE cp.coupon_id = c.id),
               '{}'
           ) AS product_ids,
           COALESCE(
               (SELECT ARRAY_AGG(cr.customer_id ORDER BY cr.redeemed_at)
                FROM shop.coupon_redemption cr WHERE cr.coupon_id = c.id),
               '{}'
           ) AS used_by
    FROM shop.coupon c
";

const COUPON_FILTER: &str = r"
    ($1::boolean IS NULL OR c.is_active = $1)
    AND ($2::timestamptz IS NULL OR c.start_date >= $2)
    AND ($3::timestamptz IS NULL OR c.end_date <= $3)
    AND ($4::integer IS NULL OR EXISTS (
        SELECT 1 FROM shop.coupon_product cp WHERE cp.coupon_id = c.id AND cp.product_id = $4))
    AND ($5::integer IS NULL OR EXISTS (
        SELECT 1 FROM shop.coupon_redemption cr WHERE cr.coupon_id = c.id AND cr.customer_id = $5))
    AND ($6::text IS NULL OR c.coupon_name ILIKE $6 OR c.code ILIKE $6)
";

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    coupon_name: String,
    discount: Decimal,
    minimum_amount: Decimal,
    up_to_amount: Decimal,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_ids: Vec<i32>,
    used_by: Vec<i32>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            coupon_name: row.coupon_name,
            discount: row.discount,
            minimum_amount: row.minimum_amount,
            up_to_amount: row.up_to_amount,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
            product_ids: row.product_ids.into_iter().map(ProductId::new).collect(),
            used_by: row.used_by.into_iter().map(CustomerId::new).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Stored coupon names are uppercase so lookups can be exact.
fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

async fn link_products(
    conn: &mut PgConnection,
    coupon_id: CouponId,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    if product_ids.is_empty() {
        return Ok(());
    }
    let raw: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();
    sqlx::query(
        r"
        INSERT INTO shop.coupon_product (coupon_id, product_id)
        SELECT $1, p.id FROM shop.product p WHERE p.id = ANY($2)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(coupon_id)
    .bind(&raw)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fetch a coupon by name on any executor.
pub(crate) async fn find_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "{COUPON_SELECT} WHERE UPPER(c.coupon_name) = $1"
    ))
    .bind(normalize_name(name))
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Coupon::from))
}

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the coupon name is taken.
    pub async fn create(&self, input: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Coupon).await?;

        let id: CouponId = sqlx::query_scalar(
            r"
            INSERT INTO shop.coupon (
                code, coupon_name, discount, minimum_amount, up_to_amount,
                start_date, end_date, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(&code)
        .bind(normalize_name(&input.coupon_name))
        .bind(input.discount)
        .bind(input.minimum_amount)
        .bind(input.up_to_amount)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_NAME))?;

        link_products(&mut tx, id, &input.product_ids).await?;

        let row = sqlx::query_as::<_, CouponRow>(&format!("{COUPON_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &CouponFilter,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Coupon>, i64), RepositoryError> {
        let pattern = filter
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.coupon c WHERE {COUPON_FILTER}"
        ))
        .bind(filter.is_active)
        .bind(filter.starts_from)
        .bind(filter.ends_until)
        .bind(filter.product_id)
        .bind(filter.used_by)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            {COUPON_SELECT}
            WHERE {COUPON_FILTER}
            ORDER BY c.{} {}, c.id
            LIMIT $7 OFFSET $8
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.is_active)
        .bind(filter.starts_from)
        .bind(filter.ends_until)
        .bind(filter.product_id)
        .bind(filter.used_by)
        .bind(pattern.as_deref())
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Coupon::from).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Coupon>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "{COUPON_SELECT} WHERE c.id = $1 OR c.code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }

    /// Look up a coupon by the name customers enter, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Coupon>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_by_name(&mut conn, name).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: CouponId,
        update: &CouponUpdate,
    ) -> Result<Coupon, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE shop.coupon SET
                coupon_name = COALESCE($2, coupon_name),
                discount = COALESCE($3, discount),
                minimum_amount = COALESCE($4, minimum_amount),
                up_to_amount = COALESCE($5, up_to_amount),
                start_date = COALESCE($6, start_date),
                end_date = COALESCE($7, end_date),
                is_active = COALESCE($8, is_active)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(update.coupon_name.as_deref().map(normalize_name))
        .bind(update.discount)
        .bind(update.minimum_amount)
        .bind(update.up_to_amount)
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(update.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_NAME))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(product_ids) = &update.product_ids {
            sqlx::query("DELETE FROM shop.coupon_product WHERE coupon_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_products(&mut tx, id, product_ids).await?;
        }

        let row = sqlx::query_as::<_, CouponRow>(&format!("{COUPON_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  diwali10 "), "DIWALI10");
    }
}

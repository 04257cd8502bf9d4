//! Review repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{CustomerId, PageRequest, ProductId, PublicIdKind, RecordRef, ReviewId, SortOrder};

use super::{RecordSort, RepositoryError, next_public_code};
use crate::models::{Review, ReviewFilter, ReviewUpdate};

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.code, r.product_id, r.customer_id, cu.name AS customer_name,
           r.rating, r.title, r.content, r.is_active, r.created_at, r.updated_at
    FROM shop.review r
    JOIN shop.customer cu ON cu.id = r.customer_id
";

const REVIEW_FILTER: &str = r"
    ($1::integer IS NULL OR r.product_id = $1)
    AND ($2::integer IS NULL OR r.customer_id = $2)
    AND ($3::boolean IS NULL OR r.is_active = $3)
";

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    code: String,
    product_id: ProductId,
    customer_id: CustomerId,
    customer_name: String,
    rating: i16,
    title: String,
    content: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            product_id: row.product_id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            rating: row.rating,
            title: row.title,
            content: row.content,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        product_id: ProductId,
        customer_id: CustomerId,
        rating: i16,
        title: &str,
        content: &str,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Review).await?;

        let id: ReviewId = sqlx::query_scalar(
            r"
            INSERT INTO shop.review (code, product_id, customer_id, rating, title, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&code)
        .bind(product_id)
        .bind(customer_id)
        .bind(rating)
        .bind(title.trim())
        .bind(content.trim())
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, ReviewRow>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
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
        filter: &ReviewFilter,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.review r WHERE {REVIEW_FILTER}"
        ))
        .bind(filter.product_id)
        .bind(filter.customer_id)
        .bind(filter.is_active)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            {REVIEW_SELECT}
            WHERE {REVIEW_FILTER}
            ORDER BY r.{} {}, r.id
            LIMIT $4 OFFSET $5
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.product_id)
        .bind(filter.customer_id)
        .bind(filter.is_active)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Review::from).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Review>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "{REVIEW_SELECT} WHERE r.id = $1 OR r.code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn update(&self, id: ReviewId, update: &ReviewUpdate) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE shop.review SET
                rating = COALESCE($2, rating),
                title = COALESCE($3, title),
                content = COALESCE($4, content),
                is_active = COALESCE($5, is_active)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(update.rating)
        .bind(update.title.as_deref().map(str::trim))
        .bind(update.content.as_deref().map(str::trim))
        .bind(update.is_active)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let row = sqlx::query_as::<_, ReviewRow>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

//! Attribute repository.
//!
//! Linked products live in `shop.attribute_product`; a replaced product list
//! is rewritten wholesale inside the update transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use bazaar_core::{AttributeId, PageRequest, ProductId, PublicIdKind, RecordRef, SortOrder};

use super::{ListFilter, RecordSort, RepositoryError, contains_pattern, next_public_code};
use crate::models::{Attribute, AttributeUpdate, NewAttribute};

const ATTRIBUTE_SELECT: &str = r"
    SELECT a.id, a.code, a.attribute_title, a.is_active, a.created_at, a.updated_at,
           COALESCE(
               (SELECT ARRAY_AGG(ap.product_id ORDER BY ap.product_id)
                FROM shop.attribute_product ap WHERE ap.attribute_id = a.id),
               '{}'
           ) AS product_ids
    FROM shop.attribute a
";

#[derive(sqlx::FromRow)]
struct AttributeRow {
    id: AttributeId,
    code: String,
    attribute_title: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_ids: Vec<i32>,
}

impl From<AttributeRow> for Attribute {
    fn from(row: AttributeRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            attribute_title: row.attribute_title,
            product_ids: row.product_ids.into_iter().map(ProductId::new).collect(),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Link `product_ids` to an attribute, ignoring duplicates and unknown products.
async fn link_products(
    conn: &mut PgConnection,
    attribute_id: AttributeId,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    if product_ids.is_empty() {
        return Ok(());
    }
    let raw: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();
    sqlx::query(
        r"
        INSERT INTO shop.attribute_product (attribute_id, product_id)
        SELECT $1, p.id FROM shop.product p WHERE p.id = ANY($2)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(attribute_id)
    .bind(&raw)
    .execute(conn)
    .await?;
    Ok(())
}

/// Repository for product attributes.
pub struct AttributeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AttributeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &NewAttribute) -> Result<Attribute, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Attribute).await?;

        let id: AttributeId = sqlx::query_scalar(
            r"
            INSERT INTO shop.attribute (code, attribute_title, is_active)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(&code)
        .bind(input.attribute_title.trim())
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        link_products(&mut tx, id, &input.product_ids).await?;

        let row = sqlx::query_as::<_, AttributeRow>(&format!("{ATTRIBUTE_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// List attributes; `filter.search` matches the title.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Attribute>, i64), RepositoryError> {
        let pattern = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM shop.attribute a
            WHERE ($1::boolean IS NULL OR a.is_active = $1)
              AND ($2::text IS NULL OR a.attribute_title ILIKE $2)
            ",
        )
        .bind(filter.is_active)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, AttributeRow>(&format!(
            r"
            {ATTRIBUTE_SELECT}
            WHERE ($1::boolean IS NULL OR a.is_active = $1)
              AND ($2::text IS NULL OR a.attribute_title ILIKE $2)
            ORDER BY a.{} {}, a.id
            LIMIT $3 OFFSET $4
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.is_active)
        .bind(pattern.as_deref())
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Attribute::from).collect(), total))
    }

    /// Title search, unpaginated beyond `limit`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(&self, term: &str, limit: i64) -> Result<Vec<Attribute>, RepositoryError> {
        let rows = sqlx::query_as::<_, AttributeRow>(&format!(
            r"
            {ATTRIBUTE_SELECT}
            WHERE a.attribute_title ILIKE $1
            ORDER BY a.attribute_title, a.id
            LIMIT $2
            "
        ))
        .bind(contains_pattern(term))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Attribute::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Attribute>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, AttributeRow>(&format!(
            "{ATTRIBUTE_SELECT} WHERE a.id = $1 OR a.code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Attribute::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no attribute matches.
    pub async fn update(
        &self,
        record: &RecordRef,
        update: &AttributeUpdate,
    ) -> Result<Attribute, RepositoryError> {
        let (id, code) = record.as_bind();
        let mut tx = self.pool.begin().await?;

        let attribute_id: AttributeId = sqlx::query_scalar(
            r"
            UPDATE shop.attribute SET
                attribute_title = COALESCE($3, attribute_title),
                is_active = COALESCE($4, is_active)
            WHERE id = $1 OR code = $2
            RETURNING id
            ",
        )
        .bind(id)
        .bind(code)
        .bind(update.attribute_title.as_deref().map(str::trim))
        .bind(update.is_active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if let Some(product_ids) = &update.product_ids {
            sqlx::query("DELETE FROM shop.attribute_product WHERE attribute_id = $1")
                .bind(attribute_id)
                .execute(&mut *tx)
                .await?;
            link_products(&mut tx, attribute_id, product_ids).await?;
        }

        let row = sqlx::query_as::<_, AttributeRow>(&format!("{ATTRIBUTE_SELECT} WHERE a.id = $1"))
            .bind(attribute_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no attribute matches.
    pub async fn delete(&self, record: &RecordRef) -> Result<(), RepositoryError> {
        let (id, code) = record.as_bind();
        let result = sqlx::query("DELETE FROM shop.attribute WHERE id = $1 OR code = $2")
            .bind(id)
            .bind(code)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

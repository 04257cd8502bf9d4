//! Pickup point repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{PageRequest, PickupId, PublicIdKind, RecordRef, SortOrder};

use super::{ListFilter, RecordSort, RepositoryError, next_public_code};
use crate::models::{NewPickup, Pickup, PickupUpdate};

const DUPLICATE_MOBILE: &str = "a pickup with this mobile number already exists";

const PICKUP_COLUMNS: &str =
    "id, code, name, location, pin_code, mobile, is_active, created_at, updated_at";

const PICKUP_FILTER: &str = r"
    ($1::boolean IS NULL OR is_active = $1)
    AND ($2::text IS NULL OR name ILIKE $2 OR location ILIKE $2 OR pin_code ILIKE $2)
    AND ($3::timestamptz IS NULL OR created_at >= $3)
    AND ($4::timestamptz IS NULL OR created_at <= $4)
";

#[derive(sqlx::FromRow)]
struct PickupRow {
    id: PickupId,
    code: String,
    name: String,
    location: String,
    pin_code: String,
    mobile: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PickupRow> for Pickup {
    fn from(row: PickupRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            location: row.location,
            pin_code: row.pin_code,
            mobile: row.mobile,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for pickup points.
pub struct PickupRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PickupRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pickup point with a fresh public code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the mobile number is taken.
    pub async fn create(&self, input: &NewPickup) -> Result<Pickup, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Pickup).await?;

        let row = sqlx::query_as::<_, PickupRow>(&format!(
            r"
            INSERT INTO shop.pickup (code, name, location, pin_code, mobile, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PICKUP_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(input.name.trim())
        .bind(input.location.trim())
        .bind(input.pin_code.trim())
        .bind(&input.mobile)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_MOBILE))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// List pickups with the total number of matches.
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
    ) -> Result<(Vec<Pickup>, i64), RepositoryError> {
        let pattern = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.pickup WHERE {PICKUP_FILTER}"
        ))
        .bind(filter.is_active)
        .bind(pattern.as_deref())
        .bind(filter.created.from)
        .bind(filter.created.to)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PickupRow>(&format!(
            r"
            SELECT {PICKUP_COLUMNS}
            FROM shop.pickup
            WHERE {PICKUP_FILTER}
            ORDER BY {} {}, id
            LIMIT $5 OFFSET $6
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.is_active)
        .bind(pattern.as_deref())
        .bind(filter.created.from)
        .bind(filter.created.to)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Pickup::from).collect(), total))
    }

    /// Get a pickup by id or code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Pickup>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, PickupRow>(&format!(
            "SELECT {PICKUP_COLUMNS} FROM shop.pickup WHERE id = $1 OR code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Pickup::from))
    }

    /// Whether any pickup uses `mobile`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mobile_exists(&self, mobile: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.pickup WHERE mobile = $1)")
                .bind(mobile)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no pickup matches.
    /// Returns `RepositoryError::Conflict` if the new mobile number is taken.
    pub async fn update(
        &self,
        record: &RecordRef,
        update: &PickupUpdate,
    ) -> Result<Pickup, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, PickupRow>(&format!(
            r"
            UPDATE shop.pickup SET
                name = COALESCE($3, name),
                location = COALESCE($4, location),
                pin_code = COALESCE($5, pin_code),
                mobile = COALESCE($6, mobile),
                is_active = COALESCE($7, is_active)
            WHERE id = $1 OR code = $2
            RETURNING {PICKUP_COLUMNS}
            "
        ))
        .bind(id)
        .bind(code)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.location.as_deref().map(str::trim))
        .bind(update.pin_code.as_deref().map(str::trim))
        .bind(update.mobile.as_deref())
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_MOBILE))?;

        row.map(Pickup::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a pickup. Products shipping from it keep no pickup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no pickup matches.
    pub async fn delete(&self, record: &RecordRef) -> Result<(), RepositoryError> {
        let (id, code) = record.as_bind();
        let result = sqlx::query("DELETE FROM shop.pickup WHERE id = $1 OR code = $2")
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

//! Staff user repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{Email, PageRequest, PublicIdKind, RecordRef, SortOrder, StaffRole, StaffUserId};

use super::{RecordSort, RepositoryError, next_public_code};
use crate::models::StaffUser;

const DUPLICATE_ACCOUNT: &str = "a staff user with this email or phone already exists";

const STAFF_COLUMNS: &str =
    "id, code, name, role, email, phone, active_state, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct StaffRow {
    id: StaffUserId,
    code: String,
    name: String,
    role: StaffRole,
    email: Option<String>,
    phone: String,
    active_state: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StaffRow> for StaffUser {
    type Error = RepositoryError;

    fn try_from(row: StaffRow) -> Result<Self, Self::Error> {
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        Ok(Self {
            id: row.id,
            code: row.code,
            name: row.name,
            role: row.role,
            email,
            phone: row.phone,
            active_state: row.active_state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Stored login details of a staff user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaffCredentials {
    pub id: StaffUserId,
    pub password_hash: String,
    pub active_state: bool,
}

/// Validated fields for a new staff account.
#[derive(Debug, Clone)]
pub struct StaffInsert<'a> {
    pub name: &'a str,
    pub role: StaffRole,
    pub email: Option<&'a Email>,
    pub phone: &'a str,
    pub password_hash: &'a str,
}

/// Validated changes to a staff account.
#[derive(Debug, Clone, Default)]
pub struct StaffChange<'a> {
    pub name: Option<&'a str>,
    pub role: Option<StaffRole>,
    pub email: Option<&'a Email>,
    pub phone: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub active_state: Option<bool>,
}

/// Repository for back-office accounts.
pub struct StaffRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or phone is taken.
    pub async fn create(&self, input: &StaffInsert<'_>) -> Result<StaffUser, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::StaffUser).await?;

        let row = sqlx::query_as::<_, StaffRow>(&format!(
            r"
            INSERT INTO shop.staff_user (code, name, role, email, phone, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {STAFF_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(input.name.trim())
        .bind(input.role)
        .bind(input.email.map(Email::as_str))
        .bind(input.phone)
        .bind(input.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_ACCOUNT))?;

        tx.commit().await?;
        row.try_into()
    }

    /// Login details for an email or phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email_or_phone: &str,
    ) -> Result<Option<StaffCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, StaffCredentials>(
            r"
            SELECT id, password_hash, active_state
            FROM shop.staff_user
            WHERE email = LOWER($1) OR phone = $1
            ",
        )
        .bind(email_or_phone.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: StaffUserId) -> Result<Option<StaffUser>, RepositoryError> {
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            "SELECT {STAFF_COLUMNS} FROM shop.staff_user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(StaffUser::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<StaffUser>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            "SELECT {STAFF_COLUMNS} FROM shop.staff_user WHERE id = $1 OR code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(StaffUser::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        active_state: Option<bool>,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<StaffUser>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.staff_user WHERE ($1::boolean IS NULL OR active_state = $1)",
        )
        .bind(active_state)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, StaffRow>(&format!(
            r"
            SELECT {STAFF_COLUMNS}
            FROM shop.staff_user
            WHERE ($1::boolean IS NULL OR active_state = $1)
            ORDER BY {} {}, id
            LIMIT $2 OFFSET $3
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(active_state)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(StaffUser::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the new email or phone is taken.
    pub async fn update(
        &self,
        id: StaffUserId,
        change: &StaffChange<'_>,
    ) -> Result<StaffUser, RepositoryError> {
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            r"
            UPDATE shop.staff_user SET
                name = COALESCE($2, name),
                role = COALESCE($3, role),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                password_hash = COALESCE($6, password_hash),
                active_state = COALESCE($7, active_state)
            WHERE id = $1
            RETURNING {STAFF_COLUMNS}
            "
        ))
        .bind(id)
        .bind(change.name.map(str::trim))
        .bind(change.role)
        .bind(change.email.map(Email::as_str))
        .bind(change.phone)
        .bind(change.password_hash)
        .bind(change.active_state)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_ACCOUNT))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn delete(&self, id: StaffUserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.staff_user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

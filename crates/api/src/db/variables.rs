//! Variable repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{PageRequest, PublicIdKind, RecordRef, SortOrder, VariableId};

use super::{ListFilter, RecordSort, RepositoryError, next_public_code};
use crate::models::variable::normalize_types;
use crate::models::{NewVariable, Variable, VariableUpdate};

const DUPLICATE_NAME: &str = "a variable with this name already exists";

const VARIABLE_COLUMNS: &str =
    "id, code, variable_name, variable_types, is_active, created_at, updated_at";

const VARIABLE_FILTER: &str = r"
    ($1::boolean IS NULL OR is_active = $1)
    AND ($2::text IS NULL OR variable_name ILIKE $2 OR code ILIKE $2)
";

#[derive(sqlx::FromRow)]
struct VariableRow {
    id: VariableId,
    code: String,
    variable_name: String,
    variable_types: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VariableRow> for Variable {
    fn from(row: VariableRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            variable_name: row.variable_name,
            variable_types: row.variable_types,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for variation axes.
pub struct VariableRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VariableRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, input: NewVariable) -> Result<Variable, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Variable).await?;

        let row = sqlx::query_as::<_, VariableRow>(&format!(
            r"
            INSERT INTO shop.variable (code, variable_name, variable_types, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {VARIABLE_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(input.variable_name.trim())
        .bind(normalize_types(input.variable_types))
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_NAME))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Variable>, i64), RepositoryError> {
        let pattern = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.variable WHERE {VARIABLE_FILTER}"
        ))
        .bind(filter.is_active)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, VariableRow>(&format!(
            r"
            SELECT {VARIABLE_COLUMNS}
            FROM shop.variable
            WHERE {VARIABLE_FILTER}
            ORDER BY {} {}, id
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

        Ok((rows.into_iter().map(Variable::from).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Variable>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, VariableRow>(&format!(
            "SELECT {VARIABLE_COLUMNS} FROM shop.variable WHERE id = $1 OR code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Variable::from))
    }

    /// Which of `ids` exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn existing_ids(&self, ids: &[VariableId]) -> Result<Vec<VariableId>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(VariableId::as_i32).collect();
        let found: Vec<VariableId> =
            sqlx::query_scalar("SELECT id FROM shop.variable WHERE id = ANY($1)")
                .bind(&raw)
                .fetch_all(self.pool)
                .await?;
        Ok(found)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no variable matches.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        record: &RecordRef,
        update: VariableUpdate,
    ) -> Result<Variable, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, VariableRow>(&format!(
            r"
            UPDATE shop.variable SET
                variable_name = COALESCE($3, variable_name),
                variable_types = COALESCE($4, variable_types),
                is_active = COALESCE($5, is_active)
            WHERE id = $1 OR code = $2
            RETURNING {VARIABLE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(code)
        .bind(update.variable_name.as_deref().map(str::trim))
        .bind(update.variable_types.map(normalize_types))
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_NAME))?;

        row.map(Variable::from).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no variable matches.
    pub async fn delete(&self, record: &RecordRef) -> Result<(), RepositoryError> {
        let (id, code) = record.as_bind();
        let result = sqlx::query("DELETE FROM shop.variable WHERE id = $1 OR code = $2")
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

//! Display component repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use bazaar_core::{ComponentId, ComponentKind, PageRequest, PublicIdKind, RecordRef, SortOrder};

use super::{RecordSort, RepositoryError, next_public_code};
use crate::models::{Component, ComponentOption, ComponentUpdate, ImageAsset, NewComponent};

/// Most entries returned by the name dropdown.
pub const DROPDOWN_LIMIT: i64 = 30;

const COMPONENT_COLUMNS: &str = "id, code, name, kind, image, is_active, created_at, updated_at";

const COMPONENT_FILTER: &str = r"
    ($1::shop.component_kind IS NULL OR kind = $1)
    AND ($2::boolean IS NULL OR is_active = $2)
";

#[derive(sqlx::FromRow)]
struct ComponentRow {
    id: ComponentId,
    code: String,
    name: String,
    kind: ComponentKind,
    image: Json<ImageAsset>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ComponentRow> for Component {
    fn from(row: ComponentRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            kind: row.kind,
            image: row.image.0,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: ComponentId,
    code: String,
    name: String,
    kind: ComponentKind,
}

/// `ILIKE` pattern matching names that contain the query's characters in order.
///
/// `"bnr"` matches `"Banner"`; whitespace in the query is ignored.
fn subsequence_pattern(query: &str) -> String {
    let mut pattern = String::from("%");
    for c in query.chars().filter(|c| !c.is_whitespace()) {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
        pattern.push('%');
    }
    pattern
}

/// Repository for storefront components.
pub struct ComponentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ComponentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &NewComponent) -> Result<Component, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Component).await?;

        let row = sqlx::query_as::<_, ComponentRow>(&format!(
            r"
            INSERT INTO shop.component (code, name, kind, image, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COMPONENT_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(input.name.trim())
        .bind(input.kind)
        .bind(Json(&input.image))
        .bind(input.is_active)
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
        kind: Option<ComponentKind>,
        is_active: Option<bool>,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Component>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.component WHERE {COMPONENT_FILTER}"
        ))
        .bind(kind)
        .bind(is_active)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ComponentRow>(&format!(
            r"
            SELECT {COMPONENT_COLUMNS}
            FROM shop.component
            WHERE {COMPONENT_FILTER}
            ORDER BY {} {}, id
            LIMIT $3 OFFSET $4
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(kind)
        .bind(is_active)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Component::from).collect(), total))
    }

    /// Fuzzy name lookup for pickers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn dropdown(&self, query: &str) -> Result<Vec<ComponentOption>, RepositoryError> {
        let rows = sqlx::query_as::<_, OptionRow>(
            r"
            SELECT id, code, name, kind
            FROM shop.component
            WHERE name ILIKE $1
            ORDER BY LENGTH(name), name
            LIMIT $2
            ",
        )
        .bind(subsequence_pattern(query))
        .bind(DROPDOWN_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ComponentOption {
                id: row.id,
                code: row.code,
                name: row.name,
                kind: row.kind,
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Component>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, ComponentRow>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM shop.component WHERE id = $1 OR code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Component::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no component matches.
    pub async fn update(
        &self,
        id: ComponentId,
        update: &ComponentUpdate,
    ) -> Result<Component, RepositoryError> {
        let row = sqlx::query_as::<_, ComponentRow>(&format!(
            r"
            UPDATE shop.component SET
                name = COALESCE($2, name),
                kind = COALESCE($3, kind),
                image = COALESCE($4, image),
                is_active = COALESCE($5, is_active)
            WHERE id = $1
            RETURNING {COMPONENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.kind)
        .bind(update.image.as_ref().map(Json))
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?;

        row.map(Component::from).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no component matches.
    pub async fn delete(&self, id: ComponentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.component WHERE id = $1")
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
    fn test_subsequence_pattern() {
        assert_eq!(subsequence_pattern("bnr"), "%b%n%r%");
        assert_eq!(subsequence_pattern("top 10%"), "%t%o%p%1%0%\\%%");
        assert_eq!(subsequence_pattern(""), "%");
    }
}

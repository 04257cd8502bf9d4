//! Category tree repository.
//!
//! A category row owns ordered `subcategory` rows which own ordered
//! `sub_subcategory` rows. Reads load the three levels with one query each
//! and stitch them together in memory.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{
    CategoryId, PageRequest, PublicIdKind, RecordRef, SortOrder, SubSubcategoryId, SubcategoryId,
};

use super::{ListFilter, RecordSort, RepositoryError, next_public_code};
use crate::models::category::{NewSubcategory, SubcategoryChange};
use crate::models::{Category, CategoryUpdate, ImageAsset, NewCategory, SubSubcategory, Subcategory};

const DUPLICATE_NAME: &str = "a category with this name already exists";

const CATEGORY_COLUMNS: &str = "id, code, main_category, image, is_active, created_at, updated_at";

const CATEGORY_FILTER: &str = r"
    ($1::boolean IS NULL OR is_active = $1)
    AND ($2::timestamptz IS NULL OR created_at >= $2)
    AND ($3::timestamptz IS NULL OR created_at <= $3)
";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    code: String,
    main_category: String,
    image: Json<ImageAsset>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SubcategoryRow {
    id: SubcategoryId,
    category_id: CategoryId,
    name: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct SubSubcategoryRow {
    id: SubSubcategoryId,
    subcategory_id: SubcategoryId,
    name: String,
    is_active: bool,
}

/// Load the subcategory levels for `rows` and assemble full categories.
async fn assemble(
    conn: &mut PgConnection,
    rows: Vec<CategoryRow>,
) -> Result<Vec<Category>, RepositoryError> {
    let category_ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();

    let subs = sqlx::query_as::<_, SubcategoryRow>(
        r"
        SELECT id, category_id, name, is_active
        FROM shop.subcategory
        WHERE category_id = ANY($1)
        ORDER BY position, id
        ",
    )
    .bind(&category_ids)
    .fetch_all(&mut *conn)
    .await?;

    let sub_ids: Vec<i32> = subs.iter().map(|s| s.id.as_i32()).collect();
    let leaves = sqlx::query_as::<_, SubSubcategoryRow>(
        r"
        SELECT id, subcategory_id, name, is_active
        FROM shop.sub_subcategory
        WHERE subcategory_id = ANY($1)
        ORDER BY position, id
        ",
    )
    .bind(&sub_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut leaves_by_sub: HashMap<SubcategoryId, Vec<SubSubcategory>> = HashMap::new();
    for leaf in leaves {
        leaves_by_sub
            .entry(leaf.subcategory_id)
            .or_default()
            .push(SubSubcategory {
                id: leaf.id,
                name: leaf.name,
                is_active: leaf.is_active,
            });
    }

    let mut subs_by_category: HashMap<CategoryId, Vec<Subcategory>> = HashMap::new();
    for sub in subs {
        subs_by_category
            .entry(sub.category_id)
            .or_default()
            .push(Subcategory {
                id: sub.id,
                name: sub.name,
                is_active: sub.is_active,
                sub_subcategories: leaves_by_sub.remove(&sub.id).unwrap_or_default(),
            });
    }

    Ok(rows
        .into_iter()
        .map(|row| Category {
            id: row.id,
            code: row.code,
            main_category: row.main_category,
            image: row.image.0,
            is_active: row.is_active,
            subcategories: subs_by_category.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

async fn insert_subcategory(
    conn: &mut PgConnection,
    category_id: CategoryId,
    name: &str,
) -> Result<SubcategoryId, RepositoryError> {
    let id: SubcategoryId = sqlx::query_scalar(
        r"
        INSERT INTO shop.subcategory (category_id, name, position)
        SELECT $1, $2, COALESCE(MAX(position) + 1, 0)
        FROM shop.subcategory WHERE category_id = $1
        RETURNING id
        ",
    )
    .bind(category_id)
    .bind(name.trim())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

async fn insert_sub_subcategory(
    conn: &mut PgConnection,
    subcategory_id: SubcategoryId,
    name: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shop.sub_subcategory (subcategory_id, name, position)
        SELECT $1, $2, COALESCE(MAX(position) + 1, 0)
        FROM shop.sub_subcategory WHERE subcategory_id = $1
        ",
    )
    .bind(subcategory_id)
    .bind(name.trim())
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_tree(
    conn: &mut PgConnection,
    category_id: CategoryId,
    subcategories: &[NewSubcategory],
) -> Result<(), RepositoryError> {
    for sub in subcategories {
        let sub_id = insert_subcategory(conn, category_id, &sub.name).await?;
        for leaf in &sub.sub_subcategories {
            insert_sub_subcategory(conn, sub_id, leaf).await?;
        }
    }
    Ok(())
}

/// Apply subcategory changes: known ids are edited, entries without id appended.
///
/// Ids belonging to another category are ignored.
async fn apply_changes(
    conn: &mut PgConnection,
    category_id: CategoryId,
    changes: &[SubcategoryChange],
) -> Result<(), RepositoryError> {
    for change in changes {
        let sub_id = match change.id {
            Some(id) => {
                let updated: Option<SubcategoryId> = sqlx::query_scalar(
                    r"
                    UPDATE shop.subcategory SET
                        name = COALESCE($3, name),
                        is_active = COALESCE($4, is_active)
                    WHERE id = $1 AND category_id = $2
                    RETURNING id
                    ",
                )
                .bind(id)
                .bind(category_id)
                .bind(change.name.as_deref().map(str::trim))
                .bind(change.is_active)
                .fetch_optional(&mut *conn)
                .await?;
                match updated {
                    Some(id) => id,
                    None => continue,
                }
            }
            None => match change.name.as_deref() {
                Some(name) => insert_subcategory(conn, category_id, name).await?,
                None => continue,
            },
        };

        for leaf in &change.sub_subcategories {
            match (leaf.id, leaf.name.as_deref()) {
                (Some(leaf_id), _) => {
                    sqlx::query(
                        r"
                        UPDATE shop.sub_subcategory SET
                            name = COALESCE($3, name),
                            is_active = COALESCE($4, is_active)
                        WHERE id = $1 AND subcategory_id = $2
                        ",
                    )
                    .bind(leaf_id)
                    .bind(sub_id)
                    .bind(leaf.name.as_deref().map(str::trim))
                    .bind(leaf.is_active)
                    .execute(&mut *conn)
                    .await?;
                }
                (None, Some(name)) => insert_sub_subcategory(conn, sub_id, name).await?,
                (None, None) => {}
            }
        }
    }
    Ok(())
}

/// Repository for the category tree.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a category with its subcategory tree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(
        &self,
        input: &NewCategory,
        image: &ImageAsset,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Category).await?;

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            INSERT INTO shop.category (code, main_category, image, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(input.main_category.trim())
        .bind(Json(image))
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_NAME))?;

        insert_tree(&mut tx, row.id, &input.subcategories).await?;
        let category = assemble(&mut tx, vec![row])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(category)
    }

    /// List categories with their full trees.
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
    ) -> Result<(Vec<Category>, i64), RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.category WHERE {CATEGORY_FILTER}"
        ))
        .bind(filter.is_active)
        .bind(filter.created.from)
        .bind(filter.created.to)
        .fetch_one(&mut *conn)
        .await?;

        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            SELECT {CATEGORY_COLUMNS}
            FROM shop.category
            WHERE {CATEGORY_FILTER}
            ORDER BY {} {}, id
            LIMIT $4 OFFSET $5
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.is_active)
        .bind(filter.created.from)
        .bind(filter.created.to)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        Ok((assemble(&mut conn, rows).await?, total))
    }

    /// Get a category by id or code with its full tree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Category>, RepositoryError> {
        let (id, code) = record.as_bind();
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.category WHERE id = $1 OR code = $2"
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

    /// Update scalar fields and apply subcategory changes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        update: &CategoryUpdate,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            UPDATE shop.category SET
                main_category = COALESCE($2, main_category),
                is_active = COALESCE($3, is_active),
                image = COALESCE($4, image)
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.main_category.as_deref().map(str::trim))
        .bind(update.is_active)
        .bind(update.image.as_ref().map(Json))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_NAME))?
        .ok_or(RepositoryError::NotFound)?;

        apply_changes(&mut tx, id, &update.subcategories).await?;
        let category = assemble(&mut tx, vec![row])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(category)
    }

    /// Delete a category and its tree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` while products still use it.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::on_delete(e, "category still has products"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

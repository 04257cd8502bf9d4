//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use bazaar_core::{
    CategoryId, PageRequest, PickupId, ProductId, ProductType, PublicIdKind, RecordRef, SortOrder,
    product_slug,
};

use super::{RepositoryError, contains_pattern, next_public_code};
use crate::models::{
    ImageAsset, NewProduct, Product, ProductFilter, ProductSort, ProductSummary, ProductUpdate,
    ProductVariant, SpecificationEntry,
};

const PRODUCT_COLUMNS: &str = r"
    p.id, p.code, p.slug, p.title, p.category_id, p.sub_category, p.sub_sub_category,
    p.pickup_id, p.product_type, p.main_product_id, p.price, p.mrp, p.in_stock,
    p.attribute, p.discount, p.description, p.variants, p.specification, p.images,
    p.hover_image, p.thumbnail_image, p.is_active, p.created_at, p.updated_at
";

/// Columns for [`SummaryRow`], selected from `shop.product p`.
pub(crate) const SUMMARY_COLUMNS: &str = r"
    p.id, p.code, p.slug, p.title, p.category_id, p.price, p.mrp, p.in_stock, p.is_active,
    COALESCE(p.thumbnail_image, p.hover_image) AS thumbnail
";

const PRODUCT_FILTER: &str = r"
    ($1::shop.product_type IS NULL OR p.product_type = $1)
    AND ($2::numeric IS NULL OR p.price >= $2)
    AND ($3::numeric IS NULL OR p.price <= $3)
    AND ($4::integer IS NULL OR p.in_stock >= $4)
    AND (
        (CARDINALITY($5::integer[]) = 0 AND CARDINALITY($6::text[]) = 0)
        OR p.category_id = ANY($5)
        OR p.category_id IN (SELECT c.id FROM shop.category c WHERE c.code = ANY($6))
    )
    AND ($7::boolean IS NULL OR p.is_active = $7)
    AND ($8::text IS NULL OR p.title ILIKE $8 OR p.code ILIKE $8)
";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    code: String,
    slug: String,
    title: String,
    category_id: CategoryId,
    sub_category: Option<String>,
    sub_sub_category: Option<String>,
    pickup_id: Option<PickupId>,
    product_type: ProductType,
    main_product_id: Option<ProductId>,
    price: Decimal,
    mrp: Decimal,
    in_stock: i32,
    attribute: Option<String>,
    discount: Option<Decimal>,
    description: Option<String>,
    variants: Json<Vec<ProductVariant>>,
    specification: Json<Vec<SpecificationEntry>>,
    images: Json<Vec<ImageAsset>>,
    hover_image: Json<ImageAsset>,
    thumbnail_image: Option<Json<ImageAsset>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            slug: row.slug,
            title: row.title,
            category_id: row.category_id,
            sub_category: row.sub_category,
            sub_sub_category: row.sub_sub_category,
            pickup_id: row.pickup_id,
            product_type: row.product_type,
            main_product_id: row.main_product_id,
            price: row.price,
            mrp: row.mrp,
            in_stock: row.in_stock,
            attribute: row.attribute,
            discount: row.discount,
            description: row.description,
            variants: row.variants.0,
            specification: row.specification.0,
            images: row.images.0,
            hover_image: row.hover_image.0,
            thumbnail_image: row.thumbnail_image.map(|j| j.0),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SummaryRow {
    id: ProductId,
    code: String,
    slug: String,
    title: String,
    category_id: CategoryId,
    price: Decimal,
    mrp: Decimal,
    in_stock: i32,
    is_active: bool,
    thumbnail: Option<Json<ImageAsset>>,
}

impl From<SummaryRow> for ProductSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            slug: row.slug,
            title: row.title,
            category_id: row.category_id,
            price: row.price,
            mrp: row.mrp,
            in_stock: row.in_stock,
            is_active: row.is_active,
            thumbnail: row.thumbnail.map(|j| j.0),
        }
    }
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product; the slug is derived from the title and new code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category, pickup or main
    /// product does not exist.
    pub async fn create(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Product).await?;
        let slug = product_slug(&input.title, &code);

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product AS p (
                code, slug, title, category_id, sub_category, sub_sub_category, pickup_id,
                product_type, main_product_id, price, mrp, in_stock, attribute, discount,
                description, variants, specification, images, hover_image, thumbnail_image,
                is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(&slug)
        .bind(input.title.trim())
        .bind(input.category_id)
        .bind(input.sub_category.as_deref())
        .bind(input.sub_sub_category.as_deref())
        .bind(input.pickup_id)
        .bind(input.product_type)
        .bind(input.main_product_id)
        .bind(input.price)
        .bind(input.mrp)
        .bind(input.in_stock)
        .bind(input.attribute.as_deref())
        .bind(input.discount)
        .bind(input.description.as_deref())
        .bind(Json(&input.variants))
        .bind(Json(&input.specification))
        .bind(Json(&input.images))
        .bind(Json(&input.hover_image))
        .bind(input.thumbnail_image.as_ref().map(Json))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict(
                    "referenced category, pickup or main product does not exist".to_owned(),
                );
            }
            RepositoryError::on_write(e, "product slug already exists")
        })?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
        sort: ProductSort,
        order: SortOrder,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let category_ids: Vec<i32> = filter.category_ids.iter().map(CategoryId::as_i32).collect();
        let pattern = filter
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.product p WHERE {PRODUCT_FILTER}"
        ))
        .bind(filter.product_type)
        .bind(filter.price_min)
        .bind(filter.price_max)
        .bind(filter.min_stock)
        .bind(&category_ids)
        .bind(&filter.category_codes)
        .bind(filter.is_active)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product p
            WHERE {PRODUCT_FILTER}
            ORDER BY {} {}, p.id
            LIMIT $9 OFFSET $10
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(filter.product_type)
        .bind(filter.price_min)
        .bind(filter.price_max)
        .bind(filter.min_stock)
        .bind(&category_ids)
        .bind(&filter.category_codes)
        .bind(filter.is_active)
        .bind(pattern.as_deref())
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    /// Get a product by id or code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Product>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = $1 OR p.code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Apply a partial update to `existing`.
    ///
    /// A new title also regenerates the slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product was deleted meanwhile.
    /// Returns `RepositoryError::Conflict` if a referenced row does not exist.
    pub async fn update(
        &self,
        existing: &Product,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let slug = update
            .title
            .as_deref()
            .map(|title| product_slug(title, &existing.code));

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET
                title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                category_id = COALESCE($4, category_id),
                sub_category = COALESCE($5, sub_category),
                sub_sub_category = COALESCE($6, sub_sub_category),
                pickup_id = COALESCE($7, pickup_id),
                product_type = COALESCE($8, product_type),
                main_product_id = COALESCE($9, main_product_id),
                price = COALESCE($10, price),
                mrp = COALESCE($11, mrp),
                in_stock = COALESCE($12, in_stock),
                attribute = COALESCE($13, attribute),
                discount = COALESCE($14, discount),
                description = COALESCE($15, description),
                variants = COALESCE($16, variants),
                specification = COALESCE($17, specification),
                images = COALESCE($18, images),
                hover_image = COALESCE($19, hover_image),
                thumbnail_image = COALESCE($20, thumbnail_image),
                is_active = COALESCE($21, is_active)
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(existing.id)
        .bind(update.title.as_deref().map(str::trim))
        .bind(slug)
        .bind(update.category_id)
        .bind(update.sub_category.as_deref())
        .bind(update.sub_sub_category.as_deref())
        .bind(update.pickup_id)
        .bind(update.product_type)
        .bind(update.main_product_id)
        .bind(update.price)
        .bind(update.mrp)
        .bind(update.in_stock)
        .bind(update.attribute.as_deref())
        .bind(update.discount)
        .bind(update.description.as_deref())
        .bind(update.variants.as_ref().map(Json))
        .bind(update.specification.as_ref().map(Json))
        .bind(update.images.as_ref().map(Json))
        .bind(update.hover_image.as_ref().map(Json))
        .bind(update.thumbnail_image.as_ref().map(Json))
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict(
                    "referenced category, pickup or main product does not exist".to_owned(),
                );
            }
            RepositoryError::Database(e)
        })?;

        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` while an order references it.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::on_delete(e, "product is part of an existing order"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

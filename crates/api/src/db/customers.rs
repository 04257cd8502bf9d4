//! Customer repository, including cart and wishlist rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use bazaar_core::{CustomerId, Email, PageRequest, ProductId, PublicIdKind, RecordRef, SortOrder};

use super::products::{SUMMARY_COLUMNS, SummaryRow};
use super::{RecordSort, RepositoryError, contains_pattern, next_public_code};
use crate::models::{
    Cart, CartLine, Customer, CustomerUpdate, ImageAsset, ProductSummary, WishlistEntry,
    WishlistFilter,
};

const DUPLICATE_ACCOUNT: &str = "an account with this email or mobile already exists";

const CUSTOMER_COLUMNS: &str = r"
    id, code, name, email, mobile, is_login, profile_image, addresses, created_at, updated_at
";

const CUSTOMER_FILTER: &str = r"
    ($1::boolean IS NULL OR is_login = $1)
    AND ($2::text IS NULL
         OR name ILIKE $2 OR email ILIKE $2 OR mobile ILIKE $2 OR addresses::text ILIKE $2)
";

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    code: String,
    name: String,
    email: String,
    mobile: String,
    is_login: bool,
    profile_image: Option<Json<ImageAsset>>,
    addresses: Json<Vec<serde_json::Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            code: row.code,
            name: row.name,
            email,
            mobile: row.mobile,
            is_login: row.is_login,
            profile_image: row.profile_image.map(|j| j.0),
            addresses: row.addresses.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: CustomerId,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct CartRow {
    #[sqlx(flatten)]
    product: SummaryRow,
    quantity: i32,
    added_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct WishlistRow {
    #[sqlx(flatten)]
    product: SummaryRow,
    added_at: DateTime<Utc>,
}

/// Repository for customer accounts.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a customer and mark them logged in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or mobile is taken.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        mobile: &str,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let code = next_public_code(&mut *tx, PublicIdKind::Customer).await?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO shop.customer (code, name, email, mobile, password_hash, is_login)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(name.trim())
        .bind(email.as_str())
        .bind(mobile)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_ACCOUNT))?;

        tx.commit().await?;
        row.try_into()
    }

    /// Find the id and password hash for an email or mobile login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email_or_mobile: &str,
    ) -> Result<Option<(CustomerId, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r"
            SELECT id, password_hash
            FROM shop.customer
            WHERE email = LOWER($1) OR mobile = $1
            ",
        )
        .bind(email_or_mobile.trim())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (r.id, r.password_hash)))
    }

    /// Record whether the customer currently has a session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn set_login(&self, id: CustomerId, is_login: bool) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "UPDATE shop.customer SET is_login = $2 WHERE id = $1 RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_login)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM shop.customer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, record: &RecordRef) -> Result<Option<Customer>, RepositoryError> {
        let (id, code) = record.as_bind();
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM shop.customer WHERE id = $1 OR code = $2"
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// List customers; `search` matches name, email, mobile and address text.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        is_login: Option<bool>,
        search: Option<&str>,
        page: PageRequest,
        sort: RecordSort,
        order: SortOrder,
    ) -> Result<(Vec<Customer>, i64), RepositoryError> {
        let pattern = search.filter(|s| !s.trim().is_empty()).map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.customer WHERE {CUSTOMER_FILTER}"
        ))
        .bind(is_login)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS}
            FROM shop.customer
            WHERE {CUSTOMER_FILTER}
            ORDER BY {} {}, id
            LIMIT $3 OFFSET $4
            ",
            sort.column(),
            order.as_sql()
        ))
        .bind(is_login)
        .bind(pattern.as_deref())
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let customers = rows
            .into_iter()
            .map(Customer::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((customers, total))
    }

    /// Update profile fields. `password_hash` replaces the stored hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    /// Returns `RepositoryError::Conflict` if the new mobile is taken.
    pub async fn update(
        &self,
        id: CustomerId,
        update: &CustomerUpdate,
        password_hash: Option<&str>,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE shop.customer SET
                name = COALESCE($2, name),
                mobile = COALESCE($3, mobile),
                addresses = COALESCE($4, addresses),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.mobile.as_deref())
        .bind(update.addresses.as_ref().map(Json))
        .bind(password_hash)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_write(e, DUPLICATE_ACCOUNT))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Replace the profile image, returning the customer as stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn set_profile_image(
        &self,
        id: CustomerId,
        image: &ImageAsset,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "UPDATE shop.customer SET profile_image = $2 WHERE id = $1 RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(id)
        .bind(Json(image))
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    /// Returns `RepositoryError::Conflict` while the customer has orders.
    pub async fn delete(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.customer WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::on_delete(e, "customer has orders"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// The customer's cart with current product prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cart(&self, id: CustomerId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartRow>(&format!(
            r"
            SELECT {SUMMARY_COLUMNS}, ci.quantity, ci.added_at
            FROM shop.cart_item ci
            JOIN shop.product p ON p.id = ci.product_id
            WHERE ci.customer_id = $1
            ORDER BY ci.added_at, p.id
            "
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(|row| {
                let product = ProductSummary::from(row.product);
                CartLine {
                    line_total: product.price * rust_decimal::Decimal::from(row.quantity),
                    product,
                    quantity: row.quantity,
                    added_at: row.added_at,
                }
            })
            .collect();
        Ok(Cart::from_lines(lines))
    }

    /// Add `quantity` of a product, summing with any existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn add_to_cart(
        &self,
        id: CustomerId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.cart_item (customer_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id, product_id)
            DO UPDATE SET quantity = shop.cart_item.quantity + EXCLUDED.quantity
            ",
        )
        .bind(id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Set the quantity of an existing cart line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn set_cart_quantity(
        &self,
        id: CustomerId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.cart_item SET quantity = $3 WHERE customer_id = $1 AND product_id = $2",
        )
        .bind(id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn remove_from_cart(
        &self,
        id: CustomerId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.cart_item WHERE customer_id = $1 AND product_id = $2")
                .bind(id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// The customer's wishlist, narrowed by product filters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn wishlist(
        &self,
        id: CustomerId,
        filter: &WishlistFilter,
    ) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let name = filter
            .name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(contains_pattern);
        let category = filter.category.as_deref().map(RecordRef::parse);
        let (category_id, category_code) = category
            .as_ref()
            .map_or((None, None), RecordRef::as_bind);

        let rows = sqlx::query_as::<_, WishlistRow>(&format!(
            r"
            SELECT {SUMMARY_COLUMNS}, wi.added_at
            FROM shop.wishlist_item wi
            JOIN shop.product p ON p.id = wi.product_id
            LEFT JOIN shop.category c ON c.id = p.category_id
            WHERE wi.customer_id = $1
              AND ($2::numeric IS NULL OR p.price >= $2)
              AND ($3::numeric IS NULL OR p.price <= $3)
              AND ($4::text IS NULL OR p.title ILIKE $4)
              AND ($5::integer IS NULL OR p.category_id = $5)
              AND ($6::text IS NULL OR c.code = $6)
            ORDER BY wi.added_at DESC, p.id
            "
        ))
        .bind(id)
        .bind(filter.price_min)
        .bind(filter.price_max)
        .bind(name.as_deref())
        .bind(category_id)
        .bind(category_code)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| WishlistEntry {
                product: row.product.into(),
                added_at: row.added_at,
            })
            .collect())
    }

    /// Add a product to the wishlist. Adding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn add_to_wishlist(
        &self,
        id: CustomerId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.wishlist_item (customer_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(id)
        .bind(product_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove a product from the wishlist; missing entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn remove_from_wishlist(
        &self,
        id: CustomerId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.wishlist_item WHERE customer_id = $1 AND product_id = $2")
            .bind(id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

//! Database operations for the `shop` schema.
//!
//! # Tables
//!
//! - `category`, `subcategory`, `sub_subcategory` - Category tree
//! - `product`, `attribute`, `attribute_product`, `variable`, `pickup`, `component` - Catalog
//! - `customer`, `cart_item`, `wishlist_item` - Customer accounts
//! - `coupon`, `coupon_product`, `coupon_redemption` - Discounts
//! - `customer_order`, `order_item`, `payment` - Checkout
//! - `review` - Product reviews
//! - `staff_user` - Back-office accounts
//! - `public_id_counter` - Sequences behind the `CAT000001`-style codes
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```

pub mod attributes;
pub mod categories;
pub mod components;
pub mod coupons;
pub mod customers;
pub mod orders;
pub mod payments;
pub mod pickups;
pub mod products;
pub mod reviews;
pub mod staff;
pub mod variables;

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use serde::Deserialize;

use bazaar_core::PublicIdKind;

pub use attributes::AttributeRepository;
pub use categories::CategoryRepository;
pub use components::ComponentRepository;
pub use coupons::CouponRepository;
pub use customers::CustomerRepository;
pub use orders::OrderRepository;
pub use payments::PaymentRepository;
pub use pickups::PickupRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use staff::StaffRepository;
pub use variables::VariableRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint or reference violation.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map an insert/update failure, turning unique violations into `Conflict`.
    pub(crate) fn on_write(e: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(e)
    }

    /// Map a delete failure, turning foreign key violations into `Conflict`.
    pub(crate) fn on_delete(e: sqlx::Error, in_use: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(in_use.to_owned());
        }
        Self::Database(e)
    }
}

/// Inclusive creation-time window for list filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Widen calendar dates to whole days.
    #[must_use]
    pub fn from_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            from: start.map(start_of_day),
            to: end.map(end_of_day),
        }
    }
}

/// Filters shared by the simpler list endpoints.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub created: DateRange,
}

impl ListFilter {
    /// `ILIKE` bind for the search term, if any.
    pub(crate) fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(contains_pattern)
    }
}

/// Sort columns accepted by every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Code,
}

impl RecordSort {
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Code => "code",
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Allocate the next public code for `kind`.
///
/// Runs on whatever executor the caller passes, so the counter bump commits
/// or rolls back with the insert that uses it.
pub(crate) async fn next_public_code<'e, E>(
    executor: E,
    kind: PublicIdKind,
) -> Result<String, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let value: i64 = sqlx::query_scalar(
        r"
        INSERT INTO shop.public_id_counter (entity, last_value)
        VALUES ($1, 1)
        ON CONFLICT (entity)
        DO UPDATE SET last_value = shop.public_id_counter.last_value + 1
        RETURNING last_value
        ",
    )
    .bind(kind.counter_key())
    .fetch_one(executor)
    .await?;

    Ok(kind.format(value))
}

/// Build an `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// First instant of a calendar day (UTC).
pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last millisecond of a calendar day (UTC).
pub(crate) fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last).and_utc()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("saree"), "%saree%");
        assert_eq!(contains_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_date_range_covers_whole_days() {
        let range = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2026, 1, 1),
            NaiveDate::from_ymd_opt(2026, 1, 31),
        );
        assert_eq!(
            range.from.map(|d| d.to_rfc3339()).as_deref(),
            Some("2026-01-01T00:00:00+00:00")
        );
        assert_eq!(
            range.to.map(|d| d.to_rfc3339()).as_deref(),
            Some("2026-01-31T23:59:59.999+00:00")
        );
        assert_eq!(DateRange::from_dates(None, None), DateRange::default());
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ListFilter {
            search: Some("   ".to_string()),
            ..ListFilter::default()
        };
        assert!(filter.search_pattern().is_none());
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(start_of_day(date).to_rfc3339(), "2026-03-14T00:00:00+00:00");
        assert_eq!(
            end_of_day(date).to_rfc3339(),
            "2026-03-14T23:59:59.999+00:00"
        );
    }
}

//! Bazaar Core - domain types and rules for the Bazaar commerce backend.
//!
//! Used by:
//! - `api` - the HTTP service
//! - `cli` - migrations and staff bootstrap
//! - `integration-tests` - black-box tests against a running service
//!
//! # Architecture
//!
//! No I/O, no database access, no HTTP clients. Anything here can be unit
//! tested in isolation; the `postgres` feature only adds `sqlx` encodings.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, public codes, emails, phones, statuses, money
//! - [`pagination`] - Page/limit/sort handling for list endpoints
//! - [`coupon`] - Coupon validation and discount calculation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod coupon;
pub mod pagination;
pub mod types;

pub use coupon::{CouponDiscount, CouponRejection, CouponTerms, CouponTermsError, OrderLine};
pub use pagination::{PageRequest, PaginationMeta, SortOrder};
pub use types::*;

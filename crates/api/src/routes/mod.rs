//! HTTP route handlers for the API.
//!
//! Every route lives under `/api`. Paths ending in `{id}` accept either the
//! numeric id or the public code (`PRD000042`).
//!
//! # Route Structure
//!
//! ```text
//! # Categories
//! GET    /api/categories                   - List (inactive children stripped)
//! POST   /api/categories                   - Create (multipart, staff)
//! GET    /api/categories/{id}              - Full tree
//! PUT    /api/categories/{id}              - Update (multipart, staff)
//! DELETE /api/categories/{id}              - Delete (staff)
//!
//! # Catalog support
//! GET|POST          /api/pickups           - List / create
//! GET               /api/pickups/check-mobile
//! GET|PUT|DELETE    /api/pickups/{id}
//! GET|POST          /api/variables
//! GET|PUT|DELETE    /api/variables/{id}
//! GET|POST          /api/attributes
//! GET               /api/attributes/search
//! GET|PUT|DELETE    /api/attributes/{id}
//! GET|POST          /api/components        - POST is multipart
//! GET               /api/components/dropdown
//! GET|PUT|DELETE    /api/components/{id}
//!
//! # Products
//! GET|POST          /api/products          - POST is multipart
//! GET               /api/products/search
//! GET               /api/products/slug/{slug}
//! GET|PUT|DELETE    /api/products/{id}
//!
//! # Customers
//! POST   /api/customers/register | login | logout
//! GET    /api/customers/check-auth
//! GET|PUT /api/customers/me        POST /api/customers/me/profile-image
//! GET|POST /api/customers/me/cart  PUT|DELETE /api/customers/me/cart/{product}
//! GET|POST /api/customers/me/wishlist  DELETE /api/customers/me/wishlist/{product}
//! GET    /api/customers            GET /api/customers/search (staff)
//! GET|DELETE /api/customers/{id}   (staff)
//!
//! # Coupons
//! GET|POST /api/coupons   GET /api/coupons/search   POST /api/coupons/use/{name}
//! GET|PUT|DELETE /api/coupons/{id}
//!
//! # Orders
//! POST   /api/orders               - Checkout (customer)
//! GET    /api/orders               - List (staff)
//! GET    /api/orders/search        - Code search (staff)
//! GET    /api/orders/mine          - Own orders (customer)
//! GET    /api/orders/{id}          - Staff or owning customer
//! PUT|DELETE /api/orders/{id}      - Staff
//!
//! # Payments
//! GET    /api/payments             GET|DELETE /api/payments/{id}
//! POST   /api/payments/razorpay/order    POST /api/payments/razorpay/success
//!
//! # Reviews
//! GET|POST /api/reviews   GET|PUT|DELETE /api/reviews/{id}
//!
//! # Staff users
//! POST /api/staff/login | logout   GET /api/staff/check-auth
//! GET|POST /api/staff   GET|PUT|DELETE /api/staff/{id}
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

use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bazaar_core::{PageRequest, PaginationMeta, RecordRef, SortOrder, pagination::DEFAULT_LIMIT};

use crate::db::{DateRange, ListFilter, RecordSort};
use crate::error::AppError;
use crate::models::ImageAsset;
use crate::services::cloudinary::{ResourceType, UploadFile};
use crate::state::AppState;

/// Request body limit for routes that accept file uploads.
pub(crate) const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// A page of results.
#[derive(Debug, Serialize)]
pub struct Paged<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paged<T> {
    #[must_use]
    pub fn new((data, total_count): (Vec<T>, i64), page: PageRequest) -> Self {
        Self {
            data,
            pagination: page.meta(total_count),
        }
    }
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Query string accepted by the simpler list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort_by: RecordSort,
    #[serde(default)]
    pub order: SortOrder,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ListQuery {
    #[must_use]
    pub fn page(&self) -> PageRequest {
        self.page_with_default(DEFAULT_LIMIT)
    }

    #[must_use]
    pub fn page_with_default(&self, default_limit: u32) -> PageRequest {
        PageRequest::new(self.page, self.limit, default_limit)
    }

    #[must_use]
    pub fn filter(&self) -> ListFilter {
        ListFilter {
            is_active: self.is_active,
            search: self.search.clone(),
            created: DateRange::from_dates(self.start_date, self.end_date),
        }
    }
}

/// `?q=` for search and dropdown endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SearchQuery {
    #[must_use]
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_LIMIT)
    }
}

/// Interpret a `{id}` path segment.
#[must_use]
pub fn record(raw: &str) -> RecordRef {
    RecordRef::parse(raw)
}

/// Turn a missing row into a 404 naming the entity.
pub(crate) fn found<T>(value: Option<T>, what: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::NotFound(format!("{what} not found")))
}

/// Reject blank required text.
pub(crate) fn required(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::BadRequest(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Upload a file to the store's image or document folder.
pub(crate) async fn upload(state: &AppState, file: UploadFile) -> Result<ImageAsset, AppError> {
    let resource_type = ResourceType::for_content_type(&file.content_type);
    let folder = match resource_type {
        ResourceType::Image => state.config().image_folder(),
        ResourceType::Raw => state.config().document_folder(),
    };
    Ok(state
        .cloudinary()
        .upload(file, &folder, resource_type)
        .await?)
}

/// Upload several files, removing the ones already uploaded if one fails.
pub(crate) async fn upload_all(
    state: &AppState,
    files: Vec<UploadFile>,
) -> Result<Vec<ImageAsset>, AppError> {
    let mut uploaded = Vec::with_capacity(files.len());
    for file in files {
        match upload(state, file).await {
            Ok(asset) => uploaded.push(asset),
            Err(e) => {
                state.cloudinary().destroy_quietly(&uploaded).await;
                return Err(e);
            }
        }
    }
    Ok(uploaded)
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(categories::router())
        .merge(pickups::router())
        .merge(variables::router())
        .merge(attributes::router())
        .merge(components::router())
        .merge(products::router())
        .merge(customers::router())
        .merge(coupons::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(reviews::router())
        .merge(staff::router());

    Router::new().nest("/api", api)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        let page = query.page();
        assert_eq!((page.page(), page.limit()), (1, DEFAULT_LIMIT));
        assert_eq!(query.sort_by, RecordSort::CreatedAt);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.filter().created, DateRange::default());
    }

    #[test]
    fn test_paged_meta() {
        let page = PageRequest::new(Some(2), Some(10), DEFAULT_LIMIT);
        let paged = Paged::new((vec![1, 2, 3], 23), page);
        assert_eq!(paged.pagination.total_pages, 3);
        assert_eq!(paged.pagination.current_page, 2);
    }

    #[test]
    fn test_required() {
        assert!(required("Kurta", "title").is_ok());
        assert!(matches!(
            required("  ", "title"),
            Err(AppError::BadRequest(msg)) if msg == "title is required"
        ));
    }
}

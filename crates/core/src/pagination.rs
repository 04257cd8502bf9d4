//! Page/limit/sort parameters shared by every list endpoint.

use serde::{Deserialize, Serialize};

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for `ORDER BY`.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Build a page request, falling back to `default_limit` and clamping.
    ///
    /// Page numbers start at 1; `0` is treated as the first page.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// `LIMIT` bind value.
    #[must_use]
    pub fn limit_i64(&self) -> i64 {
        i64::from(self.limit)
    }

    /// `OFFSET` bind value.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// Pagination block for a response, given the total matching rows.
    #[must_use]
    pub fn meta(&self, total_count: i64) -> PaginationMeta {
        let limit = i64::from(self.limit);
        let total_count = total_count.max(0);
        PaginationMeta {
            total_count,
            current_page: self.page,
            total_pages: (total_count + limit - 1) / limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_LIMIT)
    }
}

/// Pagination block returned next to list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total_count: i64,
    pub current_page: u32,
    pub total_pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let page = PageRequest::default();
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), DEFAULT_LIMIT);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let page = PageRequest::new(Some(0), Some(0), 20);
        assert_eq!((page.page(), page.limit()), (1, 1));

        let page = PageRequest::new(Some(3), Some(5_000), 20);
        assert_eq!(page.limit(), MAX_LIMIT);
        assert_eq!(page.offset(), 200);
    }

    #[test]
    fn test_meta_rounds_pages_up() {
        let page = PageRequest::new(Some(2), Some(10), 10);
        assert_eq!(
            page.meta(21),
            PaginationMeta {
                total_count: 21,
                current_page: 2,
                total_pages: 3,
            }
        );
        assert_eq!(page.meta(20).total_pages, 2);
        assert_eq!(page.meta(0).total_pages, 0);
    }

    #[test]
    fn test_sort_order_parse() {
        let order: SortOrder = serde_json::from_str("\"asc\"").unwrap_or_default();
        assert_eq!(order.as_sql(), "ASC");
        assert_eq!(SortOrder::default().as_sql(), "DESC");
    }
}

//! This module defines the common functionality for paging data.

use serde::Serialize;

/// The config for pagination.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of rows per page when not specified in a request.
    pub default_page_size: u64,
    /// The maximum number of rows a client may request per page.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// The pagination block returned alongside paged listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// The total number of rows matching the query.
    pub total: u64,
    /// The page that was returned.
    pub page: u64,
    /// The page size that was used.
    pub limit: u64,
    /// The number of pages at this page size.
    pub total_pages: u64,
}

impl Pagination {
    /// Build the pagination block for `total` rows at `page`/`limit`.
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }
}

impl PaginationConfig {
    /// Resolve the requested page and page size against the configured
    /// defaults and ceiling. Pages are 1-based; zero and missing values fall
    /// back to the defaults.
    pub fn resolve(&self, page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
        let page = match page {
            Some(page) if page > 0 => page,
            _ => self.default_page,
        };

        let limit = match limit {
            Some(limit) if limit > 0 => limit.min(self.max_page_size),
            _ => self.default_page_size,
        };

        (page, limit)
    }

    /// The number of rows to skip for `page` at `limit` rows per page.
    pub fn offset(page: u64, limit: u64) -> u64 {
        (page - 1) * limit
    }
}

#[cfg(test)]
mod pagination_tests {
    use super::{Pagination, PaginationConfig};

    #[test]
    fn resolve_uses_defaults() {
        let config = PaginationConfig::default();

        assert_eq!(config.resolve(None, None), (1, 20));
    }

    #[test]
    fn resolve_rejects_zero_values() {
        let config = PaginationConfig::default();

        assert_eq!(config.resolve(Some(0), Some(0)), (1, 20));
    }

    #[test]
    fn resolve_caps_page_size() {
        let config = PaginationConfig::default();

        assert_eq!(config.resolve(Some(3), Some(1000)), (3, 100));
    }

    #[test]
    fn total_pages_rounds_up() {
        let pagination = Pagination::new(41, 1, 20);

        assert_eq!(pagination.total_pages, 3);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let pagination = Pagination::new(0, 1, 20);

        assert_eq!(pagination.total_pages, 0);
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PaginationConfig::offset(3, 20), 40);
    }
}

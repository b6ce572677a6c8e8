//! Page/limit pagination for list endpoints.

use docverify_store::Pagination;
use serde::{Deserialize, Serialize};

/// Default page size when `limit` is not specified.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters accepted by list endpoints. Both are 1-based / optional;
/// zero falls back to the default.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    /// Resolve the effective page request.
    pub fn resolve(&self) -> Pagination {
        let page = self.page.filter(|&p| p > 0).unwrap_or(1);
        let limit = self
            .limit
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Pagination::new(page, limit)
    }
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total: u64,
    pub pages: u64,
    pub page: u32,
    pub limit: u32,
}

impl PaginationMeta {
    pub fn new(pagination: Pagination, total: u64) -> Self {
        Self {
            total,
            pages: pagination.page_count(total),
            page: pagination.page,
            limit: pagination.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent_or_zero() {
        let p = PageParams::default().resolve();
        assert_eq!((p.page, p.limit), (1, DEFAULT_PAGE_SIZE));
        let p = PageParams {
            page: Some(0),
            limit: Some(0),
        }
        .resolve();
        assert_eq!((p.page, p.limit), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn limit_is_clamped() {
        let p = PageParams {
            page: Some(3),
            limit: Some(10_000),
        }
        .resolve();
        assert_eq!((p.page, p.limit), (3, MAX_PAGE_SIZE));
    }

    #[test]
    fn meta_counts_pages() {
        let meta = PaginationMeta::new(Pagination::new(2, 10), 21);
        assert_eq!(meta.pages, 3);
        assert_eq!(meta.page, 2);
        let empty = PaginationMeta::new(Pagination::new(1, 10), 0);
        assert_eq!(empty.pages, 0);
    }
}

//! Pagination and ordering shared by every `find` implementation.

use docverify_types::Timestamp;

/// Page-based pagination (1-based page numbers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Every matching record in a single page.
    pub const ALL: Self = Self {
        page: 1,
        limit: u32::MAX,
    };

    /// A page request. `page` 0 is treated as page 1.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit,
        }
    }

    /// Number of records skipped before this page starts.
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1).saturating_mul(self.limit as usize)
    }

    /// Total number of pages needed to show `total` records.
    pub fn page_count(&self, total: u64) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        total.div_ceil(self.limit as u64)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Ordering on record creation time. Ties are broken by identifier so that
/// paging is stable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Records that can be ordered by [`SortOrder`].
pub trait Sortable {
    fn created_at(&self) -> Timestamp;
    fn sort_key(&self) -> [u8; 16];
}

/// Sort `items` and cut out the requested page.
///
/// Backends that have to scan (the in-memory store, unindexed LMDB queries)
/// collect matching records and finish the query here so that every backend
/// agrees on ordering.
pub fn sort_and_page<T: Sortable>(mut items: Vec<T>, sort: SortOrder, page: Pagination) -> Vec<T> {
    items.sort_by(|a, b| {
        let ord = a
            .created_at()
            .cmp(&b.created_at())
            .then_with(|| a.sort_key().cmp(&b.sort_key()));
        match sort {
            SortOrder::OldestFirst => ord,
            SortOrder::NewestFirst => ord.reverse(),
        }
    });
    items
        .into_iter()
        .skip(page.offset())
        .take(page.limit as usize)
        .collect()
}

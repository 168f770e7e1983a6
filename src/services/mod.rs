//! Business services. Each service owns a shared connection pool and runs
//! its multi-table writes inside a single transaction.

pub mod order_status;
pub mod orders;
pub mod sales;

const MAX_OFFSET: u64 = i64::MAX as u64;

/// One-based page request, already clamped to sane values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Pages below 1 are read as the first page; `limit` is never zero.
    /// The page is capped so that its offset still fits a signed 64-bit
    /// SQL parameter.
    pub fn new(page: Option<u64>, limit: u64) -> Self {
        let limit = limit.max(1);
        let last_page = MAX_OFFSET / limit + 1;
        Self {
            page: page.unwrap_or(1).clamp(1, last_page),
            limit,
        }
    }

    /// Zero-based page index as expected by the paginator.
    pub fn index(&self) -> u64 {
        self.page - 1
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        self.index() * self.limit
    }

    /// Whether the page starts at or past the last of `total` rows.
    pub fn is_past(&self, total: u64) -> bool {
        self.offset() >= total
    }
}

/// Number of pages needed to show `total` rows, `ceil(total / limit)`.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}

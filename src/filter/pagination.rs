use super::types::{PageRef, Pagination};

impl Pagination {
    /// `next` exists while records remain past this page; `prev` whenever
    /// this is not the first page.
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let next = (offset.saturating_add(limit) < total).then(|| PageRef { page: page + 1, limit });
        let prev = (offset > 0).then(|| PageRef { page: page - 1, limit });
        Self { total, next, prev }
    }
}

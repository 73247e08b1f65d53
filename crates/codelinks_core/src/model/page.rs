//! Pagination request/response envelopes.
//!
//! # Invariants
//! - Pages are 1-based; `page = 0` is treated as the first page.
//! - `page_size` is clamped to `1..=MAX_PAGE_SIZE`, 0 means the default.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Builds a normalized request.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }.normalized()
    }

    pub fn normalized(self) -> Self {
        let page_size = match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        Self {
            page: self.page.max(1),
            page_size,
        }
    }

    pub fn limit(&self) -> u32 {
        self.normalized().page_size
    }

    pub fn offset(&self) -> u64 {
        let normalized = self.normalized();
        u64::from(normalized.page - 1) * u64::from(normalized.page_size)
    }
}

/// One page of results plus the total matching row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let request = request.normalized();
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_items,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.page_size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
        }
    }
}

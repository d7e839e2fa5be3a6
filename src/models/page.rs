//! Pagination helper
//!
//! `Page` wraps one slice of a listing together with the numbers a listing
//! view needs to render navigation controls.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: usize, offset: usize, limit: usize) -> Self {
        Self {
            items,
            total_items,
            offset,
            limit,
        }
    }

    /// `ceil(total_items / limit)`; zero when `limit` is zero
    pub fn total_pages(&self) -> usize {
        if self.limit == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.limit)
    }

    pub fn previous_offset(&self) -> Option<usize> {
        self.offset.checked_sub(self.limit)
    }

    pub fn next_offset(&self) -> Option<usize> {
        let next = self.offset.checked_add(self.limit)?;
        (next < self.total_items).then_some(next)
    }

    /// Whether navigation controls are worth showing
    pub fn is_useful(&self) -> bool {
        self.limit < self.total_items
    }

    /// 1-based index of this page
    pub fn index(&self) -> usize {
        if self.limit == 0 {
            return 1;
        }
        self.offset / self.limit + 1
    }

    /// Inclusive 1-based display range, e.g. `"11-20"`
    pub fn range(&self) -> String {
        let start = self.offset.saturating_add(1);
        let end = self.offset.saturating_add(self.limit).min(self.total_items);
        format!("{}-{}", start, end)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_items: self.total_items,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

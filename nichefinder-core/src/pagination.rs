//! Fixed-size paging over result lists.

/// Suggestions shown per page.
pub const SUGGESTION_PAGE_SIZE: usize = 20;
/// Posts shown per page.
pub const POSTS_PER_PAGE: usize = 10;

/// Number of pages needed for `len` items; zero when `page_size` is zero.
pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Zero-based slice of `items`; empty once `page_index` reaches the page count.
pub fn page<T>(items: &[T], page_index: usize, page_size: usize) -> &[T] {
    if page_size == 0 {
        return &[];
    }
    let start = match page_index.checked_mul(page_size) {
        Some(start) if start < items.len() => start,
        _ => return &[],
    };
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

/// Current page position over a list whose length may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    index: usize,
    page_size: usize,
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            index: 0,
            page_size,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self, len: usize) -> usize {
        page_count(len, self.page_size)
    }

    pub fn current<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        page(items, self.index, self.page_size)
    }

    pub fn has_next(&self, len: usize) -> bool {
        self.index + 1 < self.page_count(len)
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    /// Moves forward; returns `false` (and stays put) on the last page.
    pub fn next(&mut self, len: usize) -> bool {
        if self.has_next(len) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.has_prev() {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Back to the first page; called whenever the upstream list changes.
    pub fn reset(&mut self) {
        self.index = 0;
    }
}

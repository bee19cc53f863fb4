//! Page arithmetic over an ordered id sequence
//!
//! Pages are 1-based. The current page is kept inside `[1, max_page]`
//! whenever the page or the item count changes. Navigation wraps at
//! both ends.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::ops::Range;

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Page size, or no paging at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSize {
    Unlimited,
    Limited(NonZeroUsize),
}

impl PageSize {
    /// `0` means unlimited.
    #[must_use]
    pub fn new(size: usize) -> Self {
        NonZeroUsize::new(size).map_or(Self::Unlimited, Self::Limited)
    }

    #[must_use]
    pub const fn get(self) -> Option<usize> {
        match self {
            Self::Unlimited => None,
            Self::Limited(n) => Some(n.get()),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Maps an item count to pages and tracks the current one.
///
/// ```
/// use imap_mailbox::{PageSize, Paginator};
///
/// let mut pages = Paginator::new(PageSize::new(50));
/// pages.set_item_count(101);
/// assert_eq!(pages.max_page(), 3);
/// assert_eq!(pages.window(), 0..50);
/// pages.last();
/// assert_eq!(pages.window(), 100..101);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    page_size: PageSize,
    page: usize,
    item_count: usize,
    refresh: bool,
}

impl Paginator {
    #[must_use]
    pub const fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            page: 1,
            item_count: 0,
            refresh: false,
        }
    }

    #[must_use]
    pub const fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Change the page size; the current page is re-clamped.
    pub fn set_page_size(&mut self, page_size: PageSize) {
        if self.page_size != page_size {
            self.page_size = page_size;
            self.set_current_page(self.page);
        }
    }

    #[must_use]
    pub const fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        self.set_current_page(self.page);
    }

    #[must_use]
    pub const fn max_page(&self) -> usize {
        match self.page_size {
            PageSize::Unlimited => 1,
            PageSize::Limited(size) => {
                let pages = self.item_count.div_ceil(size.get());
                if pages == 0 { 1 } else { pages }
            }
        }
    }

    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.page
    }

    /// Pin the current page, clamped into `[1, max_page]`. Returns the
    /// page actually pinned.
    pub fn set_current_page(&mut self, page: usize) -> usize {
        let clamped = page.clamp(1, self.max_page());
        if clamped != self.page {
            self.page = clamped;
            self.refresh = true;
        }
        self.page
    }

    /// Whether the pinned page changed since the last
    /// [`clear_refresh`](Self::clear_refresh).
    #[must_use]
    pub const fn needs_refresh(&self) -> bool {
        self.refresh
    }

    pub const fn clear_refresh(&mut self) {
        self.refresh = false;
    }

    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.page < self.max_page()
    }

    /// Move forward one page, wrapping to page 1 after the last.
    pub fn next(&mut self) -> usize {
        let target = if self.has_next_page() { self.page + 1 } else { 1 };
        self.set_current_page(target)
    }

    #[must_use]
    pub const fn has_previous_page(&self) -> bool {
        self.page > 1
    }

    /// Move back one page, wrapping to the last page before page 1.
    pub fn previous(&mut self) -> usize {
        let target = if self.has_previous_page() {
            self.page - 1
        } else {
            self.max_page()
        };
        self.set_current_page(target)
    }

    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.page == 1
    }

    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.page == self.max_page()
    }

    pub fn last(&mut self) -> usize {
        self.set_current_page(self.max_page())
    }

    pub fn first(&mut self) -> usize {
        self.set_current_page(1)
    }

    /// Index range of the current page within the ordered sequence.
    #[must_use]
    pub fn window(&self) -> Range<usize> {
        match self.page_size {
            PageSize::Unlimited => 0..self.item_count,
            PageSize::Limited(size) => {
                let start = ((self.page - 1) * size.get()).min(self.item_count);
                let end = (start + size.get()).min(self.item_count);
                start..end
            }
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PageSize::default())
    }
}

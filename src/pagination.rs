//! Pagination over list-backed collections
//!
//! Two layers:
//! - [`page_window`] maps `(page, per_page, len)` to inclusive list bounds
//!   for a most-recent-first list. It uses `len / per_page + 1` pages, so a
//!   collection whose length is an exact multiple of `per_page` gets one
//!   trailing empty page.
//! - [`Pagination`] is the view handed to the presentation layer: items,
//!   totals, neighbours and a windowed page-number iterator.

use serde::{Serialize, Serializer};

use crate::error::AppError;

/// Inclusive list bounds for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    /// First list index (0 = newest)
    pub start: u64,
    /// Last list index, inclusive
    pub stop: u64,
}

/// Number of addressable pages for a list of `len` items.
pub fn total_pages(len: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 0;
    }
    len / per_page + 1
}

/// Compute the slice bounds of `page` (1-based).
///
/// # Errors
/// `InvalidRange` when `per_page` is 0 or `page` is outside `1..=total_pages`.
pub fn page_window(page: u64, per_page: u64, len: u64) -> Result<PageWindow, AppError> {
    let pages = total_pages(len, per_page);
    if per_page == 0 || page == 0 || page > pages {
        return Err(AppError::InvalidRange { page, pages });
    }

    Ok(PageWindow {
        page,
        per_page,
        total_pages: pages,
        start: (page - 1) * per_page,
        stop: page * per_page - 1,
    })
}

// =============================================================================
// Pagination view
// =============================================================================

/// One entry of the page-number control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page(u64),
    /// Pages were skipped here
    Gap,
}

impl Serialize for PageLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageLink::Page(number) => serializer.serialize_u64(*number),
            PageLink::Gap => serializer.serialize_none(),
        }
    }
}

/// How many page numbers to show around the edges and the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLinkWindow {
    pub left_edge: u64,
    pub left_current: u64,
    pub right_current: u64,
    pub right_edge: u64,
}

impl Default for PageLinkWindow {
    fn default() -> Self {
        Self {
            left_edge: 2,
            left_current: 2,
            right_current: 5,
            right_edge: 2,
        }
    }
}

impl PageLinkWindow {
    fn shows(&self, num: u64, current: u64, pages: u64) -> bool {
        num <= self.left_edge
            || (num.saturating_add(self.left_current).saturating_add(1) > current
                && num < current.saturating_add(self.right_current))
            || num > pages.saturating_sub(self.right_edge)
    }
}

/// Iterator returned by [`Pagination::iter_pages`]
#[derive(Debug, Clone)]
pub struct PageLinks {
    window: PageLinkWindow,
    current: u64,
    pages: u64,
    next: u64,
    last: u64,
    pending: Option<u64>,
}

impl Iterator for PageLinks {
    type Item = PageLink;

    fn next(&mut self) -> Option<PageLink> {
        if let Some(num) = self.pending.take() {
            self.last = num;
            return Some(PageLink::Page(num));
        }

        while self.next <= self.pages {
            let num = self.next;
            self.next += 1;
            if !self.window.shows(num, self.current, self.pages) {
                continue;
            }
            if self.last + 1 != num {
                self.pending = Some(num);
                return Some(PageLink::Gap);
            }
            self.last = num;
            return Some(PageLink::Page(num));
        }

        None
    }
}

/// A page of items plus the numbers a UI needs to navigate
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination<T> {
    /// Current page number (1-based)
    pub page: u64,
    pub per_page: u64,
    /// Total number of items in the collection
    pub total: u64,
    /// `ceil(total / per_page)`, 0 when `per_page` is 0
    pub pages: u64,
    pub items: Vec<T>,
}

impl<T> Pagination<T> {
    pub fn new(page: u64, per_page: u64, total: u64, items: Vec<T>) -> Self {
        let pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };

        Self {
            page,
            per_page,
            total,
            pages,
            items,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.pages > self.page
    }

    pub fn prev_num(&self) -> Option<u64> {
        self.has_prev().then(|| self.page - 1)
    }

    pub fn next_num(&self) -> Option<u64> {
        self.has_next().then(|| self.page + 1)
    }

    /// Page numbers for a UI control, with [`PageLink::Gap`] where the
    /// sequence is discontiguous.
    pub fn iter_pages(&self, window: PageLinkWindow) -> PageLinks {
        PageLinks {
            window,
            current: self.page,
            pages: self.pages,
            next: 1,
            last: 0,
            pending: None,
        }
    }

    /// Convert the items, keeping the counters.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Pagination<U> {
        Pagination {
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages_of(len: u64, per_page: u64) -> Vec<Vec<u64>> {
        let collection: Vec<u64> = (0..len).collect();
        (1..=total_pages(len, per_page))
            .map(|page| {
                let window = page_window(page, per_page, len).unwrap();
                collection
                    .iter()
                    .copied()
                    .skip(window.start as usize)
                    .take((window.stop - window.start + 1) as usize)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn page_bounds_are_inclusive() {
        let window = page_window(2, 10, 35).unwrap();
        assert_eq!((window.start, window.stop), (10, 19));
        assert_eq!(window.total_pages, 4);
    }

    #[test]
    fn concatenated_pages_cover_collection_once() {
        for (len, per_page) in [(0, 10), (7, 3), (9, 3), (25, 10), (1, 1), (50, 50)] {
            let pages = pages_of(len, per_page);
            assert!(pages.iter().all(|page| page.len() as u64 <= per_page));

            let flat: Vec<u64> = pages.iter().flatten().copied().collect();
            assert_eq!(flat, (0..len).collect::<Vec<_>>(), "len={len} per_page={per_page}");

            // Exact multiples keep a trailing empty page.
            let trailing_empty = pages.last().is_some_and(Vec::is_empty);
            assert_eq!(trailing_empty, len % per_page == 0, "len={len} per_page={per_page}");
        }
    }

    #[test]
    fn out_of_range_pages_are_rejected() {
        assert!(matches!(
            page_window(0, 10, 5),
            Err(AppError::InvalidRange { page: 0, pages: 1 })
        ));
        assert!(matches!(
            page_window(3, 10, 15),
            Err(AppError::InvalidRange { page: 3, pages: 2 })
        ));
        assert!(matches!(
            page_window(1, 0, 15),
            Err(AppError::InvalidRange { pages: 0, .. })
        ));
        // Empty collection still has page 1.
        assert!(page_window(1, 10, 0).is_ok());
    }

    #[test]
    fn view_counts_use_ceiling() {
        let view = Pagination::new(2, 10, 30, vec!["a"; 10]);
        assert_eq!(view.pages, 3);
        assert!(view.has_prev());
        assert!(view.has_next());
        assert_eq!(view.prev_num(), Some(1));
        assert_eq!(view.next_num(), Some(3));

        let last = Pagination::new(3, 10, 30, vec!["a"; 10]);
        assert!(!last.has_next());
        assert_eq!(last.next_num(), None);

        let first = Pagination::<u8>::new(1, 10, 0, Vec::new());
        assert_eq!(first.pages, 0);
        assert_eq!(first.prev_num(), None);
        assert_eq!(first.next_num(), None);

        assert_eq!(Pagination::<u8>::new(1, 0, 30, Vec::new()).pages, 0);
    }

    #[test]
    fn iter_pages_windows_around_current_page() {
        use PageLink::{Gap, Page};

        let view = Pagination::<u8>::new(10, 1, 20, Vec::new());
        let links: Vec<PageLink> = view.iter_pages(PageLinkWindow::default()).collect();
        let mut expected = vec![Page(1), Page(2), Gap];
        expected.extend((8..=14).map(Page));
        expected.extend([Gap, Page(19), Page(20)]);
        assert_eq!(links, expected);
    }

    #[test]
    fn iter_pages_without_gaps_for_short_collections() {
        let view = Pagination::<u8>::new(1, 10, 45, Vec::new());
        let links: Vec<PageLink> = view.iter_pages(PageLinkWindow::default()).collect();
        assert_eq!(links, (1..=5).map(PageLink::Page).collect::<Vec<_>>());
    }

    #[test]
    fn iter_pages_past_the_end_shows_only_the_edges() {
        use PageLink::{Gap, Page};

        let expected = vec![Page(1), Page(2), Gap, Page(9), Page(10)];
        for page in [u64::MAX, 1 << 63, 11] {
            let view = Pagination::<u8>::new(page, 10, 100, Vec::new());
            let links: Vec<PageLink> = view.iter_pages(PageLinkWindow::default()).collect();
            assert_eq!(links, expected, "page {page}");
        }
    }

    #[test]
    fn page_links_serialize_gaps_as_null() {
        let json = serde_json::to_string(&[PageLink::Page(1), PageLink::Gap, PageLink::Page(9)])
            .unwrap();
        assert_eq!(json, "[1,null,9]");
    }

    #[test]
    fn map_keeps_counters() {
        let view = Pagination::new(1, 2, 5, vec![1, 2]).map(|n| n * 10);
        assert_eq!(view.items, vec![10, 20]);
        assert_eq!(view.pages, 3);
    }
}

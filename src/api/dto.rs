//! API request and response DTOs

use serde::{Deserialize, Serialize};

use crate::pagination::{PageLink, PageLinkWindow, Pagination};

/// `?page=N` query, 1-based
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
}

impl PageParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }
}

/// A page of items with everything a client needs to navigate
#[derive(Debug, Clone, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<u64>,
    pub next_num: Option<u64>,
    /// Page numbers to render; `null` marks a gap
    pub page_links: Vec<PageLink>,
}

impl<T> From<Pagination<T>> for PageResponse<T> {
    fn from(pagination: Pagination<T>) -> Self {
        let page_links = pagination.iter_pages(PageLinkWindow::default()).collect();
        Self {
            page: pagination.page,
            per_page: pagination.per_page,
            total: pagination.total,
            pages: pagination.pages,
            has_prev: pagination.has_prev(),
            has_next: pagination.has_next(),
            prev_num: pagination.prev_num(),
            next_num: pagination.next_num(),
            page_links,
            items: pagination.items,
        }
    }
}

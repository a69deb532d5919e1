//! Page-number pagination.
//!
//! Pages are 1-based. Asking for a page past the end is not an error: the
//! page is simply empty. Links to the previous/next page are only produced
//! when that page holds items.

use serde::Serialize;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    per_page: i64,
}

impl PageRequest {
    /// `page` below 1 is read as 1; `per_page` below 1 as 1.
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One slice of an ordered collection plus the size of the whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub request: PageRequest,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            request,
            total,
        }
    }

    /// Number of non-empty pages.
    pub fn pages(&self) -> i64 {
        if self.total <= 0 {
            return 0;
        }
        let per_page = self.request.per_page;
        self.total / per_page + i64::from(self.total % per_page != 0)
    }

    pub fn prev_page(&self) -> Option<i64> {
        let prev = self.request.page - 1;
        (prev >= 1 && prev <= self.pages()).then_some(prev)
    }

    pub fn next_page(&self) -> Option<i64> {
        self.request
            .page
            .checked_add(1)
            .filter(|next| *next <= self.pages())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            request: self.request,
            total: self.total,
        }
    }

    /// Envelope with links built against `route`.
    pub fn into_paginated(self, route: &str) -> Paginated<T> {
        let prev = self.prev_page().map(|page| page_link(route, page));
        let next = self.next_page().map(|page| page_link(route, page));
        Paginated {
            items: self.items,
            prev,
            next,
            count: self.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub count: i64,
}

/// Slices an in-memory, already ordered collection.
pub fn paginate<T>(collection: Vec<T>, page: i64, per_page: i64, route: &str) -> Paginated<T> {
    let request = PageRequest::new(page, per_page);
    let total = collection.len() as i64;
    let items = collection
        .into_iter()
        .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(request.limit()).unwrap_or(usize::MAX))
        .collect();
    Page::new(items, request, total).into_paginated(route)
}

fn page_link(route: &str, page: i64) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("page", &page.to_string())
        .finish();
    let separator = if route.contains('?') { '&' } else { '?' };
    format!("{}{}{}", route, separator, query)
}

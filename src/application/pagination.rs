//! Page-number pagination helpers.
//!
//! Listings are addressed by `?page=N`. Invalid or missing numbers resolve to
//! the first page and numbers past the end clamp to the last page, so every
//! request yields a renderable page.

use serde::Serialize;

/// Fixed size of every public post listing.
pub const POSTS_PER_PAGE: u32 = 10;

/// A requested page before it is resolved against the total row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: u32,
    per_page: u32,
}

impl PageRequest {
    pub fn new(number: u32, per_page: u32) -> Self {
        Self {
            number: number.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn first(per_page: u32) -> Self {
        Self::new(1, per_page)
    }

    /// Interpret a raw `page` query value; anything unparsable means page one.
    pub fn from_query(raw: Option<&str>, per_page: u32) -> Self {
        let number = raw
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(1);
        Self::new(number, per_page)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Clamp against `total` rows and compute the slice to fetch.
    pub fn resolve(&self, total: u64) -> PageWindow {
        let per_page = u64::from(self.per_page);
        let num_pages = u32::try_from(total.div_ceil(per_page).max(1)).unwrap_or(u32::MAX);
        PageWindow {
            number: self.number.min(num_pages),
            num_pages,
            per_page: self.per_page,
            total,
        }
    }
}

/// A resolved page: which rows to fetch and how it sits among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total: u64,
}

impl PageWindow {
    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn with_items<T>(self, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}

/// One page of results plus the navigation facts templates need.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
}

impl<T> Paginated<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_number(&self) -> u32 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_number(&self) -> u32 {
        (self.number + 1).min(self.num_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirteen_rows_split_ten_and_three() {
        let first = PageRequest::first(POSTS_PER_PAGE).resolve(13);
        assert_eq!((first.offset(), first.limit()), (0, 10));
        assert_eq!(first.num_pages, 2);

        let second = PageRequest::new(2, POSTS_PER_PAGE).resolve(13);
        assert_eq!(second.offset(), 10);
        assert_eq!(second.number, 2);
    }

    #[test]
    fn invalid_query_means_first_page() {
        assert_eq!(PageRequest::from_query(Some("abc"), 10).number(), 1);
        assert_eq!(PageRequest::from_query(Some("0"), 10).number(), 1);
        assert_eq!(PageRequest::from_query(None, 10).number(), 1);
        assert_eq!(PageRequest::from_query(Some(" 3 "), 10).number(), 3);
    }

    #[test]
    fn page_past_the_end_clamps_to_last() {
        let window = PageRequest::new(99, 10).resolve(25);
        assert_eq!(window.number, 3);
        assert_eq!(window.offset(), 20);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let page = PageRequest::new(4, 10).resolve(0).with_items(Vec::<u8>::new());
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn navigation_flags() {
        let page = PageRequest::new(2, 10).resolve(30).with_items(vec![()]);
        assert!(page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.previous_number(), 1);
        assert_eq!(page.next_number(), 3);
    }
}

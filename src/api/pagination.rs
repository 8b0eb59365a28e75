//! Purpose: Generic list/table pagination helper.
//! Exports: `Page`, `PageQuery`, `Paginator`, `DEFAULT_PAGE_SIZE`, `LIST_CACHE_TTL`.
//! Role: Shared `{count, results}` shape and offset bookkeeping for list endpoints.
//! Invariants: A paginator never yields a query past the reported total.
//! Invariants: An empty page always ends iteration, even if `count` disagrees.
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Cache window for list reads; mutations clear the matching path prefix.
pub const LIST_CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    pub limit: u32,
    pub offset: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl PageQuery {
    pub fn new(limit: u32, offset: u64) -> Self {
        Self {
            limit: limit.max(1),
            offset,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Paginator {
    limit: u32,
    offset: u64,
    total: Option<u64>,
    done: bool,
}

impl Paginator {
    pub fn new(limit: u32) -> Self {
        Self::starting_at(PageQuery::new(limit, 0))
    }

    pub fn starting_at(query: PageQuery) -> Self {
        Self {
            limit: query.limit.max(1),
            offset: query.offset,
            total: None,
            done: false,
        }
    }

    pub fn next_query(&self) -> Option<PageQuery> {
        if self.done {
            return None;
        }
        Some(PageQuery {
            limit: self.limit,
            offset: self.offset,
        })
    }

    pub fn advance<T>(&mut self, page: &Page<T>) {
        self.total = Some(page.count);
        self.offset += page.results.len() as u64;
        if page.results.is_empty() || self.offset >= page.count {
            self.done = true;
        }
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

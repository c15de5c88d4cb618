// handlers/protected/utils.rs - shared pagination and parsing helpers

use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    /// Resolve page/limit against configured defaults and caps.
    /// Returns (limit, offset, page), 1-indexed pages.
    pub fn resolve(&self) -> (i64, i64, u32) {
        let api = &config::config().api;
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .map(i64::from)
            .unwrap_or(api.default_page_size)
            .clamp(1, api.max_page_size);
        let offset = (page as i64 - 1) * limit;
        (limit, offset, page)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, limit: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
        Self { items, total, page, limit, total_pages }
    }
}

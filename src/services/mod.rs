// Catalog and stock
pub mod alerts;
pub mod batches;
pub mod products;

// Customers and compliance
pub mod compliance;
pub mod customers;

// Sales and billing
pub mod invoices;
pub mod orders;

// Reporting
pub mod reports;

// Administration
pub mod audit;
pub mod features;
pub mod users;
pub mod webhooks;

use crate::errors::ServiceError;
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            items,
            total,
            page,
            limit,
            pages,
        }
    }
}

/// Normalized paging window (page is 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, limit: u64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.max(1),
        }
    }

    /// Zero-based page index as sea-orm paginators expect it.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

/// Maps a unique-index violation to a 409 with `message`; everything else stays a database error.
pub(crate) fn unique_violation(err: DbErr, message: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(message.to_string()),
        _ => ServiceError::DatabaseError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(Page::<()>::new(vec![], 0, 1, 50).pages, 0);
        assert_eq!(Page::<()>::new(vec![], 50, 1, 50).pages, 1);
        assert_eq!(Page::<()>::new(vec![], 51, 1, 50).pages, 2);
    }

    #[test]
    fn page_request_is_one_based() {
        let req = PageRequest::new(Some(0), 0);
        assert_eq!(req, PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), 20).index(), 2);
    }
}

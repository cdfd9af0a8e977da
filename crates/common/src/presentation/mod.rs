//! Table views of the list queries
//!
//! A `Column` pairs a key and header with a render function. A `TableView` is
//! a page of rows rendered to strings, plus the paging numbers a table footer
//! needs.

mod columns;
pub mod format;

pub use format::{format_currency, format_date, format_duration};

use crate::queries::{ListParams, Page};
use serde::Serialize;

/// One column of a list view
pub struct Column<T> {
    pub key: &'static str,
    pub header: &'static str,
    pub render: fn(&T) -> String,
}

impl<T> Column<T> {
    pub fn new(key: &'static str, header: &'static str, render: fn(&T) -> String) -> Self {
        Self { key, header, render }
    }
}

/// Row types that have a table view
pub trait Tabular: Sized {
    fn columns() -> Vec<Column<Self>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnHeader {
    pub key: &'static str,
    pub header: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<Vec<String>>,
    pub total: u64,
    pub page: u32,
    pub page_count: u64,
}

impl TableView {
    pub fn render<T>(columns: &[Column<T>], page: &Page<T>, params: &ListParams) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|c| ColumnHeader {
                    key: c.key,
                    header: c.header,
                })
                .collect(),
            rows: page
                .rows
                .iter()
                .map(|row| columns.iter().map(|c| (c.render)(row)).collect())
                .collect(),
            total: page.total,
            page: params.page,
            page_count: page_count(page.total, params.page_size),
        }
    }

    /// Render with the row type's own columns
    pub fn of<T: Tabular>(page: &Page<T>, params: &ListParams) -> Self {
        Self::render(&T::columns(), page, params)
    }
}

/// Pages needed for `total` rows; an empty result still has one page
pub fn page_count(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1))).max(1)
}

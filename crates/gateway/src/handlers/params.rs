//! Query-string parameters of the list endpoints
//!
//! Multi-valued filters are comma separated (`status=active,trialing`).
//! `format=table` switches the response to a rendered table view.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use vocalscale_common::{
    errors::{AppError, Result},
    presentation::{Tabular, TableView},
    queries::{CallsFilter, ListParams, Page, ReviewsFilter, DEFAULT_PAGE_SIZE},
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,

    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,

    pub status: Option<String>,

    pub search: Option<String>,

    pub category: Option<String>,

    pub rating: Option<String>,

    pub source: Option<String>,

    pub format: Option<String>,
}

/// Non-empty, trimmed items of a comma separated value
pub fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

impl ListQuery {
    pub fn list_params(&self) -> ListParams {
        ListParams {
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            status: split_csv(self.status.as_deref()),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }

    pub fn calls_filter(&self) -> CallsFilter {
        CallsFilter {
            list: self.list_params(),
            category: split_csv(self.category.as_deref()),
        }
    }

    pub fn reviews_filter(&self) -> Result<ReviewsFilter> {
        let rating = split_csv(self.rating.as_deref())
            .iter()
            .map(|r| {
                r.parse::<i32>().map_err(|_| AppError::Validation {
                    message: format!("rating must be a number, got {}", r),
                    field: Some("rating".to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ReviewsFilter {
            list: self.list_params(),
            rating,
            source: split_csv(self.source.as_deref()),
        })
    }

    pub fn wants_table(&self) -> bool {
        self.format.as_deref() == Some("table")
    }
}

/// The page as JSON, or its table view when asked for
pub fn page_response<T: Serialize + Tabular>(
    page: Page<T>,
    params: &ListParams,
    table: bool,
) -> Response {
    if table {
        Json(TableView::of(&page, params)).into_response()
    } else {
        Json(page).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_csv() {
        assert_eq!(split_csv(Some("active, trialing,,")), vec!["active", "trialing"]);
        assert!(split_csv(None).is_empty());
        assert!(split_csv(Some(" ")).is_empty());
    }

    #[test]
    fn test_defaults_and_blank_search() {
        let query = ListQuery {
            search: Some("   ".into()),
            ..ListQuery::default()
        };
        let params = query.list_params();
        assert_eq!(params, ListParams::default());
    }

    #[test]
    fn test_rating_must_be_numeric() {
        let query = ListQuery {
            rating: Some("5,four".into()),
            ..ListQuery::default()
        };
        assert!(matches!(query.reviews_filter(), Err(AppError::Validation { .. })));

        let query = ListQuery {
            rating: Some("4,5".into()),
            ..ListQuery::default()
        };
        assert_eq!(query.reviews_filter().unwrap().rating, vec![4, 5]);
    }
}

//! Read operations behind the admin views
//!
//! Every read is a plain async function over `&dyn DataStore`. `AdminQueries`
//! wraps them with the result cache and the staleness window of each view.

mod dashboard;
mod lists;
mod users;

pub use dashboard::{calls_chart, dashboard_stats, percent_change, recent_calls};
pub use lists::{
    knowledge_documents, list_businesses, list_calls, list_plans, list_reviews,
    list_subscriptions,
};
pub use users::{list_users, user_detail, RECENT_CALLS_CAP, RECENT_INVOICES_CAP};

use crate::cache::{keys, QueryCache, QueryKey};
use crate::config::CacheConfig;
use crate::errors::{AppError, Result};
use crate::models::{
    BusinessRecord, CallRecord, DashboardStats, KnowledgeDocument, MonthlyTotal, PlanRecord,
    ReviewRow, SubscriptionRow, UserDetail, UserSummary,
};
use crate::store::{DataStore, Query, StoreResponse};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use validator::{Validate, ValidationError};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page, categorical filter and free-text search of a list view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ListParams {
    /// 1-based
    #[validate(range(min = 1))]
    pub page: u32,

    #[validate(range(min = 1, max = 100))]
    pub page_size: u32,

    /// Allowed values of the view's status column; empty means any
    pub status: Vec<String>,

    pub search: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            status: Vec::new(),
            search: None,
        }
    }
}

impl ListParams {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Self::default()
        }
    }

    pub fn with_status<S: Into<String>>(mut self, status: impl IntoIterator<Item = S>) -> Self {
        self.status = status.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Inclusive row window `[offset, offset + page_size - 1]`
    pub fn window(&self) -> (u64, u64) {
        let offset = self.offset();
        (offset, offset + u64::from(self.page_size).saturating_sub(1))
    }

    pub fn search_term(&self) -> &str {
        self.search.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Apply window and exact count to a list query
    pub(crate) fn apply(&self, query: Query) -> Query {
        let (from, to) = self.window();
        query.range(from, to).count_exact()
    }
}

/// Call list filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CallsFilter {
    #[serde(flatten)]
    #[validate(nested)]
    pub list: ListParams,

    pub category: Vec<String>,
}

fn validate_ratings(ratings: &[i32]) -> std::result::Result<(), ValidationError> {
    if ratings.iter().all(|r| (1..=5).contains(r)) {
        Ok(())
    } else {
        Err(ValidationError::new("rating_out_of_range"))
    }
}

/// Review list filter
///
/// Reviews have no status column; `list.status` is not used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReviewsFilter {
    #[serde(flatten)]
    #[validate(nested)]
    pub list: ListParams,

    #[validate(custom(function = "validate_ratings"))]
    pub rating: Vec<i32>,

    pub source: Vec<String>,
}

/// One page of a list view plus the total matching the filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            rows: self.rows.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

impl<T: DeserializeOwned> Page<T> {
    pub(crate) fn decode(response: StoreResponse) -> Result<Self> {
        let total = response.count.unwrap_or(0);
        Ok(Self {
            rows: response.decode()?,
            total,
        })
    }
}

/// Cached read surface of the dashboard
#[derive(Clone)]
pub struct AdminQueries {
    store: Arc<dyn DataStore>,
    cache: QueryCache,
    staleness: CacheConfig,
}

impl AdminQueries {
    pub fn new(store: Arc<dyn DataStore>, cache: QueryCache, staleness: CacheConfig) -> Self {
        Self {
            store,
            cache,
            staleness,
        }
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn cached<T, F, Fut>(&self, key: QueryKey, stale_after: Duration, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(Arc<dyn DataStore>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.cache
            .fetch_as(&key, stale_after, move || load(store))
            .await
    }

    pub async fn list_users(&self, params: ListParams) -> Result<Page<UserSummary>> {
        params.validate()?;
        let key = keys::list(keys::USERS, &params)?;
        self.cached(key, self.staleness.list(), move |store| async move {
            list_users(store.as_ref(), &params).await
        })
        .await
    }

    pub async fn user_detail(&self, user_id: &str) -> Result<UserDetail> {
        let user_id = user_id.to_string();
        let key = keys::user_detail(&user_id);
        self.cached(key, self.staleness.list(), move |store| async move {
            user_detail(store.as_ref(), &user_id).await
        })
        .await
    }

    pub async fn list_businesses(&self, params: ListParams) -> Result<Page<BusinessRecord>> {
        params.validate()?;
        let key = keys::list(keys::BUSINESSES, &params)?;
        self.cached(key, self.staleness.list(), move |store| async move {
            list_businesses(store.as_ref(), &params).await
        })
        .await
    }

    pub async fn list_calls(&self, filter: CallsFilter) -> Result<Page<CallRecord>> {
        filter.validate()?;
        let key = keys::list(keys::CALLS, &filter)?;
        self.cached(key, self.staleness.list(), move |store| async move {
            list_calls(store.as_ref(), &filter).await
        })
        .await
    }

    pub async fn list_reviews(&self, filter: ReviewsFilter) -> Result<Page<ReviewRow>> {
        filter.validate()?;
        let key = keys::list(keys::REVIEWS, &filter)?;
        self.cached(key, self.staleness.list(), move |store| async move {
            list_reviews(store.as_ref(), &filter).await
        })
        .await
    }

    pub async fn list_subscriptions(&self, params: ListParams) -> Result<Page<SubscriptionRow>> {
        params.validate()?;
        let key = keys::list(keys::SUBSCRIPTIONS, &params)?;
        self.cached(key, self.staleness.list(), move |store| async move {
            list_subscriptions(store.as_ref(), &params).await
        })
        .await
    }

    pub async fn list_plans(&self) -> Result<Vec<PlanRecord>> {
        self.cached(keys::plans(), self.staleness.catalog(), |store| async move {
            list_plans(store.as_ref()).await
        })
        .await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.cached(keys::dashboard_stats(), self.staleness.stats(), |store| async move {
            dashboard_stats(store.as_ref(), Utc::now()).await
        })
        .await
    }

    pub async fn calls_chart(&self) -> Result<Vec<MonthlyTotal>> {
        let now = Utc::now();
        let key = keys::calls_chart(&now.format("%Y-%m").to_string());
        self.cached(key, self.staleness.chart(), move |store| async move {
            calls_chart(store.as_ref(), now).await
        })
        .await
    }

    pub async fn recent_calls(&self) -> Result<Vec<CallRecord>> {
        self.cached(keys::recent_calls(), self.staleness.list(), |store| async move {
            recent_calls(store.as_ref()).await
        })
        .await
    }

    pub async fn knowledge_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        self.cached(
            keys::knowledge_documents(),
            self.staleness.catalog(),
            |store| async move { Ok::<_, AppError>(knowledge_documents(store.as_ref()).await) },
        )
        .await
    }
}

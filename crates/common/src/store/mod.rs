//! Hosted data store access
//!
//! Provides:
//! - A `Query` value describing select/filter/order/range reads
//! - The `DataStore` trait the query layer and support proxy code against
//! - A PostgREST-style REST adapter and an in-memory adapter

mod memory;
mod postgrest;
mod query;

pub use memory::{Cardinality, InMemoryStore, Relation};
pub use postgrest::PostgrestStore;
pub use query::{parse_content_range, Embed, Filter, Order, Query};

use crate::auth::Credentials;
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Table names of the hosted store
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const BUSINESSES: &str = "businesses";
    pub const CALLS: &str = "calls";
    pub const REVIEWS: &str = "reviews";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const PLANS: &str = "plans";
    pub const INVOICES: &str = "invoices";
    pub const SUPPORT_TICKETS: &str = "support_tickets";
    pub const SUPPORT_MESSAGES: &str = "support_messages";
    pub const KNOWLEDGE_DOCUMENTS: &str = "knowledge_documents";

    pub const ALL: [&str; 10] = [
        PROFILES,
        BUSINESSES,
        CALLS,
        REVIEWS,
        SUBSCRIPTIONS,
        PLANS,
        INVOICES,
        SUPPORT_TICKETS,
        SUPPORT_MESSAGES,
        KNOWLEDGE_DOCUMENTS,
    ];
}

/// Rows returned for a select, plus the exact count when it was requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreResponse {
    pub rows: Vec<Value>,
    pub count: Option<u64>,
}

impl StoreResponse {
    /// Decode every row into `T`
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<Vec<T>> {
        self.rows
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .collect()
    }
}

/// Row-level access to the hosted store
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Run a read
    async fn select(&self, query: &Query) -> Result<StoreResponse>;

    /// Insert one row and return it as stored
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Merge `patch` into every row matching `filters`; returns rows affected
    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<u64>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;

    /// A handle acting under other credentials (for example a session token)
    fn with_credentials(&self, credentials: &Credentials) -> Arc<dyn DataStore>;

    /// Adapter name for logs
    fn name(&self) -> &'static str;
}

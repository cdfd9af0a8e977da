//! REST adapter for a PostgREST-style hosted store

use super::query::{parse_content_range, Filter, Query};
use super::{DataStore, StoreResponse};
use crate::auth::Credentials;
use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Error body returned by the store
#[derive(Debug, Deserialize)]
struct StoreErrorBody {
    message: Option<String>,
    code: Option<String>,
    hint: Option<String>,
}

/// REST client for the hosted store
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    rest_url: String,
    api_key: Option<String>,
    credentials: Option<Credentials>,
}

impl PostgrestStore {
    /// Create a client acting under the service credential
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            api_key: config.service_key.clone(),
            credentials: config.service_key.clone().map(Credentials::Service),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        if let Some(key) = self.api_key.as_deref().and_then(|k| HeaderValue::from_str(k).ok()) {
            headers.insert("apikey", key);
        }
        if let Some(bearer) = self
            .credentials
            .as_ref()
            .and_then(|c| HeaderValue::from_str(&format!("Bearer {}", c.bearer())).ok())
        {
            headers.insert("authorization", bearer);
        }

        self.client.request(method, self.table_url(table)).headers(headers)
    }

    async fn send(&self, table: &str, request: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let outcome = request.send().await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                metrics::record_store_query(table, elapsed, false);
                return Err(AppError::upstream("store", e.to_string()));
            }
        };

        if response.status().is_success() {
            metrics::record_store_query(table, elapsed, true);
            return Ok(response);
        }

        metrics::record_store_query(table, elapsed, false);
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::query(store_error_message(status.as_u16(), &body)))
    }
}

/// Turn an error response into the store's own message
fn store_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<StoreErrorBody>(body) {
        Ok(StoreErrorBody {
            message: Some(message),
            code,
            hint,
        }) => {
            let mut out = message;
            if let Some(code) = code {
                out = format!("{} ({})", out, code);
            }
            if let Some(hint) = hint {
                out = format!("{}; hint: {}", out, hint);
            }
            out
        }
        _ if body.is_empty() => format!("HTTP {}", status),
        _ => format!("HTTP {}: {}", status, body),
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    let mut query = Query::from("");
    query.filters = filters.to_vec();
    query
        .to_params()
        .into_iter()
        .filter(|(key, _)| key != "select")
        .collect()
}

#[async_trait]
impl DataStore for PostgrestStore {
    async fn select(&self, query: &Query) -> Result<StoreResponse> {
        let method = if query.head { Method::HEAD } else { Method::GET };
        let mut request = self.request(method, &query.table).query(&query.to_params());
        if query.count {
            request = request.header("prefer", "count=exact");
        }

        debug!(table = %query.table, select = %query.select_param(), "Store select");
        let response = self.send(&query.table, request).await?;

        let count = if query.count {
            response
                .headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range)
        } else {
            None
        };

        let rows = if query.head {
            Vec::new()
        } else {
            response.json::<Vec<Value>>().await?
        };

        Ok(StoreResponse { rows, count })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let request = self
            .request(Method::POST, table)
            .header("prefer", "return=representation")
            .json(&row);

        let response = self.send(table, request).await?;
        let mut rows = response.json::<Vec<Value>>().await?;
        if rows.is_empty() {
            return Err(AppError::query(format!("insert into {} returned no row", table)));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<u64> {
        let request = self
            .request(Method::PATCH, table)
            .query(&filter_params(filters))
            .header("prefer", "return=representation")
            .json(&patch);

        let response = self.send(table, request).await?;
        let rows = response.json::<Vec<Value>>().await?;
        Ok(rows.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        let request = self.client.get(format!("{}/", self.rest_url));
        let request = match self.api_key.as_deref() {
            Some(key) => request.header("apikey", key),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream("store", e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::upstream("store", format!("HTTP {}", response.status())))
        }
    }

    fn with_credentials(&self, credentials: &Credentials) -> Arc<dyn DataStore> {
        let mut scoped = self.clone();
        scoped.credentials = Some(credentials.clone());
        Arc::new(scoped)
    }

    fn name(&self) -> &'static str {
        "postgrest"
    }
}

//! Knowledge processor client
//!
//! Draft generation, admin actions and document search go through the API
//! gateway in front of the processor. Health and metrics are probed on the
//! processor directly with a short timeout.

use crate::config::ProcessorConfig;
use crate::errors::{AppError, Result};
use crate::metrics::record_processor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const SERVICE: &str = "knowledge-processor";

/// One turn of a ticket conversation as the processor expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Body of `POST /admin/draft`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub ticket_id: String,
    pub user_id: String,
    pub history: Vec<HistoryEntry>,
    pub user_metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_data: Option<Value>,
}

/// A suggested reply awaiting human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub draft: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<Value>,
}

/// `GET /health` of the processor, or a synthesized status when it could not be read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub components: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ProcessorHealth {
    pub fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            components: Map::new(),
            version: None,
        }
    }

    pub fn unhealthy() -> Self {
        Self::with_status("unhealthy")
    }

    pub fn unreachable() -> Self {
        Self::with_status("unreachable")
    }
}

/// Counters reported by the processor's `GET /metrics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorMetrics {
    #[serde(default)]
    pub chat_requests_total: u64,
    #[serde(default)]
    pub chat_success_total: u64,
    #[serde(default)]
    pub chat_errors_total: u64,
    #[serde(default)]
    pub rate_limit_exceeded: u64,
    #[serde(default)]
    pub llm_requests_total: u64,
    /// Anything else the processor reports
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The external retrieval-augmented support service
///
/// `token` is the caller's session token; when absent the request is sent
/// without an `Authorization` header.
#[async_trait]
pub trait KnowledgeProcessor: Send + Sync {
    async fn draft(&self, request: &DraftRequest, token: Option<&str>) -> Result<Draft>;

    async fn execute(&self, action: &str, params: Value, token: Option<&str>) -> Result<Value>;

    async fn search(&self, query: &str, limit: u32, token: Option<&str>) -> Result<SearchResults>;

    /// A non-2xx answer is `Ok(unhealthy)`; an error means the processor was not reached
    async fn health(&self) -> Result<ProcessorHealth>;

    async fn metrics(&self) -> Result<ProcessorMetrics>;
}

/// reqwest-backed processor client
pub struct HttpKnowledgeProcessor {
    client: reqwest::Client,
    gateway_url: String,
    processor_url: String,
    probe_timeout: Duration,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl HttpKnowledgeProcessor {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create processor HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            processor_url: config.processor_url.trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_millis(config.health_timeout_ms),
        })
    }

    /// POST a JSON body through the gateway and decode the JSON answer
    async fn post<B, T>(&self, endpoint: &str, body: &B, token: Option<&str>) -> Result<T>
    where
        B: Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.gateway_url, endpoint);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let start = Instant::now();
        let result = self.exchange(request).await;
        record_processor(endpoint, start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn exchange<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(SERVICE, error_message(status.as_u16(), &body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("invalid response: {}", e)))
    }

    async fn probe(&self, path: &str) -> Result<reqwest::Response> {
        let start = Instant::now();
        let result = self
            .client
            .get(format!("{}{}", self.processor_url, path))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("unreachable: {}", e)));
        record_processor(
            path,
            start.elapsed().as_secs_f64(),
            result.as_ref().map(|r| r.status().is_success()).unwrap_or(false),
        );
        result
    }
}

/// The `error` field of a JSON error body, else the HTTP status
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[async_trait]
impl KnowledgeProcessor for HttpKnowledgeProcessor {
    async fn draft(&self, request: &DraftRequest, token: Option<&str>) -> Result<Draft> {
        self.post("/admin/draft", request, token).await
    }

    async fn execute(&self, action: &str, params: Value, token: Option<&str>) -> Result<Value> {
        let body = json!({ "action": action, "params": params });
        self.post("/admin/execute", &body, token).await
    }

    async fn search(&self, query: &str, limit: u32, token: Option<&str>) -> Result<SearchResults> {
        let body = json!({ "query": query, "limit": limit });
        self.post("/search", &body, token).await
    }

    async fn health(&self) -> Result<ProcessorHealth> {
        let response = self.probe("/health").await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Processor health probe not OK");
            return Ok(ProcessorHealth::unhealthy());
        }
        response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("invalid health body: {}", e)))
    }

    async fn metrics(&self) -> Result<ProcessorMetrics> {
        let response = self.probe("/metrics").await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream(SERVICE, format!("HTTP {}", status.as_u16())));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("invalid metrics body: {}", e)))
    }
}

/// How a [`MockKnowledgeProcessor`] answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Healthy,
    /// Every call gets a non-2xx answer
    Failing,
    /// The processor cannot be reached
    Unreachable,
}

/// Scripted processor for tests and local runs
pub struct MockKnowledgeProcessor {
    behavior: MockBehavior,
    calls: AtomicUsize,
    drafts: Mutex<Vec<DraftRequest>>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl MockKnowledgeProcessor {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            drafts: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::new(MockBehavior::Healthy)
    }

    /// Calls received so far, probes included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn draft_requests(&self) -> Vec<DraftRequest> {
        self.drafts.lock().await.clone()
    }

    /// Session tokens seen on draft, execute and search calls
    pub async fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().await.clone()
    }

    async fn answer(&self, token: Option<&str>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().await.push(token.map(String::from));
        self.outcome()
    }

    fn outcome(&self) -> Result<()> {
        match self.behavior {
            MockBehavior::Healthy => Ok(()),
            MockBehavior::Failing => Err(AppError::upstream(SERVICE, "HTTP 503")),
            MockBehavior::Unreachable => Err(AppError::upstream(SERVICE, "connection refused")),
        }
    }
}

impl Default for MockKnowledgeProcessor {
    fn default() -> Self {
        Self::healthy()
    }
}

#[async_trait]
impl KnowledgeProcessor for MockKnowledgeProcessor {
    async fn draft(&self, request: &DraftRequest, token: Option<&str>) -> Result<Draft> {
        self.drafts.lock().await.push(request.clone());
        self.answer(token).await?;

        let last = request
            .history
            .last()
            .map(|entry| entry.content.as_str())
            .unwrap_or_default();
        Ok(Draft {
            draft: format!("Thanks for reaching out. Regarding \"{}\": we are on it.", last),
            confidence: Some(0.87),
        })
    }

    async fn execute(&self, action: &str, params: Value, token: Option<&str>) -> Result<Value> {
        self.answer(token).await?;
        Ok(json!({ "success": true, "action": action, "params": params }))
    }

    async fn search(&self, query: &str, limit: u32, token: Option<&str>) -> Result<SearchResults> {
        self.answer(token).await?;
        let results = (0..limit.min(2))
            .map(|i| json!({ "content": format!("{} result {}", query, i + 1), "score": 0.9 - f64::from(i) * 0.1 }))
            .collect();
        Ok(SearchResults { results })
    }

    async fn health(&self) -> Result<ProcessorHealth> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockBehavior::Healthy => {
                let mut health = ProcessorHealth::with_status("healthy");
                health
                    .components
                    .insert("redis".into(), json!({ "status": "healthy" }));
                health.version = Some("mock".into());
                Ok(health)
            }
            MockBehavior::Failing => Ok(ProcessorHealth::unhealthy()),
            MockBehavior::Unreachable => self.outcome().map(|_| ProcessorHealth::unreachable()),
        }
    }

    async fn metrics(&self) -> Result<ProcessorMetrics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()?;
        Ok(ProcessorMetrics {
            chat_requests_total: 10,
            chat_success_total: 9,
            chat_errors_total: 1,
            ..ProcessorMetrics::default()
        })
    }
}

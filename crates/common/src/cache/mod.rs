//! In-process query result cache
//!
//! Provides:
//! - Stale-while-revalidate reads with a per-call staleness window
//! - Coalescing of concurrent fetches for the same key
//! - Last-request-wins ordering of completions
//! - Prefix invalidation driven by an explicit mutation map
//! - Change notification through `watch` channels

mod invalidation;
pub mod keys;

pub use invalidation::{InvalidationMap, Mutation, MutationKind};

use crate::errors::{AppError, Result};
use crate::metrics;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Identity of a cached read
///
/// Two keys are equal when resource, scope and the canonical form of the
/// parameters are equal; object key order in the parameters is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: String,
    scope: Vec<String>,
    params: String,
}

impl QueryKey {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            scope: Vec::new(),
            params: Value::Null.to_string(),
        }
    }

    /// Narrow the key to an entity, e.g. one ticket
    pub fn scoped(mut self, segment: impl Into<String>) -> Self {
        self.scope.push(segment.into());
        self
    }

    pub fn with_params<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self> {
        self.params = canonicalize(serde_json::to_value(params)?).to_string();
        Ok(self)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Short digest of the canonical parameters
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.params.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        for segment in &self.scope {
            write!(f, "/{}", segment)?;
        }
        write!(f, ":{}", self.digest())
    }
}

/// Matches every key of a resource, optionally narrowed by leading scope segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    resource: String,
    scope: Vec<String>,
}

impl KeyPrefix {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            scope: Vec::new(),
        }
    }

    pub fn scoped(mut self, segment: impl Into<String>) -> Self {
        self.scope.push(segment.into());
        self
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        key.resource == self.resource && key.scope.starts_with(&self.scope)
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        for segment in &self.scope {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Sort object keys recursively so equal parameters serialize identically
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(fields.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

type FetchResult = std::result::Result<Value, Arc<AppError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct Entry {
    value: Value,
    fetched_at: Instant,
    stale_after: Duration,
    generation: u64,
}

impl Entry {
    fn is_stale(&self, now: Instant) -> bool {
        now >= self.fetched_at + self.stale_after
    }
}

struct InFlight {
    generation: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    in_flight: HashMap<QueryKey, InFlight>,
    watchers: HashMap<QueryKey, watch::Sender<Option<Value>>>,
    /// Fetches started below the floor of a matching prefix were invalidated
    floors: HashMap<KeyPrefix, u64>,
    /// Generations of spawned fetches that have not completed, detached ones included
    running: BTreeSet<u64>,
    next_generation: u64,
}

impl CacheState {
    fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    fn invalidated(&self, key: &QueryKey, generation: u64) -> bool {
        self.floors
            .iter()
            .any(|(prefix, floor)| generation < *floor && prefix.matches(key))
    }

    /// A floor only matters while a fetch started below it is still running
    fn prune_floors(&mut self) {
        let oldest = self.running.first().copied();
        self.floors
            .retain(|_, floor| oldest.is_some_and(|generation| generation < *floor));
    }

    fn store(&mut self, key: &QueryKey, value: Value, stale_after: Duration, generation: u64) {
        // `send` fails once every receiver is gone
        let closed = self
            .watchers
            .get(key)
            .is_some_and(|sender| sender.send(Some(value.clone())).is_err());
        if closed {
            self.watchers.remove(key);
        }
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                fetched_at: Instant::now(),
                stale_after,
                generation,
            },
        );
        metrics::record_cache_size(self.entries.len());
    }
}

/// Shared, cloneable handle to the result cache
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
    invalidations: Arc<InvalidationMap>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_invalidations(InvalidationMap::default())
    }

    pub fn with_invalidations(invalidations: InvalidationMap) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            invalidations: Arc::new(invalidations),
        }
    }

    /// Cached value and whether it is past its staleness window
    pub async fn get(&self, key: &QueryKey) -> Option<(Value, bool)> {
        let state = self.state.lock().await;
        let now = Instant::now();
        state
            .entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.is_stale(now)))
    }

    /// Store a value directly; it supersedes any fetch already in flight
    pub async fn set(&self, key: &QueryKey, value: Value, ttl: Duration) {
        let mut state = self.state.lock().await;
        let generation = state.next_generation();
        state.store(key, value, ttl, generation);
    }

    /// Whether a fetch for `key` is currently running
    pub async fn is_fetching(&self, key: &QueryKey) -> bool {
        self.state.lock().await.in_flight.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Receive every value stored under `key` from now on
    pub async fn watch(&self, key: &QueryKey) -> watch::Receiver<Option<Value>> {
        let mut state = self.state.lock().await;
        state.watchers.retain(|_, sender| sender.receiver_count() > 0);
        let current = state.entries.get(key).map(|entry| entry.value.clone());
        state
            .watchers
            .entry(key.clone())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    /// Read through the cache
    ///
    /// A fresh entry is returned without calling `fetcher`. A stale entry is
    /// returned as is while one background refetch runs. On a miss the caller
    /// joins the fetch already in flight for the key, or starts it.
    pub async fn fetch<F, Fut>(&self, key: &QueryKey, stale_after: Duration, fetcher: F) -> Result<Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let pending = {
            let mut state = self.state.lock().await;
            let now = Instant::now();

            let cached = state
                .entries
                .get(key)
                .map(|entry| (entry.value.clone(), entry.is_stale(now)));

            if let Some((value, stale)) = cached {
                metrics::record_cache(true, key.resource());
                if stale && !state.in_flight.contains_key(key) {
                    debug!(key = %key, "Serving stale value, revalidating");
                    self.start(&mut state, key, stale_after, fetcher);
                }
                return Ok(value);
            }

            metrics::record_cache(false, key.resource());
            match state.in_flight.get(key) {
                Some(in_flight) => {
                    metrics::record_cache_coalesced(key.resource());
                    in_flight.future.clone()
                }
                None => self.start(&mut state, key, stale_after, fetcher),
            }
        };

        pending.await.map_err(|e| e.duplicate())
    }

    /// `fetch` for typed results
    pub async fn fetch_as<T, F, Fut>(&self, key: &QueryKey, stale_after: Duration, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let value = self
            .fetch(key, stale_after, move || async move {
                let typed = fetcher().await?;
                Ok::<Value, AppError>(serde_json::to_value(typed)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch regardless of freshness; the newest request wins
    pub async fn refetch<F, Fut>(&self, key: &QueryKey, stale_after: Duration, fetcher: F) -> Result<Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let pending = {
            let mut state = self.state.lock().await;
            self.start(&mut state, key, stale_after, fetcher)
        };
        pending.await.map_err(|e| e.duplicate())
    }

    /// Drop entries and detach in-flight fetches under `prefix`
    pub async fn invalidate(&self, prefix: &KeyPrefix) -> usize {
        let mut state = self.state.lock().await;

        let before = state.entries.len();
        state.entries.retain(|key, _| !prefix.matches(key));
        let removed = before - state.entries.len();

        state.in_flight.retain(|key, _| !prefix.matches(key));
        let floor = state.next_generation;
        state.floors.insert(prefix.clone(), floor);
        state.prune_floors();

        metrics::record_cache_invalidation(&prefix.to_string(), removed);
        metrics::record_cache_size(state.entries.len());
        removed
    }

    /// Invalidate everything a successful mutation affects
    pub async fn apply(&self, mutation: &Mutation) -> usize {
        let mut removed = 0;
        for prefix in self.invalidations.prefixes(mutation) {
            removed += self.invalidate(&prefix).await;
        }
        removed
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let floor = state.next_generation;
        let prefixes: Vec<KeyPrefix> = state
            .entries
            .keys()
            .chain(state.in_flight.keys())
            .map(|key| KeyPrefix::new(key.resource()))
            .collect();
        for prefix in prefixes {
            state.floors.insert(prefix, floor);
        }
        state.prune_floors();
        state.entries.clear();
        state.in_flight.clear();
        metrics::record_cache_size(0);
    }

    /// Register and spawn a fetch; the task runs to completion even if every
    /// caller goes away
    fn start<F, Fut>(
        &self,
        state: &mut CacheState,
        key: &QueryKey,
        stale_after: Duration,
        fetcher: F,
    ) -> SharedFetch
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let generation = state.next_generation();
        let cache = self.clone();
        let owned_key = key.clone();

        let future = async move {
            let result: FetchResult = fetcher().await.map_err(Arc::new);
            cache
                .complete(&owned_key, generation, stale_after, &result)
                .await;
            result
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                future: future.clone(),
            },
        );
        state.running.insert(generation);
        tokio::spawn(future.clone());
        future
    }

    async fn complete(&self, key: &QueryKey, generation: u64, stale_after: Duration, result: &FetchResult) {
        let mut state = self.state.lock().await;
        state.running.remove(&generation);

        if state
            .in_flight
            .get(key)
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            state.in_flight.remove(key);
        }

        let keep = match result {
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed, nothing cached");
                None
            }
            Ok(_) if state.invalidated(key, generation) => {
                debug!(key = %key, generation, "Discarding result of invalidated fetch");
                None
            }
            Ok(_)
                if state
                    .entries
                    .get(key)
                    .is_some_and(|entry| entry.generation > generation) =>
            {
                debug!(key = %key, generation, "Discarding superseded result");
                None
            }
            Ok(value) => Some(value.clone()),
        };
        state.prune_floors();

        if let Some(value) = keep {
            state.store(key, value, stale_after, generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WINDOW: Duration = Duration::from_secs(15);

    fn counted(
        calls: &Arc<AtomicUsize>,
        value: Value,
        delay_ms: u64,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Value>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(value)
            }
            .boxed()
        }
    }

    fn users_page(page: u32) -> QueryKey {
        QueryKey::new("users")
            .with_params(&json!({"page": page, "page_size": 10}))
            .unwrap()
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = QueryKey::new("calls")
            .with_params(&json!({"page": 1, "filter": {"status": ["missed"], "search": "x"}}))
            .unwrap();
        let b = QueryKey::new("calls")
            .with_params(&json!({"filter": {"search": "x", "status": ["missed"]}, "page": 1}))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
        assert!(a.to_string().starts_with("calls:"));

        let c = QueryKey::new("calls").with_params(&json!({"page": 2})).unwrap();
        assert_ne!(a.to_string(), c.to_string());
    }

    #[test]
    fn test_prefix_matching() {
        let key = QueryKey::new("ticket-messages").scoped("t-1");
        assert!(KeyPrefix::new("ticket-messages").matches(&key));
        assert!(KeyPrefix::new("ticket-messages").scoped("t-1").matches(&key));
        assert!(!KeyPrefix::new("ticket-messages").scoped("t-2").matches(&key));
        assert!(!KeyPrefix::new("support-tickets").matches(&key));
        assert_eq!(key.to_string(), format!("ticket-messages/t-1:{}", key.digest()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_window_controls_refetch() {
        let cache = QueryCache::new();
        let key = users_page(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.fetch(&key, WINDOW, counted(&calls, json!("v1"), 0)).await.unwrap();
        let second = cache.fetch(&key, WINDOW, counted(&calls, json!("v2"), 0)).await.unwrap();
        assert_eq!(first, json!("v1"));
        assert_eq!(second, json!("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(cache.get(&key).await, Some((json!("v1"), true)));

        let mut updates = cache.watch(&key).await;
        let stale = cache.fetch(&key, WINDOW, counted(&calls, json!("v2"), 0)).await.unwrap();
        assert_eq!(stale, json!("v1"));

        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), Some(json!("v2")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let fresh = cache.fetch(&key, WINDOW, counted(&calls, json!("v3"), 0)).await.unwrap();
        assert_eq!(fresh, json!("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_hits_share_one_revalidation() {
        let cache = QueryCache::new();
        let key = users_page(1);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.set(&key, json!("old"), WINDOW).await;
        tokio::time::advance(WINDOW).await;

        for _ in 0..3 {
            let value = cache.fetch(&key, WINDOW, counted(&calls, json!("new"), 100)).await.unwrap();
            assert_eq!(value, json!("old"));
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key).await, Some((json!("new"), false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_are_coalesced() {
        let cache = QueryCache::new();
        let key = users_page(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.fetch(&key, WINDOW, counted(&calls, json!(1), 100)),
            cache.fetch(&key, WINDOW, counted(&calls, json!(2), 100)),
        );

        assert_eq!(a.unwrap(), json!(1));
        assert_eq!(b.unwrap(), json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_superseded_result_is_discarded() {
        let cache = QueryCache::new();
        let key = users_page(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            let fetcher = counted(&calls, json!("old"), 200);
            async move { cache.fetch(&key, WINDOW, fetcher).await }
        });
        while !cache.is_fetching(&key).await {
            tokio::task::yield_now().await;
        }

        let newer = cache.refetch(&key, WINDOW, counted(&calls, json!("new"), 50)).await.unwrap();
        assert_eq!(newer, json!("new"));

        // the superseded caller still gets its own answer
        assert_eq!(slow.await.unwrap().unwrap(), json!("old"));
        assert_eq!(cache.get(&key).await, Some((json!("new"), false)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_detaches_in_flight_fetch() {
        let cache = QueryCache::new();
        let key = keys::support_tickets();
        let calls = Arc::new(AtomicUsize::new(0));

        let pending = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            let fetcher = counted(&calls, json!(["before"]), 100);
            async move { cache.fetch(&key, WINDOW, fetcher).await }
        });
        while !cache.is_fetching(&key).await {
            tokio::task::yield_now().await;
        }

        cache.invalidate(&KeyPrefix::new(keys::SUPPORT_TICKETS)).await;
        assert!(!cache.is_fetching(&key).await);

        assert_eq!(pending.await.unwrap().unwrap(), json!(["before"]));
        assert!(cache.get(&key).await.is_none());

        let after = cache.fetch(&key, WINDOW, counted(&calls, json!(["after"]), 0)).await.unwrap();
        assert_eq!(after, json!(["after"]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_floors_outlive_only_their_detached_fetches() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // nothing running: the floor is dropped at once
        for ticket in ["t-1", "t-2", "t-3"] {
            cache
                .apply(&Mutation::TicketReply {
                    ticket_id: ticket.into(),
                })
                .await;
        }
        assert!(cache.state.lock().await.floors.is_empty());

        let key = keys::ticket_messages("t-4");
        let pending = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            let fetcher = counted(&calls, json!(["stale"]), 100);
            async move { cache.fetch(&key, WINDOW, fetcher).await }
        });
        while !cache.is_fetching(&key).await {
            tokio::task::yield_now().await;
        }

        cache
            .invalidate(&KeyPrefix::new(keys::TICKET_MESSAGES).scoped("t-4"))
            .await;
        assert_eq!(cache.state.lock().await.floors.len(), 1);

        pending.await.unwrap().unwrap();
        assert!(cache.get(&key).await.is_none());
        let state = cache.state.lock().await;
        assert!(state.floors.is_empty());
        assert!(state.running.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_watchers_are_pruned() {
        let cache = QueryCache::new();
        let watched = users_page(5);
        let dropped = users_page(6);

        let mut rx = cache.watch(&watched).await;
        drop(cache.watch(&dropped).await);

        cache.set(&dropped, json!(1), WINDOW).await;
        cache.set(&watched, json!(2), WINDOW).await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(json!(2)));

        let state = cache.state.lock().await;
        assert_eq!(state.watchers.len(), 1);
        assert!(state.watchers.contains_key(&watched));
    }

    #[tokio::test]
    async fn test_mutation_invalidates_only_its_entity() {
        let cache = QueryCache::new();
        let t1 = keys::ticket_messages("t-1");
        let t2 = keys::ticket_messages("t-2");
        cache.set(&t1, json!([]), WINDOW).await;
        cache.set(&t2, json!([]), WINDOW).await;
        cache.set(&keys::support_tickets(), json!([]), WINDOW).await;

        let removed = cache
            .apply(&Mutation::TicketReply {
                ticket_id: "t-1".into(),
            })
            .await;

        assert_eq!(removed, 2);
        assert!(cache.get(&t1).await.is_none());
        assert!(cache.get(&t2).await.is_some());
        assert!(cache.get(&keys::support_tickets()).await.is_none());
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = QueryCache::new();
        let key = users_page(3);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = cache
            .fetch(&key, WINDOW, || async { Err::<Value, _>(AppError::query("boom")) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Query { .. }));
        assert!(cache.get(&key).await.is_none());

        let value = cache.fetch(&key, WINDOW, counted(&calls, json!(7), 0)).await.unwrap();
        assert_eq!(value, json!(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_as_round_trips_typed_values() {
        let cache = QueryCache::new();
        let key = users_page(4);
        let rows: Vec<u32> = cache
            .fetch_as(&key, WINDOW, || async { Ok::<_, AppError>(vec![1u32, 2, 3]) })
            .await
            .unwrap();
        assert_eq!(rows, vec![1, 2, 3]);
        assert_eq!(cache.get(&key).await.map(|(v, _)| v), Some(json!([1, 2, 3])));
    }
}

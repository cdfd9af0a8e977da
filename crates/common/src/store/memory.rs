//! In-memory adapter
//!
//! Evaluates `Query` values against JSON rows held in process. Used for local
//! runs without a hosted store and throughout the test suites.

use super::query::{Embed, Filter, Order, Query};
use super::{tables, DataStore, StoreResponse};
use crate::auth::Credentials;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// How many embedded rows a parent row carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A foreign-key relationship usable as an embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub parent: String,
    /// Embedded table, also the embed name
    pub name: String,
    pub local_key: String,
    pub foreign_key: String,
    pub cardinality: Cardinality,
}

impl Relation {
    pub fn new(
        parent: &str,
        name: &str,
        local_key: &str,
        foreign_key: &str,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            parent: parent.to_string(),
            name: name.to_string(),
            local_key: local_key.to_string(),
            foreign_key: foreign_key.to_string(),
            cardinality,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    relations: Vec<Relation>,
    failing: HashMap<String, String>,
    selects: HashMap<String, u64>,
    max_rows: Option<usize>,
}

/// Store backed by process memory
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    offline: Arc<AtomicBool>,
    credentials: Option<Credentials>,
}

impl InMemoryStore {
    /// Empty store with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dashboard table, empty, with the relations the queries embed
    pub fn with_schema() -> Self {
        let mut state = MemoryState::default();
        for table in tables::ALL {
            state.tables.insert(table.to_string(), Vec::new());
        }
        state.relations = vec![
            Relation::new(
                tables::PROFILES,
                tables::BUSINESSES,
                "user_id",
                "user_id",
                Cardinality::Many,
            ),
            Relation::new(
                tables::SUBSCRIPTIONS,
                tables::PLANS,
                "plan_id",
                "id",
                Cardinality::One,
            ),
            Relation::new(
                tables::REVIEWS,
                tables::BUSINESSES,
                "business_id",
                "id",
                Cardinality::One,
            ),
        ];

        Self {
            state: Arc::new(RwLock::new(state)),
            ..Self::default()
        }
    }

    pub async fn add_relation(&self, relation: Relation) {
        self.state.write().await.relations.push(relation);
    }

    /// Append rows, creating the table if needed
    pub async fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.state.write().await;
        let target = state.tables.entry(table.to_string()).or_default();
        for row in rows {
            target.push(with_defaults(row));
        }
    }

    /// Current rows of a table
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every read of `table` fail with `message`
    pub async fn fail_table(&self, table: &str, message: &str) {
        self.state
            .write()
            .await
            .failing
            .insert(table.to_string(), message.to_string());
    }

    /// Number of reads issued against `table`
    pub async fn select_count(&self, table: &str) -> u64 {
        self.state
            .read()
            .await
            .selects
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    /// Cap the rows any single read returns, as a hosted store's max-rows
    /// setting does. Exact counts are not affected.
    pub async fn set_max_rows(&self, max_rows: usize) {
        self.state.write().await.max_rows = Some(max_rows);
    }

    /// Simulate the store being unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Credentials this handle acts under
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(AppError::upstream("store", "connection refused"));
        }
        Ok(())
    }
}

fn with_defaults(row: Value) -> Value {
    let Value::Object(mut map) = row else {
        return row;
    };
    map.entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    map.entry("created_at")
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    Value::Object(map)
}

fn missing_table(table: &str) -> AppError {
    AppError::query(format!("relation \"public.{}\" does not exist", table))
}

fn table_rows<'a>(state: &'a MemoryState, table: &str) -> Result<&'a [Value]> {
    state
        .tables
        .get(table)
        .map(Vec::as_slice)
        .ok_or_else(|| missing_table(table))
}

fn check_column(table: &str, rows: &[Value], column: &str) -> Result<()> {
    if rows.is_empty() || rows.iter().any(|row| row.get(column).is_some()) {
        return Ok(());
    }
    Err(AppError::query(format!(
        "column {}.{} does not exist",
        table, column
    )))
}

fn filter_columns(filter: &Filter) -> Vec<&str> {
    match filter {
        Filter::Eq { column, .. }
        | Filter::In { column, .. }
        | Filter::Gte { column, .. }
        | Filter::Lt { column, .. }
        | Filter::Lte { column, .. } => vec![column.as_str()],
        Filter::AnyIlike { columns, .. } => columns.iter().map(String::as_str).collect(),
    }
}

/// The filter re-targeted at the embedded table, if it belongs to `relation`
fn scoped_to(filter: &Filter, relation: &str) -> Option<Filter> {
    if filter.relation() != Some(relation) {
        return None;
    }
    let strip = |column: &str| {
        column
            .split_once('.')
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_else(|| column.to_string())
    };
    Some(match filter {
        Filter::Eq { column, value } => Filter::Eq {
            column: strip(column),
            value: value.clone(),
        },
        Filter::In { column, values } => Filter::In {
            column: strip(column),
            values: values.clone(),
        },
        Filter::Gte { column, value } => Filter::Gte {
            column: strip(column),
            value: value.clone(),
        },
        Filter::Lt { column, value } => Filter::Lt {
            column: strip(column),
            value: value.clone(),
        },
        Filter::Lte { column, value } => Filter::Lte {
            column: strip(column),
            value: value.clone(),
        },
        Filter::AnyIlike { .. } => return None,
    })
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Numbers numerically, timestamps chronologically, everything else as text
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => match (parse_time(x), parse_time(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        _ => text(a).cmp(&text(b)),
    }
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { column, value } => {
            let actual = field(row, column);
            if value.is_null() {
                actual.is_null()
            } else {
                !actual.is_null() && compare_values(actual, value) == Ordering::Equal
            }
        }
        Filter::In { column, values } => {
            let actual = field(row, column);
            !actual.is_null()
                && values
                    .iter()
                    .any(|v| compare_values(actual, v) == Ordering::Equal)
        }
        Filter::Gte { column, value } => {
            let actual = field(row, column);
            !actual.is_null() && compare_values(actual, value) != Ordering::Less
        }
        Filter::Lt { column, value } => {
            let actual = field(row, column);
            !actual.is_null() && compare_values(actual, value) == Ordering::Less
        }
        Filter::Lte { column, value } => {
            let actual = field(row, column);
            !actual.is_null() && compare_values(actual, value) != Ordering::Greater
        }
        Filter::AnyIlike { columns, needle } => {
            let needle = needle.to_lowercase();
            columns.iter().any(|column| {
                let actual = field(row, column);
                !actual.is_null() && text(actual).to_lowercase().contains(&needle)
            })
        }
    }
}

/// Ascending order puts nulls last; descending is its exact reverse
fn order_rows(a: &Value, b: &Value, order: &[Order]) -> Ordering {
    for o in order {
        let (x, y) = (field(a, &o.column), field(b, &o.column));
        let ascending = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_values(x, y),
        };
        let ord = if o.ascending {
            ascending
        } else {
            ascending.reverse()
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn project(row: &Value, columns: &[String]) -> Map<String, Value> {
    match row {
        Value::Object(map) if columns.is_empty() => map.clone(),
        _ => columns
            .iter()
            .map(|c| (c.clone(), field(row, c).clone()))
            .collect(),
    }
}

/// Resolve one embed for a parent row; `None` drops the parent (inner join)
fn resolve_embed(
    state: &MemoryState,
    parent_table: &str,
    row: &Value,
    embed: &Embed,
    filters: &[Filter],
) -> Result<Option<Value>> {
    let relation = state
        .relations
        .iter()
        .find(|r| r.parent == parent_table && r.name == embed.relation)
        .ok_or_else(|| {
            AppError::query(format!(
                "Could not find a relationship between '{}' and '{}'",
                parent_table, embed.relation
            ))
        })?;
    let child_rows = table_rows(state, &relation.name)?;

    let scoped: Vec<Filter> = filters
        .iter()
        .filter_map(|f| scoped_to(f, &embed.relation))
        .collect();
    for column in embed.columns.iter().map(String::as_str).chain(
        scoped.iter().flat_map(filter_columns),
    ) {
        check_column(&relation.name, child_rows, column)?;
    }

    let key = field(row, &relation.local_key);
    let mut embedded = Vec::new();
    if !key.is_null() {
        for child in child_rows {
            let linked = compare_values(field(child, &relation.foreign_key), key) == Ordering::Equal;
            if !linked || !scoped.iter().all(|f| matches(child, f)) {
                continue;
            }
            if let Some(out) = build_row(state, &relation.name, child, &embed.columns, &embed.embeds, &[])? {
                embedded.push(Value::Object(out));
            }
        }
    }

    if embed.inner && embedded.is_empty() {
        return Ok(None);
    }

    Ok(Some(match relation.cardinality {
        Cardinality::Many => Value::Array(embedded),
        Cardinality::One => embedded.into_iter().next().unwrap_or(Value::Null),
    }))
}

fn build_row(
    state: &MemoryState,
    table: &str,
    row: &Value,
    columns: &[String],
    embeds: &[Embed],
    filters: &[Filter],
) -> Result<Option<Map<String, Value>>> {
    let mut out = project(row, columns);
    for embed in embeds {
        match resolve_embed(state, table, row, embed, filters)? {
            Some(value) => {
                out.insert(embed.relation.clone(), value);
            }
            None => return Ok(None),
        }
    }
    Ok(Some(out))
}

fn evaluate(state: &MemoryState, query: &Query) -> Result<StoreResponse> {
    let rows = table_rows(state, &query.table)?;

    for filter in &query.filters {
        match filter.relation() {
            Some(relation) if !query.embeds.iter().any(|e| e.relation == relation) => {
                return Err(AppError::query(format!(
                    "'{}' is not an embedded resource of '{}'",
                    relation, query.table
                )));
            }
            Some(_) => {}
            None => {
                for column in filter_columns(filter) {
                    check_column(&query.table, rows, column)?;
                }
            }
        }
    }
    for column in query
        .columns
        .iter()
        .chain(query.order.iter().map(|o| &o.column))
    {
        check_column(&query.table, rows, column)?;
    }

    let mut matched: Vec<(&Value, Map<String, Value>)> = Vec::new();
    for row in rows {
        let own_filters_hold = query
            .filters
            .iter()
            .filter(|f| f.relation().is_none())
            .all(|f| matches(row, f));
        if !own_filters_hold {
            continue;
        }
        if let Some(out) = build_row(
            state,
            &query.table,
            row,
            &query.columns,
            &query.embeds,
            &query.filters,
        )? {
            matched.push((row, out));
        }
    }

    matched.sort_by(|(a, _), (b, _)| order_rows(a, b, &query.order));
    let count = query.count.then_some(matched.len() as u64);

    if query.head {
        return Ok(StoreResponse {
            rows: Vec::new(),
            count,
        });
    }

    let (skip, take) = match (query.range, query.limit) {
        (Some((from, to)), _) => (from as usize, (to.saturating_sub(from) + 1) as usize),
        (None, Some(limit)) => (0, limit as usize),
        (None, None) => (0, usize::MAX),
    };
    let take = state.max_rows.map_or(take, |max| take.min(max));

    let rows = matched
        .into_iter()
        .skip(skip)
        .take(take)
        .map(|(_, out)| Value::Object(out))
        .collect();

    Ok(StoreResponse { rows, count })
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn select(&self, query: &Query) -> Result<StoreResponse> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        *state.selects.entry(query.table.clone()).or_insert(0) += 1;

        if let Some(message) = state.failing.get(&query.table) {
            return Err(AppError::query(message.clone()));
        }
        evaluate(&state, query)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.ensure_online()?;
        if !row.is_object() {
            return Err(AppError::Validation {
                message: "row must be a JSON object".to_string(),
                field: None,
            });
        }

        let mut state = self.state.write().await;
        let rows = state.tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let row = with_defaults(row);
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<u64> {
        self.ensure_online()?;
        let Value::Object(patch) = patch else {
            return Err(AppError::Validation {
                message: "patch must be a JSON object".to_string(),
                field: None,
            });
        };

        let mut state = self.state.write().await;
        let rows = state.tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let mut affected = 0;
        for row in rows.iter_mut() {
            if !filters.iter().all(|f| matches(row, f)) {
                continue;
            }
            if let Value::Object(map) = row {
                for (key, value) in &patch {
                    map.insert(key.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_online()
    }

    fn with_credentials(&self, credentials: &Credentials) -> Arc<dyn DataStore> {
        Arc::new(Self {
            state: Arc::clone(&self.state),
            offline: Arc::clone(&self.offline),
            credentials: Some(credentials.clone()),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::with_schema();
        store
            .insert_rows(
                tables::PROFILES,
                vec![
                    json!({"id": "p1", "user_id": "u1", "full_name": "Ada", "created_at": "2025-03-01T00:00:00Z"}),
                    json!({"id": "p2", "user_id": "u2", "full_name": "Grace", "created_at": "2025-02-01T00:00:00Z"}),
                    json!({"id": "p3", "user_id": "u3", "full_name": null, "created_at": "2025-01-01T00:00:00Z"}),
                ],
            )
            .await;
        store
            .insert_rows(
                tables::BUSINESSES,
                vec![
                    json!({"id": "b1", "user_id": "u1", "business_name": "Ada Plumbing", "subscription_status": "active"}),
                    json!({"id": "b2", "user_id": "u2", "business_name": "Hopper Dental", "subscription_status": "canceled"}),
                ],
            )
            .await;
        store
            .insert_rows(
                tables::PLANS,
                vec![json!({"id": "plan-pro", "name": "Pro", "price_amount": 4900})],
            )
            .await;
        store
            .insert_rows(
                tables::SUBSCRIPTIONS,
                vec![json!({"id": "s1", "user_id": "u1", "plan_id": "plan-pro", "status": "active"})],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_embed_cardinality() {
        let store = seeded().await;
        let query = Query::from(tables::PROFILES)
            .embed(Embed::new(tables::BUSINESSES).columns(&["business_name"]))
            .order("created_at", false);
        let rows = store.select(&query).await.unwrap().rows;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["businesses"], json!([{"business_name": "Ada Plumbing"}]));
        assert_eq!(rows[2]["businesses"], json!([]));

        let query = Query::from(tables::SUBSCRIPTIONS)
            .select(&["user_id"])
            .embed(Embed::new(tables::PLANS).columns(&["name"]));
        let rows = store.select(&query).await.unwrap().rows;
        assert_eq!(rows, vec![json!({"user_id": "u1", "plans": {"name": "Pro"}})]);
    }

    #[tokio::test]
    async fn test_inner_embed_filter_restricts_parents() {
        let store = seeded().await;
        let query = Query::from(tables::PROFILES)
            .embed(Embed::new(tables::BUSINESSES).inner())
            .is_in("businesses.subscription_status", &["active"])
            .count_exact();
        let response = store.select(&query).await.unwrap();
        assert_eq!(response.count, Some(1));
        assert_eq!(response.rows[0]["user_id"], "u1");

        // without the inner join only the embedded rows are filtered
        let query = Query::from(tables::PROFILES)
            .embed(Embed::new(tables::BUSINESSES))
            .is_in("businesses.subscription_status", &["active"])
            .count_exact();
        assert_eq!(store.select(&query).await.unwrap().count, Some(3));
    }

    #[tokio::test]
    async fn test_unknown_column_and_table() {
        let store = seeded().await;
        let err = store
            .select(&Query::from(tables::PROFILES).eq("nope", 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("column profiles.nope does not exist"));

        let err = store.select(&Query::from("ghosts")).await.unwrap_err();
        assert!(err.to_string().contains("relation \"public.ghosts\" does not exist"));
    }

    #[tokio::test]
    async fn test_order_nulls_and_window() {
        let store = seeded().await;
        let query = Query::from(tables::PROFILES)
            .select(&["full_name"])
            .order("full_name", true)
            .range(1, 2)
            .count_exact();
        let response = store.select(&query).await.unwrap();
        assert_eq!(response.count, Some(3));
        assert_eq!(
            response.rows,
            vec![json!({"full_name": "Grace"}), json!({"full_name": null})]
        );

        let query = Query::from(tables::PROFILES)
            .select(&["full_name"])
            .order("full_name", false)
            .limit(1);
        let rows = store.select(&query).await.unwrap().rows;
        assert_eq!(rows, vec![json!({"full_name": null})]);
    }

    #[tokio::test]
    async fn test_search_and_time_range() {
        let store = seeded().await;
        let query = Query::from(tables::PROFILES).search(&["full_name"], "ADA");
        assert_eq!(store.select(&query).await.unwrap().rows.len(), 1);

        let query = Query::from(tables::PROFILES)
            .gte("created_at", "2025-02-01T00:00:00+00:00")
            .lt("created_at", "2025-03-01T00:00:00Z")
            .head();
        let response = store.select(&query).await.unwrap();
        assert!(response.rows.is_empty());
        assert_eq!(response.count, Some(1));
    }

    #[tokio::test]
    async fn test_insert_update_and_offline() {
        let store = InMemoryStore::with_schema();
        let row = store
            .insert(tables::SUPPORT_MESSAGES, json!({"ticket_id": "t1", "content": "hi"}))
            .await
            .unwrap();
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());

        let affected = store
            .update(
                tables::SUPPORT_MESSAGES,
                json!({"content": "hello"}),
                &[Filter::eq("ticket_id", "t1")],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(store.rows(tables::SUPPORT_MESSAGES).await[0]["content"], "hello");

        store.set_offline(true);
        assert!(store.ping().await.is_err());
        assert!(store.select(&Query::from(tables::CALLS)).await.is_err());
    }

    #[tokio::test]
    async fn test_scoped_handle_shares_rows() {
        let store = InMemoryStore::with_schema();
        let scoped = store.with_credentials(&Credentials::Session("tok".into()));
        scoped
            .insert(tables::CALLS, json!({"user_id": "u1"}))
            .await
            .unwrap();
        assert_eq!(store.rows(tables::CALLS).await.len(), 1);
        assert_eq!(store.select_count(tables::CALLS).await, 0);
    }
}

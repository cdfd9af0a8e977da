//! Query description for the hosted store
//!
//! A `Query` is a plain value: the REST adapter renders it into
//! PostgREST-style URL parameters and the in-memory adapter evaluates it
//! directly. Both must agree on every rule documented here.

use serde::Serialize;
use serde_json::Value;

/// A single row predicate
///
/// A column written as `relation.column` targets an embedded relation. On an
/// inner embed it restricts the parent rows, otherwise only the embedded rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    Gte { column: String, value: Value },
    Lt { column: String, value: Value },
    Lte { column: String, value: Value },
    /// Case-insensitive substring match on ANY of the columns
    AnyIlike { columns: Vec<String>, needle: String },
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        }
    }

    /// Relation prefix of the column, if the filter targets an embed
    pub fn relation(&self) -> Option<&str> {
        match self {
            Filter::Eq { column, .. }
            | Filter::In { column, .. }
            | Filter::Gte { column, .. }
            | Filter::Lt { column, .. }
            | Filter::Lte { column, .. } => column.split_once('.').map(|(rel, _)| rel),
            Filter::AnyIlike { .. } => None,
        }
    }
}

/// An embedded (joined) relation in a select
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub relation: String,
    /// Empty selects every column
    pub columns: Vec<String>,
    /// Inner join: parents without a matching embedded row are dropped
    pub inner: bool,
    pub embeds: Vec<Embed>,
}

impl Embed {
    pub fn new(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            columns: Vec::new(),
            inner: false,
            embeds: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn inner(mut self) -> Self {
        self.inner = true;
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    fn render(&self) -> String {
        let join = if self.inner { "!inner" } else { "" };
        format!("{}{}({})", self.relation, join, select_list(&self.columns, &self.embeds))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A read against one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub table: String,
    /// Empty selects every column
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    /// Inclusive row window
    pub range: Option<(u64, u64)>,
    pub limit: Option<u64>,
    /// Ask for the exact count of matching rows
    pub count: bool,
    /// Count only, no rows
    pub head: bool,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            limit: None,
            count: false,
            head: false,
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    /// Set membership; an empty set is not applied
    pub fn is_in<V: Into<Value> + Clone>(self, column: &str, values: &[V]) -> Self {
        if values.is_empty() {
            return self;
        }
        self.filter(Filter::In {
            column: column.to_string(),
            values: values.iter().cloned().map(Into::into).collect(),
        })
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte {
            column: column.to_string(),
            value: value.into(),
        })
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt {
            column: column.to_string(),
            value: value.into(),
        })
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte {
            column: column.to_string(),
            value: value.into(),
        })
    }

    /// Free-text search across columns; a blank needle is not applied
    pub fn search(self, columns: &[&str], needle: &str) -> Self {
        let needle = needle.trim();
        if needle.is_empty() {
            return self;
        }
        self.filter(Filter::AnyIlike {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            needle: needle.to_string(),
        })
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Inclusive window `[from, to]`
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some((from, to));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn head(mut self) -> Self {
        self.count = true;
        self.head = true;
        self
    }

    /// The `select=` parameter
    pub fn select_param(&self) -> String {
        select_list(&self.columns, &self.embeds)
    }

    /// Render into URL query pairs, PostgREST dialect
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select_param())];

        for filter in &self.filters {
            params.push(render_filter(filter));
        }

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        match (self.range, self.limit) {
            (Some((from, to)), _) => {
                params.push(("offset".to_string(), from.to_string()));
                params.push(("limit".to_string(), (to.saturating_sub(from) + 1).to_string()));
            }
            (None, Some(limit)) => params.push(("limit".to_string(), limit.to_string())),
            (None, None) => {}
        }

        params
    }
}

fn select_list(columns: &[String], embeds: &[Embed]) -> String {
    let mut parts: Vec<String> = if columns.is_empty() {
        vec!["*".to_string()]
    } else {
        columns.to_vec()
    };
    parts.extend(embeds.iter().map(Embed::render));
    parts.join(",")
}

fn render_filter(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq { column, value } => (column.clone(), format!("eq.{}", render_value(value))),
        Filter::Gte { column, value } => (column.clone(), format!("gte.{}", render_value(value))),
        Filter::Lt { column, value } => (column.clone(), format!("lt.{}", render_value(value))),
        Filter::Lte { column, value } => (column.clone(), format!("lte.{}", render_value(value))),
        Filter::In { column, values } => {
            let list = values
                .iter()
                .map(|v| quote_if_reserved(&render_value(v)))
                .collect::<Vec<_>>()
                .join(",");
            (column.clone(), format!("in.({})", list))
        }
        Filter::AnyIlike { columns, needle } => {
            let pattern = quote_if_reserved(&format!("*{}*", escape_like(needle)));
            let list = columns
                .iter()
                .map(|c| format!("{}.ilike.{}", c, pattern))
                .collect::<Vec<_>>()
                .join(",");
            ("or".to_string(), format!("({})", list))
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// `%` and `_` are LIKE wildcards; the needle is matched literally
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Values containing PostgREST list syntax must be double-quoted
fn quote_if_reserved(value: &str) -> String {
    if value.contains(&[',', '(', ')', '"', ':'][..]) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Parse the total from a `Content-Range` header (`0-9/42`, `*/0`)
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.split_once('/')?;
    total.trim().parse().ok()
}

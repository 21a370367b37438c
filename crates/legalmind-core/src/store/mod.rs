pub mod firestore;
pub mod sqlite;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use firestore::FirestoreStore;
pub use sqlite::SqliteStore;

/// A stored document: a JSON object whose `id` field mirrors its key.
pub type Document = Map<String, Value>;

// ── Collections ───────────────────────────────────────────────────────────

pub const SESSIONS: &str = "sessions";
pub const MESSAGES: &str = "messages";
pub const CONTRACTS: &str = "contracts";
pub const CLAUSES: &str = "clauses";
pub const THINKING_LOGS: &str = "thinking_logs";
pub const DOCUMENTS: &str = "documents";

// ── Query model ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Eq,
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Filters on top-level fields, optional ordering and limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: Op::Eq,
            value: value.into(),
        });
        self
    }

    pub fn lt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: Op::Lt,
            value: value.into(),
        });
        self
    }

    pub fn gt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: Op::Gt,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Whether a document passes every filter. Missing fields never match.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| {
            let Some(v) = doc.get(&f.field) else {
                return false;
            };
            match f.op {
                Op::Eq => json_eq(v, &f.value),
                Op::Lt => compare_json(v, &f.value) == Some(Ordering::Less),
                Op::Gt => compare_json(v, &f.value) == Some(Ordering::Greater),
            }
        })
    }

    /// Apply filters, ordering and limit to an in-memory document set.
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some((field, dir)) = &self.order_by {
            out.sort_by(|a, b| {
                let ord = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => compare_json(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                match dir {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Order numbers numerically and strings lexicographically; mixed kinds
/// are incomparable.
pub fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ── Store trait ───────────────────────────────────────────────────────────

/// Minimal document-database surface the rest of the system needs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert (or overwrite) a document. Stamps `id`, `created_at` and
    /// `updated_at` and returns what was stored.
    async fn create(&self, collection: &str, id: &str, data: Document) -> Result<Document>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Shallow-merge `patch` into an existing document and refresh
    /// `updated_at`. Fails if the document does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<Document>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>>;
}

/// Set `created_at` unless the caller already supplied a non-empty one.
pub fn stamp_created_at(data: &mut Document, now: &str) {
    let supplied = matches!(data.get("created_at"), Some(Value::String(s)) if !s.is_empty());
    if !supplied {
        data.insert("created_at".into(), Value::String(now.to_string()));
    }
}

/// Convert a `serde_json::Value` that must be an object into a `Document`.
pub fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {other}"),
    }
}

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{stamp_created_at, Direction, Document, DocumentStore, Op, Query};
use crate::gcp::TokenSource;
use crate::types::now_ts;

const BASE: &str = "https://firestore.googleapis.com/v1";

/// Firestore over its REST API.
pub struct FirestoreStore {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    /// `projects/{p}/databases/{db}/documents`
    root: String,
}

// ── Value codec ───────────────────────────────────────────────────────────

/// Encode a JSON value as a Firestore typed value.
pub fn encode_value(v: &Value) -> Value {
    match v {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(map: &Map<String, Value>) -> Value {
    let fields: Map<String, Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(fields)
}

/// Decode a Firestore typed value into plain JSON. Timestamps, references
/// and bytes come back as strings.
pub fn decode_value(v: &Value) -> Value {
    let Some(obj) = v.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed.map(Value::from).unwrap_or(Value::Null)
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vals| vals.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))),
        "geoPointValue" => inner.clone(),
        _ => Value::Null,
    }
}

pub fn decode_fields(fields: Option<&Value>) -> Map<String, Value> {
    fields
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect())
        .unwrap_or_default()
}

/// Turn a REST document resource into a plain document with `id` set.
pub fn decode_document(resource: &Value) -> Document {
    let mut doc = decode_fields(resource.get("fields"));
    if let Some(name) = resource.get("name").and_then(Value::as_str) {
        if let Some(id) = name.rsplit('/').next() {
            doc.insert("id".into(), Value::String(id.to_string()));
        }
    }
    doc
}

fn op_name(op: &Op) -> &'static str {
    match op {
        Op::Eq => "EQUAL",
        Op::Lt => "LESS_THAN",
        Op::Gt => "GREATER_THAN",
    }
}

/// Build a `runQuery` structured query. Ordering and limit are only sent
/// server-side when there are no filters; mixing equality filters with an
/// order on another field needs a composite index, so that combination is
/// ordered client-side instead.
pub fn structured_query(collection: &str, query: &Query) -> Value {
    let mut sq = json!({ "from": [{ "collectionId": collection }] });
    let field_filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": f.field },
                    "op": op_name(&f.op),
                    "value": encode_value(&f.value),
                }
            })
        })
        .collect();
    match field_filters.len() {
        0 => {}
        1 => sq["where"] = field_filters[0].clone(),
        _ => {
            sq["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": field_filters }
            })
        }
    }
    if query.filters.is_empty() {
        if let Some((field, dir)) = &query.order_by {
            let direction = match dir {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            sq["orderBy"] = json!([{ "field": { "fieldPath": field }, "direction": direction }]);
        }
        if let Some(n) = query.limit {
            sq["limit"] = json!(n);
        }
    }
    json!({ "structuredQuery": sq })
}

// ── Store ─────────────────────────────────────────────────────────────────

impl FirestoreStore {
    pub fn new(project: &str, database: &str, tokens: Arc<TokenSource>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            tokens,
            root: format!("projects/{project}/databases/{database}/documents"),
        }
    }

    fn doc_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{BASE}/{}/{collection}/{}",
            self.root,
            urlencoding::encode(id)
        )
    }

    async fn write(
        &self,
        collection: &str,
        id: &str,
        data: &Document,
        mask: Option<&[&String]>,
    ) -> Result<Document> {
        let mut url = self.doc_url(collection, id);
        if let Some(fields) = mask {
            let params: Vec<String> = fields
                .iter()
                .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
                .collect();
            url = format!("{url}?{}&currentDocument.exists=true", params.join("&"));
        }
        let token = self.tokens.token().await?;
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(token)
            .json(&json!({ "fields": encode_fields(data) }))
            .send()
            .await
            .with_context(|| format!("firestore write {collection}/{id}"))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            bail!("{collection}/{id} not found");
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("firestore write {collection}/{id} failed ({status}): {body}");
        }
        let resource: Value = resp.json().await?;
        Ok(decode_document(&resource))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn create(&self, collection: &str, id: &str, mut data: Document) -> Result<Document> {
        let now = now_ts();
        data.insert("id".into(), Value::String(id.to_string()));
        stamp_created_at(&mut data, &now);
        data.insert("updated_at".into(), Value::String(now));
        debug!(collection, id, "firestore create");
        self.write(collection, id, &data, None).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let token = self.tokens.token().await?;
        let resp = self
            .http
            .get(self.doc_url(collection, id))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("firestore get {collection}/{id}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resource: Value = resp.error_for_status()?.json().await?;
        Ok(Some(decode_document(&resource)))
    }

    async fn update(&self, collection: &str, id: &str, mut patch: Document) -> Result<Document> {
        patch.insert("updated_at".into(), Value::String(now_ts()));
        let keys: Vec<&String> = patch.keys().collect();
        self.write(collection, id, &patch, Some(&keys)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let token = self.tokens.token().await?;
        let url = format!("{}?currentDocument.exists=true", self.doc_url(collection, id));
        let resp = self
            .http
            .delete(url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("firestore delete {collection}/{id}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        resp.error_for_status()?;
        Ok(true)
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>> {
        let token = self.tokens.token().await?;
        let body = structured_query(collection, &query);
        let url = format!("{BASE}/{}:runQuery", self.root);
        let rows: Vec<Value> = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("firestore runQuery on {collection}"))?
            .error_for_status()?
            .json()
            .await?;
        let docs: Vec<Document> = rows
            .iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect();
        if query.filters.is_empty() {
            return Ok(docs);
        }
        // Filters already ran server-side; this only orders and trims.
        let local = Query {
            filters: Vec::new(),
            ..query
        };
        Ok(local.apply(docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_integers_as_strings_and_floats_as_doubles() {
        assert_eq!(encode_value(&json!(42)), json!({"integerValue": "42"}));
        assert_eq!(encode_value(&json!(0.5)), json!({"doubleValue": 0.5}));
    }

    #[test]
    fn decode_document_takes_id_from_resource_name() {
        let resource = json!({
            "name": "projects/p/databases/(default)/documents/contracts/abc-123",
            "fields": { "title": { "stringValue": "NDA" } }
        });
        let doc = decode_document(&resource);
        assert_eq!(doc["id"], "abc-123");
        assert_eq!(doc["title"], "NDA");
    }
}

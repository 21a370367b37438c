use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{into_document, stamp_created_at, Document, DocumentStore, Query};
use crate::types::now_ts;

const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS documents (
    collection  TEXT NOT NULL,
    id          TEXT NOT NULL,
    data        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
";

/// Document store backed by a single SQLite table of JSON blobs.
/// Used for local development and tests.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn decode(raw: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(raw).context("corrupt document JSON")?;
    into_document(value)
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database at {path:?}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("failed to set PRAGMAs")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory SQLite")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("failed to apply schema migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read(conn: &Connection, collection: &str, id: &str) -> Result<Option<Document>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .context("get_document")?;
        raw.as_deref().map(decode).transpose()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, collection: &str, id: &str, mut data: Document) -> Result<Document> {
        let now = now_ts();
        data.insert("id".into(), Value::String(id.to_string()));
        stamp_created_at(&mut data, &now);
        data.insert("updated_at".into(), Value::String(now.clone()));
        let created_at = data
            .get("created_at")
            .and_then(Value::as_str)
            .unwrap_or(&now)
            .to_string();
        let raw = serde_json::to_string(&data)?;

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, id, data, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![collection, id, raw, created_at, now],
        )
        .context("create_document")?;
        Ok(data)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        Self::read(&conn, collection, id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<Document> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = Self::read(&conn, collection, id)?
            .with_context(|| format!("{collection}/{id} not found"))?;
        let now = now_ts();
        for (k, v) in patch {
            doc.insert(k, v);
        }
        doc.insert("id".into(), Value::String(id.to_string()));
        doc.insert("updated_at".into(), Value::String(now.clone()));
        let raw = serde_json::to_string(&doc)?;
        conn.execute(
            "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![raw, now, collection, id],
        )
        .context("update_document")?;
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let n = conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .context("delete_document")?;
        Ok(n > 0)
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>> {
        let rows = {
            let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT data FROM documents WHERE collection = ?1 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map(params![collection], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("query_documents")?;
            rows
        };
        let docs = rows
            .iter()
            .map(|raw| decode(raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(query.apply(docs))
    }
}

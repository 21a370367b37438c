use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::store::{
    into_document, Direction, Document, DocumentStore, Query, CLAUSES, CONTRACTS, DOCUMENTS,
    MESSAGES, SESSIONS, THINKING_LOGS,
};
use crate::types::{
    format_ts, now_ts, Clause, Contract, GeneratedDocument, Message, Session, SessionStatus,
    ThinkingLog,
};

/// Typed access to the collections. Thin by intent: every method is one or
/// two store calls plus (de)serialization.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

fn to_doc<T: Serialize>(value: &T) -> Result<Document> {
    into_document(serde_json::to_value(value)?)
}

fn from_doc<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

fn from_docs<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>> {
    docs.into_iter().map(from_doc).collect()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Filters for listing contracts.
#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub status: Option<String>,
    pub contract_type: Option<String>,
    pub limit: Option<usize>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ── Sessions ──────────────────────────────────────────────────────────

    pub async fn create_session(&self, id: &str, contract_id: Option<&str>) -> Result<Session> {
        let now = now_ts();
        let session = Session {
            id: id.to_string(),
            created_at: now.clone(),
            last_activity: now,
            contract_id: contract_id.map(str::to_string),
            status: SessionStatus::Active,
            message_count: 0,
        };
        let doc = self
            .store
            .create(SESSIONS, id, to_doc(&session)?)
            .await
            .context("create_session")?;
        from_doc(doc)
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.store
            .get(SESSIONS, id)
            .await?
            .map(from_doc)
            .transpose()
    }

    pub async fn set_session_contract(&self, id: &str, contract_id: &str) -> Result<()> {
        let patch = into_document(json!({ "contract_id": contract_id }))?;
        self.store.update(SESSIONS, id, patch).await?;
        Ok(())
    }

    pub async fn set_session_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        let patch = into_document(json!({ "status": status }))?;
        self.store.update(SESSIONS, id, patch).await?;
        Ok(())
    }

    /// Sessions ordered by most recent activity.
    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let q = Query::new()
            .order_by("last_activity", Direction::Descending)
            .limit(limit);
        from_docs(self.store.query(SESSIONS, q).await?)
    }

    /// Delete a session and its messages.
    pub async fn delete_session(&self, id: &str) -> Result<bool> {
        for msg in self
            .store
            .query(MESSAGES, Query::new().eq("session_id", id))
            .await?
        {
            if let Some(mid) = msg.get("id").and_then(Value::as_str) {
                self.store.delete(MESSAGES, mid).await?;
            }
        }
        self.store.delete(SESSIONS, id).await
    }

    /// Delete stored sessions whose last activity is older than `days_old`.
    /// Returns how many were removed.
    pub async fn cleanup_old_sessions(&self, days_old: u32) -> Result<usize> {
        let cutoff = format_ts(Utc::now() - Duration::days(i64::from(days_old)));
        let stale = self
            .store
            .query(SESSIONS, Query::new().lt("last_activity", cutoff))
            .await?;
        let mut removed = 0;
        for doc in stale {
            if let Some(id) = doc.get("id").and_then(Value::as_str) {
                if self.delete_session(id).await? {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            info!(removed, days_old, "cleaned up stored sessions");
        }
        Ok(removed)
    }

    // ── Messages ──────────────────────────────────────────────────────────

    /// Append a message and bump the session's activity counters.
    pub async fn add_message(&self, mut message: Message) -> Result<Message> {
        if message.id.is_empty() {
            message.id = new_id();
        }
        if message.created_at.is_empty() {
            message.created_at = now_ts();
        }
        let doc = self
            .store
            .create(MESSAGES, &message.id, to_doc(&message)?)
            .await
            .context("add_message")?;

        if let Some(session) = self.get_session(&message.session_id).await? {
            let patch = into_document(json!({
                "last_activity": message.created_at,
                "message_count": session.message_count + 1,
            }))?;
            self.store.update(SESSIONS, &session.id, patch).await?;
        }
        from_doc(doc)
    }

    pub async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let q = Query::new()
            .eq("session_id", session_id)
            .order_by("created_at", Direction::Ascending);
        from_docs(self.store.query(MESSAGES, q).await?)
    }

    // ── Contracts ─────────────────────────────────────────────────────────

    pub async fn create_contract(&self, mut contract: Contract) -> Result<Contract> {
        if contract.id.is_empty() {
            contract.id = new_id();
        }
        let doc = self
            .store
            .create(CONTRACTS, &contract.id, to_doc(&contract)?)
            .await
            .context("create_contract")?;
        from_doc(doc)
    }

    pub async fn get_contract(&self, id: &str) -> Result<Option<Contract>> {
        self.store
            .get(CONTRACTS, id)
            .await?
            .map(from_doc)
            .transpose()
    }

    /// Raw contract document, including any fields tools have added.
    pub async fn get_contract_raw(&self, id: &str) -> Result<Option<Document>> {
        self.store.get(CONTRACTS, id).await
    }

    pub async fn update_contract(&self, id: &str, patch: Value) -> Result<Contract> {
        let doc = self
            .store
            .update(CONTRACTS, id, into_document(patch)?)
            .await?;
        from_doc(doc)
    }

    pub async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>> {
        let mut q = Query::new().order_by("created_at", Direction::Descending);
        if let Some(s) = &filter.status {
            q = q.eq("status", s.as_str());
        }
        if let Some(t) = &filter.contract_type {
            q = q.eq("contract_type", t.as_str());
        }
        if let Some(n) = filter.limit {
            q = q.limit(n);
        }
        from_docs(self.store.query(CONTRACTS, q).await?)
    }

    /// Remove a contract record and its clauses.
    pub async fn delete_contract(&self, id: &str) -> Result<bool> {
        self.delete_clauses_for_contract(id).await?;
        self.store.delete(CONTRACTS, id).await
    }

    // ── Clauses ───────────────────────────────────────────────────────────

    pub async fn create_clause(&self, mut clause: Clause) -> Result<Clause> {
        if clause.id.is_empty() {
            clause.id = new_id();
        }
        let doc = self
            .store
            .create(CLAUSES, &clause.id, to_doc(&clause)?)
            .await
            .context("create_clause")?;
        from_doc(doc)
    }

    pub async fn get_clause(&self, id: &str) -> Result<Option<Clause>> {
        self.store
            .get(CLAUSES, id)
            .await?
            .map(from_doc)
            .transpose()
    }

    pub async fn update_clause(&self, id: &str, patch: Value) -> Result<Clause> {
        let doc = self
            .store
            .update(CLAUSES, id, into_document(patch)?)
            .await?;
        from_doc(doc)
    }

    /// Clauses of a contract ordered by section number.
    pub async fn get_clauses(&self, contract_id: &str) -> Result<Vec<Clause>> {
        let q = Query::new()
            .eq("contract_id", contract_id)
            .order_by("section_number", Direction::Ascending);
        from_docs(self.store.query(CLAUSES, q).await?)
    }

    pub async fn clauses_by_type(&self, clause_type: &str, limit: usize) -> Result<Vec<Clause>> {
        let q = Query::new().eq("clause_type", clause_type).limit(limit);
        from_docs(self.store.query(CLAUSES, q).await?)
    }

    pub async fn delete_clauses_for_contract(&self, contract_id: &str) -> Result<usize> {
        let clauses = self.get_clauses(contract_id).await?;
        let mut removed = 0;
        for c in &clauses {
            if self.store.delete(CLAUSES, &c.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ── Thinking logs ─────────────────────────────────────────────────────

    pub async fn log_thinking(&self, mut log: ThinkingLog) -> Result<ThinkingLog> {
        if log.id.is_empty() {
            log.id = new_id();
        }
        if log.created_at.is_empty() {
            log.created_at = now_ts();
        }
        let doc = self
            .store
            .create(THINKING_LOGS, &log.id, to_doc(&log)?)
            .await
            .context("log_thinking")?;
        from_doc(doc)
    }

    pub async fn get_thinking_logs(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ThinkingLog>> {
        let mut q = Query::new()
            .eq("session_id", session_id)
            .order_by("created_at", Direction::Ascending);
        if let Some(n) = limit {
            q = q.limit(n);
        }
        from_docs(self.store.query(THINKING_LOGS, q).await?)
    }

    // ── Generated documents ───────────────────────────────────────────────

    pub async fn create_document(&self, mut document: GeneratedDocument) -> Result<GeneratedDocument> {
        if document.id.is_empty() {
            document.id = new_id();
        }
        let doc = self
            .store
            .create(DOCUMENTS, &document.id, to_doc(&document)?)
            .await
            .context("create_document")?;
        from_doc(doc)
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<GeneratedDocument>> {
        self.store
            .get(DOCUMENTS, id)
            .await?
            .map(from_doc)
            .transpose()
    }

    pub async fn list_documents(
        &self,
        session_id: Option<&str>,
        contract_id: Option<&str>,
        document_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<GeneratedDocument>> {
        let mut q = Query::new()
            .order_by("created_at", Direction::Descending)
            .limit(limit);
        if let Some(s) = session_id {
            q = q.eq("session_id", s);
        }
        if let Some(c) = contract_id {
            q = q.eq("contract_id", c);
        }
        if let Some(t) = document_type {
            q = q.eq("document_type", t);
        }
        from_docs(self.store.query(DOCUMENTS, q).await?)
    }
}

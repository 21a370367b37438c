use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use legalmind_core::repo::ContractFilter;
use legalmind_core::tool::{optional_str, optional_usize, required_str, Tool, ToolContext, ToolGroup};
use legalmind_core::{truncate_chars, Contract, Party};

use super::{contract_not_found, failure, load_contract, schema, success};
use crate::extract;

const MAX_CONTENT_CHARS: usize = 50_000;
const DEFAULT_LIST_LIMIT: usize = 20;
const STATUSES: &[&str] = &["uploaded", "pending_analysis", "analyzed"];

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GetContract),
        Arc::new(ListContracts),
        Arc::new(ExtractContractText),
        Arc::new(UpdateContractMetadata),
        Arc::new(SearchContracts),
    ]
}

/// Listing shape: everything but the text and the bulky analysis payloads.
pub fn contract_overview(c: &Contract) -> Value {
    json!({
        "id": c.id,
        "title": c.title,
        "filename": c.filename,
        "contract_type": c.contract_type,
        "parties": c.parties,
        "status": c.status,
        "overall_risk_score": c.overall_risk_score,
        "risk_level": c.risk_level,
        "compliance_status": c.compliance_status,
        "created_at": c.created_at,
    })
}

/// Parties from model or form input: a list of names, a list of
/// `{name, role}` objects, or a comma separated string.
pub fn parse_parties(v: &Value) -> Vec<Party> {
    match v {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(Party::new(s.trim())),
                Value::Object(o) => {
                    let name = o.get("name").and_then(Value::as_str)?.trim();
                    if name.is_empty() {
                        return None;
                    }
                    let mut party = Party::new(name);
                    if let Some(role) = o.get("role").and_then(Value::as_str) {
                        if !role.trim().is_empty() {
                            party.role = role.trim().to_string();
                        }
                    }
                    Some(party)
                }
                _ => None,
            })
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Party::new)
            .collect(),
        _ => Vec::new(),
    }
}

// ── get_contract ─────────────────────────────────────────────────────────

struct GetContract;

#[async_trait]
impl Tool for GetContract {
    fn name(&self) -> &'static str {
        "get_contract"
    }

    fn description(&self) -> &'static str {
        "Get a contract by ID, including its metadata, extracted text and any stored \
         risk and compliance analysis."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({ "contract_id": { "type": "string", "description": "The contract ID" } }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Contract
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(mut contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        let truncated = contract.content.chars().count() > MAX_CONTENT_CHARS;
        if truncated {
            contract.content = truncate_chars(&contract.content, MAX_CONTENT_CHARS);
        }
        Ok(success(json!({
            "contract": contract,
            "content_truncated": truncated,
        })))
    }
}

// ── list_contracts ───────────────────────────────────────────────────────

struct ListContracts;

#[async_trait]
impl Tool for ListContracts {
    fn name(&self) -> &'static str {
        "list_contracts"
    }

    fn description(&self) -> &'static str {
        "List uploaded contracts, newest first, optionally filtered by status or type."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "status": {
                    "type": "string",
                    "description": "Filter by status: uploaded, pending_analysis or analyzed"
                },
                "contract_type": { "type": "string", "description": "Filter by contract type" },
                "limit": { "type": "integer", "description": "Maximum results (default 20)" }
            }),
            &[],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Contract
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let filter = ContractFilter {
            status: optional_str(&args, "status"),
            contract_type: optional_str(&args, "contract_type"),
            limit: Some(optional_usize(&args, "limit").unwrap_or(DEFAULT_LIST_LIMIT)),
        };
        let contracts = ctx.repo.list_contracts(&filter).await?;
        let list: Vec<Value> = contracts.iter().map(contract_overview).collect();
        Ok(success(json!({ "count": list.len(), "contracts": list })))
    }
}

// ── extract_contract_text ────────────────────────────────────────────────

struct ExtractContractText;

#[async_trait]
impl Tool for ExtractContractText {
    fn name(&self) -> &'static str {
        "extract_contract_text"
    }

    fn description(&self) -> &'static str {
        "Return the full text of a contract, extracting it from the uploaded PDF when \
         it has not been extracted yet."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({ "contract_id": { "type": "string", "description": "The contract ID" } }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Contract
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        if !contract.content.trim().is_empty() {
            return Ok(success(json!({
                "contract_id": id,
                "source": "stored",
                "length": contract.content.chars().count(),
                "content": truncate_chars(&contract.content, MAX_CONTENT_CHARS),
            })));
        }
        if contract.file_path.is_empty() {
            return Ok(failure(format!("Contract {id} has no uploaded file")));
        }
        let Some(bytes) = ctx.blobs.get(&contract.file_path).await? else {
            return Ok(failure(format!(
                "File for contract {id} not found in storage"
            )));
        };
        let text = extract::pdf_text(bytes).await?;
        if text.is_empty() {
            return Ok(failure("No text could be extracted from the PDF"));
        }
        ctx.repo
            .update_contract(&id, json!({ "content": text }))
            .await?;
        info!(contract_id = %id, chars = text.len(), "extracted contract text");
        Ok(success(json!({
            "contract_id": id,
            "source": "pdf",
            "length": text.chars().count(),
            "content": truncate_chars(&text, MAX_CONTENT_CHARS),
        })))
    }
}

// ── update_contract_metadata ─────────────────────────────────────────────

struct UpdateContractMetadata;

#[async_trait]
impl Tool for UpdateContractMetadata {
    fn name(&self) -> &'static str {
        "update_contract_metadata"
    }

    fn description(&self) -> &'static str {
        "Save parsed metadata for a contract: type, parties, key dates, summary and status."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "contract_id": { "type": "string", "description": "The contract ID" },
                "contract_type": {
                    "type": "string",
                    "description": "Contract type, e.g. NDA, MSA, SaaS, employment, lease"
                },
                "parties": {
                    "type": "array",
                    "description": "Parties to the contract",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "role": { "type": "string" }
                        }
                    }
                },
                "key_dates": {
                    "type": "array",
                    "description": "Important dates",
                    "items": {
                        "type": "object",
                        "properties": {
                            "date": { "type": "string" },
                            "description": { "type": "string" }
                        }
                    }
                },
                "summary": { "type": "string", "description": "Short plain-language summary" },
                "status": {
                    "type": "string",
                    "description": "uploaded, pending_analysis or analyzed"
                }
            }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Contract
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        if load_contract(ctx, &id).await?.is_none() {
            return Ok(contract_not_found(&id));
        }

        let mut patch = Map::new();
        if let Some(t) = optional_str(&args, "contract_type") {
            patch.insert("contract_type".into(), json!(t));
        }
        if let Some(p) = args.get("parties") {
            let parties = parse_parties(p);
            if !parties.is_empty() {
                patch.insert("parties".into(), serde_json::to_value(parties)?);
            }
        }
        if let Some(dates) = args.get("key_dates").filter(|d| d.is_array()) {
            patch.insert("key_dates".into(), dates.clone());
        }
        if let Some(s) = optional_str(&args, "summary") {
            patch.insert("summary".into(), json!(s));
        }
        if let Some(s) = optional_str(&args, "status") {
            let s = s.to_lowercase();
            if !STATUSES.contains(&s.as_str()) {
                return Ok(failure(format!(
                    "Invalid status '{s}'. Use one of: {}",
                    STATUSES.join(", ")
                )));
            }
            patch.insert("status".into(), json!(s));
        }
        if patch.is_empty() {
            return Ok(failure("No fields to update"));
        }

        let fields: Vec<String> = patch.keys().cloned().collect();
        ctx.repo.update_contract(&id, Value::Object(patch)).await?;
        Ok(success(json!({ "contract_id": id, "updated_fields": fields })))
    }
}

// ── search_contracts ─────────────────────────────────────────────────────

struct SearchContracts;

#[async_trait]
impl Tool for SearchContracts {
    fn name(&self) -> &'static str {
        "search_contracts"
    }

    fn description(&self) -> &'static str {
        "Search contracts by title, type or party name (case-insensitive)."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "query": { "type": "string", "description": "Text to look for" },
                "limit": { "type": "integer", "description": "Maximum results (default 20)" }
            }),
            &["query"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Contract
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let query = required_str(&args, "query")?;
        let limit = optional_usize(&args, "limit").unwrap_or(DEFAULT_LIST_LIMIT);
        let all = ctx.repo.list_contracts(&ContractFilter::default()).await?;
        let hits: Vec<Value> = all
            .iter()
            .filter(|c| matches_query(c, &query))
            .take(limit)
            .map(contract_overview)
            .collect();
        Ok(success(json!({
            "query": query,
            "count": hits.len(),
            "contracts": hits,
        })))
    }
}

pub fn matches_query(c: &Contract, query: &str) -> bool {
    let q = query.to_lowercase();
    c.title.to_lowercase().contains(&q)
        || c
            .contract_type
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains(&q))
        || c.parties.iter().any(|p| p.name.to_lowercase().contains(&q))
}

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use legalmind_core::tool::{
    optional_str, optional_usize, required_str, string_list, Tool, ToolContext, ToolGroup,
};
use legalmind_core::{DocumentType, GeneratedDocument};

use super::{contract_not_found, failure, load_contract, schema, success};
use crate::render::{self, MemoFinding, MemoInput};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GenerateLegalMemo),
        Arc::new(GenerateContractSummary),
        Arc::new(GenerateRiskReport),
        Arc::new(ListGeneratedDocuments),
    ]
}

/// Where the API serves a generated document from.
pub fn download_url(document_id: &str) -> String {
    format!("/api/documents/{document_id}/download")
}

fn stamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

struct NewDocument<'a> {
    id: String,
    document_type: DocumentType,
    title: String,
    contract_id: Option<String>,
    content_summary: Option<String>,
    bytes: Vec<u8>,
    ctx: &'a ToolContext,
}

/// `base`, or `base_2`, `base_3`... when a document with that id exists.
/// Ids carry one-second stamps, so two generations in the same second
/// would otherwise overwrite each other.
async fn free_document_id(ctx: &ToolContext, base: &str) -> Result<String> {
    let mut id = base.to_string();
    let mut n = 1;
    while ctx.repo.get_document(&id).await?.is_some() {
        n += 1;
        id = format!("{base}_{n}");
    }
    if n > 1 {
        warn!(document_id = %id, taken = %base, "document id already in use, suffixed");
    }
    Ok(id)
}

/// Upload the rendered file and record it.
async fn store_document(mut doc: NewDocument<'_>) -> Result<GeneratedDocument> {
    let ctx = doc.ctx;
    doc.id = free_document_id(ctx, &doc.id).await?;
    let key = ctx.layout.document_key(&doc.id);
    let size = doc.bytes.len();
    ctx.blobs.put(&key, doc.bytes, DOCX_CONTENT_TYPE).await?;
    let record = ctx
        .repo
        .create_document(GeneratedDocument {
            id: doc.id.clone(),
            session_id: ctx.session_id.clone(),
            contract_id: doc.contract_id,
            document_type: doc.document_type,
            title: doc.title,
            file_path: key,
            filename: format!("{}.docx", doc.id),
            content_summary: doc.content_summary,
            created_at: String::new(),
        })
        .await?;
    info!(
        document_id = %record.id,
        document_type = record.document_type.as_str(),
        session_id = %ctx.session_id,
        bytes = size,
        "generated document stored"
    );
    Ok(record)
}

fn generated(record: &GeneratedDocument) -> Value {
    success(json!({
        "document_type": record.document_type,
        "document_id": record.id,
        "title": record.title,
        "contract_id": record.contract_id,
        "file_path": record.file_path,
        "download_url": download_url(&record.id),
    }))
}

// ── generate_legal_memo ──────────────────────────────────────────────────

struct GenerateLegalMemo;

#[async_trait]
impl Tool for GenerateLegalMemo {
    fn name(&self) -> &'static str {
        "generate_legal_memo"
    }

    fn description(&self) -> &'static str {
        "Generate a formal legal memorandum as a Word document with executive summary, \
         key findings, detailed analysis and recommendations."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "title": { "type": "string", "description": "Memo title" },
                "subject": { "type": "string", "description": "The RE: line" },
                "analysis": { "type": "string", "description": "Full analysis text" },
                "findings": {
                    "type": "array",
                    "description": "Key findings",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "severity": { "type": "string" }
                        }
                    }
                },
                "recommendations": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Recommended actions"
                },
                "contract_id": { "type": "string", "description": "Related contract, if any" },
                "prepared_by": { "type": "string", "description": "Author (default LegalMind AI)" }
            }),
            &["title", "subject", "analysis"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Document
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let subject = required_str(&args, "subject")?;
        let now = Utc::now();
        let memo = MemoInput {
            title: required_str(&args, "title")?,
            subject: subject.clone(),
            analysis: required_str(&args, "analysis")?,
            findings: args
                .get("findings")
                .and_then(Value::as_array)
                .map(|fs| fs.iter().map(MemoFinding::from_value).collect())
                .unwrap_or_default(),
            recommendations: string_list(&args, "recommendations"),
            prepared_by: optional_str(&args, "prepared_by")
                .unwrap_or_else(|| "LegalMind AI".into()),
            date: now.format("%B %d, %Y").to_string(),
        };
        let bytes = render::legal_memo(&memo)?;
        let record = store_document(NewDocument {
            id: format!("memo_{}_{}", ctx.session_id, stamp()),
            document_type: DocumentType::LegalMemo,
            title: memo.title,
            contract_id: optional_str(&args, "contract_id"),
            content_summary: Some(subject),
            bytes,
            ctx,
        })
        .await?;
        Ok(generated(&record))
    }
}

// ── generate_contract_summary ────────────────────────────────────────────

struct GenerateContractSummary;

#[async_trait]
impl Tool for GenerateContractSummary {
    fn name(&self) -> &'static str {
        "generate_contract_summary"
    }

    fn description(&self) -> &'static str {
        "Generate an executive summary document of a contract from its stored metadata, \
         risk assessment and clauses."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({ "contract_id": { "type": "string", "description": "The contract ID" } }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Document
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        let clauses = ctx.repo.get_clauses(&id).await?;
        let bytes = render::contract_summary(&contract, &clauses)?;
        let record = store_document(NewDocument {
            id: format!("summary_{id}_{}", stamp()),
            document_type: DocumentType::ContractSummary,
            title: format!("Summary: {}", contract.title),
            contract_id: Some(id),
            content_summary: contract.summary.clone(),
            bytes,
            ctx,
        })
        .await?;
        Ok(generated(&record))
    }
}

// ── generate_risk_report ─────────────────────────────────────────────────

struct GenerateRiskReport;

#[async_trait]
impl Tool for GenerateRiskReport {
    fn name(&self) -> &'static str {
        "generate_risk_report"
    }

    fn description(&self) -> &'static str {
        "Generate a risk assessment report document for a contract. Run \
         assess_contract_risk first so the report has findings."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({ "contract_id": { "type": "string", "description": "The contract ID" } }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Document
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        if contract.overall_risk_score.is_none() {
            return Ok(failure(format!(
                "Contract {id} has no risk assessment yet; call assess_contract_risk first"
            )));
        }
        let clauses = ctx.repo.get_clauses(&id).await?;
        let generated_on = Utc::now().format("%B %d, %Y %H:%M UTC").to_string();
        let bytes = render::risk_report(&contract, &clauses, &generated_on)?;
        let record = store_document(NewDocument {
            id: format!("risk_report_{id}_{}", stamp()),
            document_type: DocumentType::RiskReport,
            title: format!("Risk Report: {}", contract.title),
            contract_id: Some(id),
            content_summary: contract
                .risk_level
                .as_ref()
                .map(|level| format!("Overall risk level: {level}")),
            bytes,
            ctx,
        })
        .await?;
        Ok(generated(&record))
    }
}

// ── list_generated_documents ─────────────────────────────────────────────

struct ListGeneratedDocuments;

#[async_trait]
impl Tool for ListGeneratedDocuments {
    fn name(&self) -> &'static str {
        "list_generated_documents"
    }

    fn description(&self) -> &'static str {
        "List documents generated in this session, or for a contract, newest first."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "contract_id": { "type": "string", "description": "Only documents for this contract" },
                "document_type": {
                    "type": "string",
                    "description": "legal_memo, contract_summary or risk_report"
                },
                "limit": { "type": "integer", "description": "Maximum results (default 50)" }
            }),
            &[],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Document
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let contract_id = optional_str(&args, "contract_id");
        // scoped to the session unless a contract is named
        let session_id = contract_id.is_none().then_some(ctx.session_id.as_str());
        let docs = ctx
            .repo
            .list_documents(
                session_id,
                contract_id.as_deref(),
                optional_str(&args, "document_type").as_deref(),
                optional_usize(&args, "limit").unwrap_or(50),
            )
            .await?;
        let list: Vec<Value> = docs
            .iter()
            .map(|d| {
                json!({
                    "id": d.id,
                    "title": d.title,
                    "document_type": d.document_type,
                    "contract_id": d.contract_id,
                    "filename": d.filename,
                    "created_at": d.created_at,
                    "download_url": download_url(&d.id),
                })
            })
            .collect();
        Ok(success(json!({ "count": list.len(), "documents": list })))
    }
}

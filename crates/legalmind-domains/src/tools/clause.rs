use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use legalmind_core::tool::{
    optional_str, optional_usize, required_str, string_list, Tool, ToolContext, ToolGroup,
};
use legalmind_core::{truncate_chars, Clause};

use super::{content_or_stored, contract_not_found, failure, load_contract, schema, success};
use crate::clauses::split_sections;

const RISK_LEVELS: &[&str] = &["low", "medium", "high", "critical"];

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ExtractClauses),
        Arc::new(GetClause),
        Arc::new(GetContractClauses),
        Arc::new(UpdateClauseAnalysis),
        Arc::new(FindSimilarClauses),
    ]
}

fn clause_id_schema() -> Value {
    schema(
        json!({ "clause_id": { "type": "string", "description": "The clause ID" } }),
        &["clause_id"],
    )
}

// ── extract_clauses ──────────────────────────────────────────────────────

struct ExtractClauses;

#[async_trait]
impl Tool for ExtractClauses {
    fn name(&self) -> &'static str {
        "extract_clauses"
    }

    fn description(&self) -> &'static str {
        "Split a contract into its numbered sections and store them as clauses with a \
         detected clause type. Replaces any clauses extracted earlier."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "contract_id": { "type": "string", "description": "The contract ID" },
                "content": {
                    "type": "string",
                    "description": "Contract text (defaults to the stored text)"
                }
            }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Clause
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        let text = content_or_stored(&args, &contract);
        if text.trim().is_empty() {
            return Ok(failure(
                "Contract has no extracted text yet; call extract_contract_text first",
            ));
        }

        let sections = split_sections(&text)?;
        let removed = ctx.repo.delete_clauses_for_contract(&id).await?;
        let mut stored = Vec::with_capacity(sections.len());
        for s in sections {
            let clause = ctx
                .repo
                .create_clause(Clause {
                    id: String::new(),
                    contract_id: id.clone(),
                    clause_type: s.clause_type,
                    title: s.title,
                    content: s.content,
                    section_number: s.section_number,
                    risk_level: "low".into(),
                    risk_score: None,
                    risk_explanation: None,
                    compliance_issues: Vec::new(),
                    recommendations: Vec::new(),
                })
                .await?;
            stored.push(json!({
                "id": clause.id,
                "section_number": clause.section_number,
                "title": clause.title,
                "clause_type": clause.clause_type,
            }));
        }
        info!(contract_id = %id, clauses = stored.len(), replaced = removed, "extracted clauses");
        Ok(success(json!({
            "contract_id": id,
            "clause_count": stored.len(),
            "clauses": stored,
        })))
    }
}

// ── get_clause ───────────────────────────────────────────────────────────

struct GetClause;

#[async_trait]
impl Tool for GetClause {
    fn name(&self) -> &'static str {
        "get_clause"
    }

    fn description(&self) -> &'static str {
        "Get a single clause with its text and analysis."
    }

    fn parameters(&self) -> Value {
        clause_id_schema()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Clause
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "clause_id")?;
        match ctx.repo.get_clause(&id).await? {
            Some(clause) => Ok(success(json!({ "clause": clause }))),
            None => Ok(failure(format!("Clause {id} not found"))),
        }
    }
}

// ── get_contract_clauses ─────────────────────────────────────────────────

struct GetContractClauses;

#[async_trait]
impl Tool for GetContractClauses {
    fn name(&self) -> &'static str {
        "get_contract_clauses"
    }

    fn description(&self) -> &'static str {
        "List the clauses of a contract in section order, optionally only one clause type."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "contract_id": { "type": "string", "description": "The contract ID" },
                "clause_type": {
                    "type": "string",
                    "description": "Only return clauses of this type, e.g. termination"
                }
            }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Clause
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let wanted = optional_str(&args, "clause_type").map(|t| t.to_lowercase());
        let clauses: Vec<Clause> = ctx
            .repo
            .get_clauses(&id)
            .await?
            .into_iter()
            .filter(|c| wanted.as_deref().map_or(true, |t| c.clause_type == t))
            .collect();
        Ok(success(json!({
            "contract_id": id,
            "count": clauses.len(),
            "clauses": clauses,
        })))
    }
}

// ── update_clause_analysis ───────────────────────────────────────────────

struct UpdateClauseAnalysis;

#[async_trait]
impl Tool for UpdateClauseAnalysis {
    fn name(&self) -> &'static str {
        "update_clause_analysis"
    }

    fn description(&self) -> &'static str {
        "Record analysis for a clause: risk level and score, explanation, compliance \
         issues and recommendations."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "clause_id": { "type": "string", "description": "The clause ID" },
                "risk_level": { "type": "string", "description": "low, medium, high or critical" },
                "risk_score": { "type": "integer", "description": "Risk score from 0 to 100" },
                "risk_explanation": { "type": "string", "description": "Why the clause is risky" },
                "compliance_issues": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Compliance problems found in the clause"
                },
                "recommendations": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Suggested changes"
                }
            }),
            &["clause_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Clause
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "clause_id")?;
        if ctx.repo.get_clause(&id).await?.is_none() {
            return Ok(failure(format!("Clause {id} not found")));
        }

        let mut patch = Map::new();
        if let Some(level) = optional_str(&args, "risk_level") {
            let level = level.to_lowercase();
            if !RISK_LEVELS.contains(&level.as_str()) {
                return Ok(failure(format!(
                    "Invalid risk_level '{level}'. Use one of: {}",
                    RISK_LEVELS.join(", ")
                )));
            }
            patch.insert("risk_level".into(), json!(level));
        }
        if let Some(score) = args.get("risk_score").and_then(Value::as_i64) {
            patch.insert("risk_score".into(), json!(score.clamp(0, 100)));
        }
        if let Some(e) = optional_str(&args, "risk_explanation") {
            patch.insert("risk_explanation".into(), json!(e));
        }
        for key in ["compliance_issues", "recommendations"] {
            if args.get(key).is_some() {
                patch.insert(key.into(), json!(string_list(&args, key)));
            }
        }
        if patch.is_empty() {
            return Ok(failure("No fields to update"));
        }

        let fields: Vec<String> = patch.keys().cloned().collect();
        ctx.repo.update_clause(&id, Value::Object(patch)).await?;
        Ok(success(json!({ "clause_id": id, "updated_fields": fields })))
    }
}

// ── find_similar_clauses ─────────────────────────────────────────────────

struct FindSimilarClauses;

#[async_trait]
impl Tool for FindSimilarClauses {
    fn name(&self) -> &'static str {
        "find_similar_clauses"
    }

    fn description(&self) -> &'static str {
        "Find clauses of the same type in other contracts, for comparing wording."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "clause_type": { "type": "string", "description": "Clause type to look for" },
                "exclude_contract_id": {
                    "type": "string",
                    "description": "Contract to leave out, usually the one under review"
                },
                "limit": { "type": "integer", "description": "Maximum results (default 10)" }
            }),
            &["clause_type"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Clause
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let clause_type = required_str(&args, "clause_type")?.to_lowercase();
        let exclude = optional_str(&args, "exclude_contract_id");
        let limit = optional_usize(&args, "limit").unwrap_or(10);

        // over-fetch so the exclusion still leaves `limit` results
        let found = ctx.repo.clauses_by_type(&clause_type, limit * 2 + 10).await?;
        let similar: Vec<Value> = found
            .iter()
            .filter(|c| exclude.as_deref() != Some(c.contract_id.as_str()))
            .take(limit)
            .map(|c| {
                json!({
                    "id": c.id,
                    "contract_id": c.contract_id,
                    "title": c.title,
                    "content": truncate_chars(&c.content, 500),
                    "risk_level": c.risk_level,
                })
            })
            .collect();
        Ok(success(json!({
            "clause_type": clause_type,
            "count": similar.len(),
            "clauses": similar,
        })))
    }
}

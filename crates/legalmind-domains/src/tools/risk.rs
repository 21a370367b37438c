use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use legalmind_core::repo::Repository;
use legalmind_core::tool::{optional_str, required_str, string_list, Tool, ToolContext, ToolGroup};
use legalmind_core::{now_ts, Contract};

use super::{content_or_stored, contract_not_found, failure, load_contract, schema, success};
use crate::risk::{self as scoring, average_nonzero};

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(AssessContractRisk),
        Arc::new(AssessClauseRisk),
        Arc::new(GetContractRiskSummary),
        Arc::new(CompareContractRisks),
    ]
}

/// Score `content` and persist the assessment to the contract. Shared with
/// the REST risk endpoint.
pub async fn assess_contract(repo: &Repository, contract: &Contract, content: &str) -> Result<Value> {
    let report = scoring::assess(content);
    let findings = serde_json::to_value(&report.findings)?;
    repo.update_contract(
        &contract.id,
        json!({
            "overall_risk_score": report.overall_score,
            "risk_level": report.overall_level,
            "risk_findings": findings,
            "risk_assessment_date": now_ts(),
        }),
    )
    .await?;
    info!(
        contract_id = %contract.id,
        score = report.overall_score,
        level = report.overall_level,
        findings = report.findings.len(),
        "risk assessment stored"
    );
    Ok(success(json!({
        "contract_id": contract.id,
        "overall_risk_score": report.overall_score,
        "overall_risk_level": report.overall_level,
        "finding_count": report.findings.len(),
        "findings": findings,
        "recommendations": report.recommendations,
    })))
}

// ── assess_contract_risk ─────────────────────────────────────────────────

struct AssessContractRisk;

#[async_trait]
impl Tool for AssessContractRisk {
    fn name(&self) -> &'static str {
        "assess_contract_risk"
    }

    fn description(&self) -> &'static str {
        "Perform a risk assessment on a contract. Identifies liability risks, unfair \
         terms, IP issues, data risks and more, and stores the overall risk score."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "contract_id": { "type": "string", "description": "The contract ID" },
                "content": {
                    "type": "string",
                    "description": "Contract text to analyze (defaults to the stored text)"
                }
            }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Risk
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        let content = content_or_stored(&args, &contract);
        if content.trim().is_empty() {
            return Ok(failure(
                "Contract has no extracted text yet; call extract_contract_text first",
            ));
        }
        assess_contract(&ctx.repo, &contract, &content).await
    }
}

// ── assess_clause_risk ───────────────────────────────────────────────────

struct AssessClauseRisk;

#[async_trait]
impl Tool for AssessClauseRisk {
    fn name(&self) -> &'static str {
        "assess_clause_risk"
    }

    fn description(&self) -> &'static str {
        "Assess the risk of a single clause and store its risk level, score and explanation."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "clause_id": { "type": "string", "description": "The clause ID" },
                "content": {
                    "type": "string",
                    "description": "Clause text (defaults to the stored clause text)"
                }
            }),
            &["clause_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Risk
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "clause_id")?;
        let Some(clause) = ctx.repo.get_clause(&id).await? else {
            return Ok(failure(format!("Clause {id} not found")));
        };
        let content = optional_str(&args, "content").unwrap_or(clause.content);
        let risk = scoring::assess_clause(&content);
        ctx.repo
            .update_clause(
                &id,
                json!({
                    "risk_level": risk.level,
                    "risk_score": risk.score,
                    "risk_explanation": risk.explanation,
                }),
            )
            .await?;
        Ok(success(json!({
            "clause_id": id,
            "risk_score": risk.score,
            "risk_level": risk.level,
            "risk_factors": risk.factors,
            "explanation": risk.explanation,
        })))
    }
}

// ── get_contract_risk_summary ────────────────────────────────────────────

struct GetContractRiskSummary;

#[async_trait]
impl Tool for GetContractRiskSummary {
    fn name(&self) -> &'static str {
        "get_contract_risk_summary"
    }

    fn description(&self) -> &'static str {
        "Get the stored risk assessment of a contract with the risk distribution of its clauses."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({ "contract_id": { "type": "string", "description": "The contract ID" } }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Risk
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        let clauses = ctx.repo.get_clauses(&id).await?;
        let mut dist = json!({ "low": 0, "medium": 0, "high": 0, "critical": 0 });
        for c in &clauses {
            if let Some(n) = dist.get_mut(c.risk_level.as_str()) {
                *n = json!(n.as_u64().unwrap_or(0) + 1);
            }
        }
        let high = dist["high"].as_u64().unwrap_or(0) + dist["critical"].as_u64().unwrap_or(0);
        Ok(success(json!({
            "contract_id": id,
            "overall_risk_score": contract.overall_risk_score,
            "overall_risk_level": contract.risk_level,
            "assessment_date": contract.risk_assessment_date,
            "clause_count": clauses.len(),
            "risk_distribution": dist,
            "high_risk_clause_count": high,
            "findings": contract.risk_findings.unwrap_or_else(|| json!([])),
        })))
    }
}

// ── compare_contract_risks ───────────────────────────────────────────────

struct CompareContractRisks;

#[async_trait]
impl Tool for CompareContractRisks {
    fn name(&self) -> &'static str {
        "compare_contract_risks"
    }

    fn description(&self) -> &'static str {
        "Compare the stored risk scores of several contracts, highest risk first."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "contract_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Contract IDs to compare"
                }
            }),
            &["contract_ids"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Risk
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let ids = string_list(&args, "contract_ids");
        if ids.is_empty() {
            return Ok(failure("contract_ids must list at least one contract"));
        }

        let mut rows: Vec<(i64, Value)> = Vec::new();
        for id in &ids {
            if let Some(c) = load_contract(ctx, id).await? {
                let score = c.overall_risk_score.unwrap_or(0);
                let findings = c
                    .risk_findings
                    .as_ref()
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                rows.push((
                    score,
                    json!({
                        "contract_id": c.id,
                        "title": c.title,
                        "overall_risk_score": score,
                        "overall_risk_level": c.risk_level.as_deref().unwrap_or("unknown"),
                        "finding_count": findings,
                    }),
                ));
            }
        }
        rows.sort_by(|a, b| b.0.cmp(&a.0));

        let scores: Vec<i64> = rows.iter().map(|(s, _)| *s).collect();
        let contracts: Vec<Value> = rows.into_iter().map(|(_, v)| v).collect();
        Ok(success(json!({
            "count": contracts.len(),
            "average_risk_score": average_nonzero(&scores),
            "highest_risk": contracts.first(),
            "lowest_risk": contracts.last(),
            "contracts": contracts,
        })))
    }
}

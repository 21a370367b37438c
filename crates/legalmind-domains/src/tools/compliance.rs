use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use legalmind_core::repo::Repository;
use legalmind_core::tool::{optional_str, required_str, string_list, Tool, ToolContext, ToolGroup};
use legalmind_core::Contract;

use super::{content_or_stored, contract_not_found, failure, load_contract, schema, success};
use crate::compliance::{self as rules, framework, framework_keys, requirement, FRAMEWORKS};

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CheckCompliance),
        Arc::new(GetComplianceRequirements),
        Arc::new(ListComplianceFrameworks),
        Arc::new(CheckSpecificRequirement),
        Arc::new(GetComplianceRecommendations),
    ]
}

/// Run the keyword checks on `content` and persist the outcome to the
/// contract. Shared with the REST compliance endpoint.
pub async fn check_contract(
    repo: &Repository,
    contract: &Contract,
    content: &str,
    frameworks: &[String],
) -> Result<Value> {
    let report = rules::check(content, frameworks);
    let details = report.frameworks_json();
    repo.update_contract(
        &contract.id,
        json!({
            "compliance_status": report.overall_status.as_str(),
            "compliance_score": report.overall_score,
            "compliance_details": details,
        }),
    )
    .await?;
    info!(
        contract_id = %contract.id,
        score = report.overall_score,
        status = report.overall_status.as_str(),
        "compliance check stored"
    );
    Ok(success(json!({
        "contract_id": contract.id,
        "overall_status": report.overall_status.as_str(),
        "overall_score": report.overall_score,
        "frameworks": details,
    })))
}

// ── check_compliance ─────────────────────────────────────────────────────

struct CheckCompliance;

#[async_trait]
impl Tool for CheckCompliance {
    fn name(&self) -> &'static str {
        "check_compliance"
    }

    fn description(&self) -> &'static str {
        "Check contract compliance against regulatory frameworks (GDPR, HIPAA, CCPA, SOX). \
         Analyzes contract text and identifies compliant, partial and non-compliant areas."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "contract_id": { "type": "string", "description": "The contract ID" },
                "content": {
                    "type": "string",
                    "description": "Contract text to analyze (defaults to the stored text)"
                },
                "frameworks": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Frameworks to check: GDPR, HIPAA, CCPA, SOX (default all)"
                }
            }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Compliance
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
        let frameworks = string_list(&args, "frameworks");
        check_contract(&ctx.repo, &contract, &content, &frameworks).await
    }
}

// ── get_compliance_requirements ──────────────────────────────────────────

struct GetComplianceRequirements;

#[async_trait]
impl Tool for GetComplianceRequirements {
    fn name(&self) -> &'static str {
        "get_compliance_requirements"
    }

    fn description(&self) -> &'static str {
        "Get the requirements and keywords checked for one compliance framework."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "framework": {
                    "type": "string",
                    "description": "Framework name: GDPR, HIPAA, CCPA or SOX"
                }
            }),
            &["framework"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Compliance
    }

    async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value> {
        let name = required_str(&args, "framework")?;
        let Some(fw) = framework(&name) else {
            return Ok(failure(format!(
                "Unknown framework: {name}. Available: {}",
                framework_keys().join(", ")
            )));
        };
        let mut body = serde_json::to_value(fw)?;
        body["framework"] = json!(fw.key);
        Ok(success(body))
    }
}

// ── list_compliance_frameworks ───────────────────────────────────────────

struct ListComplianceFrameworks;

pub fn framework_summaries() -> Vec<Value> {
    FRAMEWORKS
        .iter()
        .map(|f| {
            json!({
                "key": f.key,
                "name": f.name,
                "region": f.region,
                "requirement_count": f.requirements.len(),
            })
        })
        .collect()
}

#[async_trait]
impl Tool for ListComplianceFrameworks {
    fn name(&self) -> &'static str {
        "list_compliance_frameworks"
    }

    fn description(&self) -> &'static str {
        "List the compliance frameworks that can be checked."
    }

    fn parameters(&self) -> Value {
        schema(json!({}), &[])
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Compliance
    }

    async fn call(&self, _ctx: &ToolContext, _args: Value) -> Result<Value> {
        let list = framework_summaries();
        Ok(success(json!({ "count": list.len(), "frameworks": list })))
    }
}

// ── check_specific_requirement ───────────────────────────────────────────

struct CheckSpecificRequirement;

#[async_trait]
impl Tool for CheckSpecificRequirement {
    fn name(&self) -> &'static str {
        "check_specific_requirement"
    }

    fn description(&self) -> &'static str {
        "Check contract text against one compliance requirement, e.g. gdpr_data_breach."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "requirement_id": { "type": "string", "description": "The requirement ID" },
                "content": { "type": "string", "description": "Text to check" },
                "contract_id": {
                    "type": "string",
                    "description": "Contract whose stored text to check when content is omitted"
                }
            }),
            &["requirement_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Compliance
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let req_id = required_str(&args, "requirement_id")?;
        let Some((fw, req)) = requirement(&req_id) else {
            return Ok(failure(format!("Requirement {req_id} not found")));
        };

        let content = match optional_str(&args, "content") {
            Some(c) => c,
            None => {
                let Some(cid) = optional_str(&args, "contract_id") else {
                    return Ok(failure("Provide content or contract_id"));
                };
                match load_contract(ctx, &cid).await? {
                    Some(c) => c.content,
                    None => return Ok(contract_not_found(&cid)),
                }
            }
        };

        let hits = rules::keyword_hits(req, &content.to_lowercase());
        let status = rules::requirement_status(hits, req.keywords.len());
        Ok(success(json!({
            "framework": fw.key,
            "requirement": req,
            "compliance_status": status.as_str(),
            "matched_keywords": hits,
            "total_keywords": req.keywords.len(),
            "recommendation": rules::recommendation_for(req, status),
        })))
    }
}

// ── get_compliance_recommendations ───────────────────────────────────────

struct GetComplianceRecommendations;

#[async_trait]
impl Tool for GetComplianceRecommendations {
    fn name(&self) -> &'static str {
        "get_compliance_recommendations"
    }

    fn description(&self) -> &'static str {
        "Get prioritized recommendations for the compliance gaps found by the last \
         compliance check of a contract."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({ "contract_id": { "type": "string", "description": "The contract ID" } }),
            &["contract_id"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Compliance
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let id = required_str(&args, "contract_id")?;
        let Some(contract) = load_contract(ctx, &id).await? else {
            return Ok(contract_not_found(&id));
        };
        let recs = contract
            .compliance_details
            .as_ref()
            .map(rules::recommendations_from_details)
            .unwrap_or_default();
        let high = recs.iter().filter(|r| r["priority"] == "high").count();
        Ok(success(json!({
            "contract_id": id,
            "count": recs.len(),
            "high_priority_count": high,
            "recommendations": recs,
        })))
    }
}

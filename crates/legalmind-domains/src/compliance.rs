//! Keyword-based regulatory compliance checks.

use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct Requirement {
    pub id: &'static str,
    pub requirement: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct Framework {
    #[serde(skip)]
    pub key: &'static str,
    pub name: &'static str,
    pub region: &'static str,
    pub requirements: &'static [Requirement],
}

const fn req(
    id: &'static str,
    requirement: &'static str,
    description: &'static str,
    keywords: &'static [&'static str],
) -> Requirement {
    Requirement {
        id,
        requirement,
        description,
        keywords,
    }
}

pub const FRAMEWORKS: &[Framework] = &[
    Framework {
        key: "GDPR",
        name: "General Data Protection Regulation",
        region: "EU",
        requirements: &[
            req(
                "gdpr_lawful_basis",
                "Lawful basis for processing",
                "Contract must specify the lawful basis for processing personal data",
                &["lawful basis", "legitimate interest", "consent", "contractual necessity"],
            ),
            req(
                "gdpr_data_subject_rights",
                "Data subject rights",
                "Must include provisions for data subject rights (access, rectification, erasure, etc.)",
                &["right to access", "right to erasure", "data portability", "right to object"],
            ),
            req(
                "gdpr_data_transfers",
                "International data transfers",
                "Must address cross-border data transfers with appropriate safeguards",
                &[
                    "data transfer",
                    "standard contractual clauses",
                    "adequacy decision",
                    "binding corporate rules",
                ],
            ),
            req(
                "gdpr_data_breach",
                "Data breach notification",
                "Must include data breach notification procedures",
                &["data breach", "security incident", "notification", "72 hours"],
            ),
            req(
                "gdpr_dpa",
                "Data Processing Agreement",
                "Must include a DPA when engaging data processors",
                &[
                    "data processing agreement",
                    "processor",
                    "sub-processor",
                    "processing instructions",
                ],
            ),
            req(
                "gdpr_retention",
                "Data retention policy",
                "Must specify data retention periods and deletion procedures",
                &["retention", "deletion", "data minimization", "storage limitation"],
            ),
        ],
    },
    Framework {
        key: "HIPAA",
        name: "Health Insurance Portability and Accountability Act",
        region: "USA",
        requirements: &[
            req(
                "hipaa_phi_definition",
                "PHI definition and scope",
                "Must define Protected Health Information and its handling",
                &["protected health information", "phi", "health data", "medical records"],
            ),
            req(
                "hipaa_baa",
                "Business Associate Agreement",
                "Must include BAA for business associates handling PHI",
                &["business associate", "baa", "covered entity", "subcontractor"],
            ),
            req(
                "hipaa_safeguards",
                "Security safeguards",
                "Must specify administrative, physical, and technical safeguards",
                &["security rule", "safeguards", "encryption", "access controls"],
            ),
            req(
                "hipaa_breach",
                "Breach notification",
                "Must include breach notification requirements",
                &["breach notification", "security incident", "hhs notification"],
            ),
            req(
                "hipaa_minimum_necessary",
                "Minimum necessary standard",
                "Must limit PHI disclosure to minimum necessary",
                &["minimum necessary", "limited disclosure", "need to know"],
            ),
        ],
    },
    Framework {
        key: "CCPA",
        name: "California Consumer Privacy Act",
        region: "California, USA",
        requirements: &[
            req(
                "ccpa_categories",
                "Categories of personal information",
                "Must disclose categories of personal information collected",
                &["categories of information", "personal information", "data collected"],
            ),
            req(
                "ccpa_consumer_rights",
                "Consumer rights",
                "Must respect consumer rights to know, delete, and opt-out",
                &["right to know", "right to delete", "opt-out", "do not sell"],
            ),
            req(
                "ccpa_service_provider",
                "Service provider requirements",
                "Must include service provider contractual requirements",
                &["service provider", "business purpose", "written contract"],
            ),
        ],
    },
    Framework {
        key: "SOX",
        name: "Sarbanes-Oxley Act",
        region: "USA",
        requirements: &[
            req(
                "sox_financial_controls",
                "Internal financial controls",
                "Must address internal controls for financial reporting",
                &["internal controls", "financial reporting", "audit", "compliance"],
            ),
            req(
                "sox_records_retention",
                "Records retention",
                "Must specify records retention requirements",
                &["records retention", "document retention", "audit trail"],
            ),
        ],
    },
];

pub fn framework(key: &str) -> Option<&'static Framework> {
    let key = key.trim().to_uppercase();
    FRAMEWORKS.iter().find(|f| f.key == key)
}

pub fn framework_keys() -> Vec<&'static str> {
    FRAMEWORKS.iter().map(|f| f.key).collect()
}

/// Find a requirement by id across all frameworks.
pub fn requirement(id: &str) -> Option<(&'static Framework, &'static Requirement)> {
    FRAMEWORKS.iter().find_map(|f| {
        f.requirements
            .iter()
            .find(|r| r.id == id)
            .map(|r| (f, r))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "compliant")]
    Compliant,
    #[serde(rename = "partial")]
    Partial,
    #[serde(rename = "non-compliant")]
    NonCompliant,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::Partial => "partial",
            Self::NonCompliant => "non-compliant",
        }
    }
}

/// How many of the requirement's keywords appear in already lower-cased text.
pub fn keyword_hits(requirement: &Requirement, lower: &str) -> usize {
    requirement
        .keywords
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count()
}

/// No hits is non-compliant; fewer than half the keywords is partial.
pub fn requirement_status(hits: usize, total: usize) -> Status {
    if hits == 0 {
        Status::NonCompliant
    } else if (hits as f64) < total as f64 / 2.0 {
        Status::Partial
    } else {
        Status::Compliant
    }
}

pub fn recommendation_for(requirement: &Requirement, status: Status) -> String {
    let name = requirement.requirement;
    match status {
        Status::NonCompliant => format!(
            "Contract does not address {name}. Consider adding relevant provisions."
        ),
        Status::Partial => format!(
            "Contract partially addresses {name}. Consider strengthening the language."
        ),
        Status::Compliant => format!("Contract adequately addresses {name}."),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementResult {
    pub id: &'static str,
    pub requirement: &'static str,
    pub description: &'static str,
    pub status: Status,
    pub matched_keywords: usize,
    pub total_keywords: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkResult {
    pub name: &'static str,
    pub region: &'static str,
    pub requirements: Vec<RequirementResult>,
    pub compliant_count: usize,
    pub non_compliant_count: usize,
    pub partial_count: usize,
    pub overall_status: Status,
}

#[derive(Debug, Clone)]
pub struct ComplianceReport {
    /// Framework key to result, in check order.
    pub frameworks: Vec<(&'static str, FrameworkResult)>,
    pub overall_score: f64,
    pub overall_status: Status,
}

impl ComplianceReport {
    pub fn frameworks_json(&self) -> Value {
        let mut map = Map::new();
        for (key, result) in &self.frameworks {
            map.insert(
                key.to_string(),
                serde_json::to_value(result).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }
}

fn check_framework(fw: &Framework, lower: &str) -> FrameworkResult {
    let mut result = FrameworkResult {
        name: fw.name,
        region: fw.region,
        requirements: Vec::with_capacity(fw.requirements.len()),
        compliant_count: 0,
        non_compliant_count: 0,
        partial_count: 0,
        overall_status: Status::Compliant,
    };
    for r in fw.requirements {
        let hits = keyword_hits(r, lower);
        let status = requirement_status(hits, r.keywords.len());
        match status {
            Status::Compliant => result.compliant_count += 1,
            Status::Partial => result.partial_count += 1,
            Status::NonCompliant => result.non_compliant_count += 1,
        }
        result.requirements.push(RequirementResult {
            id: r.id,
            requirement: r.requirement,
            description: r.description,
            status,
            matched_keywords: hits,
            total_keywords: r.keywords.len(),
        });
    }
    result.overall_status = if result.non_compliant_count == 0 && result.partial_count == 0 {
        Status::Compliant
    } else if result.compliant_count == 0 {
        Status::NonCompliant
    } else {
        Status::Partial
    };
    result
}

/// Check `content` against the named frameworks (all when empty). Unknown
/// framework names are skipped.
pub fn check(content: &str, frameworks: &[String]) -> ComplianceReport {
    let lower = content.to_lowercase();
    let selected: Vec<&'static Framework> = if frameworks.is_empty() {
        FRAMEWORKS.iter().collect()
    } else {
        let mut out = Vec::new();
        for name in frameworks {
            if let Some(fw) = framework(name) {
                if !out.iter().any(|f: &&Framework| f.key == fw.key) {
                    out.push(fw);
                }
            }
        }
        out
    };

    let results: Vec<(&'static str, FrameworkResult)> = selected
        .iter()
        .map(|fw| (fw.key, check_framework(fw, &lower)))
        .collect();

    let total: usize = selected.iter().map(|f| f.requirements.len()).sum();
    let compliant: usize = results.iter().map(|(_, r)| r.compliant_count).sum();
    let score = if total > 0 {
        compliant as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let overall_status = if score >= 80.0 {
        Status::Compliant
    } else if score >= 50.0 {
        Status::Partial
    } else {
        Status::NonCompliant
    };

    ComplianceReport {
        frameworks: results,
        overall_score: round2(score),
        overall_status,
    }
}

/// Gaps recorded in stored `compliance_details`, high priority first.
pub fn recommendations_from_details(details: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    let Some(frameworks) = details.as_object() else {
        return out;
    };
    for (key, fw) in frameworks {
        let Some(reqs) = fw.get("requirements").and_then(Value::as_array) else {
            continue;
        };
        for r in reqs {
            let status = r.get("status").and_then(Value::as_str).unwrap_or_default();
            let priority = match status {
                "non-compliant" => "high",
                "partial" => "medium",
                _ => continue,
            };
            let name = r.get("requirement").and_then(Value::as_str).unwrap_or_default();
            out.push(json!({
                "framework": key,
                "requirement_id": r.get("id").cloned().unwrap_or(Value::Null),
                "requirement": name,
                "description": r.get("description").cloned().unwrap_or(Value::Null),
                "current_status": status,
                "priority": priority,
                "action": format!("Add or strengthen provisions for {name}"),
            }));
        }
    }
    // stable sort keeps framework order within a priority
    out.sort_by_key(|r| if r["priority"] == "high" { 0 } else { 1 });
    out
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

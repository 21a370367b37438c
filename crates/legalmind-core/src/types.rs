use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical timestamp format for stored records. Fixed precision keeps
/// string comparison equal to chronological comparison.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Truncate to at most `max` chars, appending `...` when something was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

// ── Chat ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_activity: String,
    #[serde(default)]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub message_count: i64,
}

/// A web citation returned by search grounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Citation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub created_at: String,
}

/// A reasoning step recorded for the UI; never read back by the chat loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingLog {
    #[serde(default)]
    pub id: String,
    pub session_id: String,
    pub agent_name: String,
    /// Free-form stage label, e.g. "agent_selection" or "tool_call".
    pub stage: String,
    pub thinking: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub created_at: String,
}

// ── Contracts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default = "default_party_role")]
    pub role: String,
}

fn default_party_role() -> String {
    "party".into()
}

impl Party {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: default_party_role(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    #[default]
    Uploaded,
    PendingAnalysis,
    Analyzed,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::PendingAnalysis => "pending_analysis",
            Self::Analyzed => "analyzed",
        }
    }
}

/// Contract record. Analysis fields are written by tools as they run and
/// are kept loosely typed, matching what the tools persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: ContractStatus,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub overall_risk_score: Option<i64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub risk_findings: Option<Value>,
    #[serde(default)]
    pub risk_assessment_date: Option<String>,
    #[serde(default)]
    pub compliance_status: Option<String>,
    #[serde(default)]
    pub compliance_score: Option<f64>,
    #[serde(default)]
    pub compliance_details: Option<Value>,
    #[serde(default)]
    pub key_dates: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Contract {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            filename: String::new(),
            file_path: String::new(),
            contract_type: None,
            parties: Vec::new(),
            notes: None,
            content: String::new(),
            status: ContractStatus::default(),
            session_id: None,
            overall_risk_score: None,
            risk_level: None,
            risk_findings: None,
            risk_assessment_date: None,
            compliance_status: None,
            compliance_score: None,
            compliance_details: None,
            key_dates: None,
            summary: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn party_names(&self) -> Vec<&str> {
        self.parties.iter().map(|p| p.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clause {
    #[serde(default)]
    pub id: String,
    pub contract_id: String,
    pub clause_type: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub section_number: i64,
    #[serde(default = "default_risk_level")]
    pub risk_level: String,
    #[serde(default)]
    pub risk_score: Option<i64>,
    #[serde(default)]
    pub risk_explanation: Option<String>,
    #[serde(default)]
    pub compliance_issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

fn default_risk_level() -> String {
    "low".into()
}

// ── Generated documents ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    LegalMemo,
    ContractSummary,
    RiskReport,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegalMemo => "legal_memo",
            Self::ContractSummary => "contract_summary",
            Self::RiskReport => "risk_report",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    #[serde(default)]
    pub id: String,
    pub session_id: String,
    #[serde(default)]
    pub contract_id: Option<String>,
    pub document_type: DocumentType,
    pub title: String,
    pub file_path: String,
    pub filename: String,
    #[serde(default)]
    pub content_summary: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = chrono::DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + chrono::Duration::milliseconds(1500);
        assert!(format_ts(a) < format_ts(b));
        assert!(format_ts(a).ends_with('Z'));
    }

    #[test]
    fn party_role_defaults() {
        let p: Party = serde_json::from_str(r#"{"name":"Acme"}"#).unwrap();
        assert_eq!(p.role, "party");
    }
}

use serde::{Deserialize, Serialize};

use crate::tool::ToolGroup;

/// The six fixed agents. Serialized with their public ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    #[serde(rename = "CONTRACT_PARSER_AGENT")]
    ContractParser,
    #[serde(rename = "LEGAL_RESEARCH_AGENT")]
    LegalResearch,
    #[serde(rename = "COMPLIANCE_CHECKER_AGENT")]
    ComplianceChecker,
    #[serde(rename = "RISK_ASSESSMENT_AGENT")]
    RiskAssessment,
    #[serde(rename = "LEGAL_MEMO_AGENT")]
    LegalMemo,
    #[serde(rename = "ASSISTANT_AGENT")]
    Assistant,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::ContractParser,
        AgentKind::LegalResearch,
        AgentKind::ComplianceChecker,
        AgentKind::RiskAssessment,
        AgentKind::LegalMemo,
        AgentKind::Assistant,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::ContractParser => "CONTRACT_PARSER_AGENT",
            Self::LegalResearch => "LEGAL_RESEARCH_AGENT",
            Self::ComplianceChecker => "COMPLIANCE_CHECKER_AGENT",
            Self::RiskAssessment => "RISK_ASSESSMENT_AGENT",
            Self::LegalMemo => "LEGAL_MEMO_AGENT",
            Self::Assistant => "ASSISTANT_AGENT",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }
}

/// A prompt template plus the tools it may call.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub kind: AgentKind,
    pub name: &'static str,
    pub description: &'static str,
    pub instructions: &'static str,
    pub tool_groups: Vec<ToolGroup>,
    pub search_grounding: bool,
    pub temperature: f32,
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub agent: AgentKind,
    pub confidence: f32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub agents: Vec<AgentKind>,
}

/// Agent profiles, query routing and workflow templates.
pub trait AgentCatalog: Send + Sync {
    fn profile(&self, kind: AgentKind) -> &AgentProfile;
    fn profiles(&self) -> &[AgentProfile];
    /// Pick an agent for a user message.
    fn classify(&self, text: &str) -> Selection;
    fn workflow(&self, name: &str) -> Option<&WorkflowTemplate>;
    fn workflows(&self) -> &[WorkflowTemplate];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id_and_serde() {
        for kind in AgentKind::ALL {
            assert_eq!(AgentKind::from_id(kind.id()), Some(kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.id());
        }
        assert_eq!(AgentKind::from_id("NOPE"), None);
    }
}

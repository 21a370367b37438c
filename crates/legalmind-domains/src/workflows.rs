use legalmind_core::agent::{AgentKind, WorkflowTemplate};

use AgentKind::{Assistant, ComplianceChecker, ContractParser, LegalMemo, RiskAssessment};

fn template(
    name: &'static str,
    description: &'static str,
    agents: &[AgentKind],
) -> WorkflowTemplate {
    WorkflowTemplate {
        name,
        description,
        agents: agents.to_vec(),
    }
}

pub fn all_workflows() -> Vec<WorkflowTemplate> {
    vec![
        template(
            "full_review",
            "Parse the contract, assess its risks and write a legal memo",
            &[ContractParser, RiskAssessment, LegalMemo],
        ),
        template(
            "compliance_review",
            "Parse the contract, check regulatory compliance and write a legal memo",
            &[ContractParser, ComplianceChecker, LegalMemo],
        ),
        template(
            "risk_assessment",
            "Parse the contract and assess its risks",
            &[ContractParser, RiskAssessment],
        ),
        template(
            "quick_summary",
            "Parse the contract and summarize it",
            &[ContractParser, Assistant],
        ),
    ]
}

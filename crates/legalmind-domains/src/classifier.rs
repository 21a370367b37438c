use legalmind_core::agent::{AgentKind, Selection};

const KEYWORD_CONFIDENCE: f32 = 0.9;
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Checked in order; the first list with a hit wins.
const ROUTES: &[(AgentKind, &str, &[&str])] = &[
    (
        AgentKind::LegalMemo,
        "document generation",
        &[
            "memo",
            "memorandum",
            "generate a report",
            "draft a",
            "write a summary",
            "create a document",
            "generate document",
            "report",
        ],
    ),
    (
        AgentKind::ComplianceChecker,
        "compliance",
        &[
            "gdpr",
            "hipaa",
            "ccpa",
            "sox",
            "compliance",
            "compliant",
            "regulation",
            "regulatory",
            "data protection",
            "privacy law",
        ],
    ),
    (
        AgentKind::RiskAssessment,
        "risk",
        &[
            "risk",
            "liability",
            "liabilities",
            "exposure",
            "dangerous",
            "red flag",
            "unfavorable",
            "indemnif",
            "one-sided",
        ],
    ),
    (
        AgentKind::ContractParser,
        "contract parsing",
        &[
            "parse",
            "extract",
            "clause",
            "parties",
            "key terms",
            "key dates",
            "structure",
            "sections",
            "break down",
            "obligations",
        ],
    ),
    (
        AgentKind::LegalResearch,
        "legal research",
        &[
            "case law",
            "precedent",
            "statute",
            "legal research",
            "court",
            "ruling",
            "jurisdiction",
            "research",
            "legislation",
        ],
    ),
];

/// Route a user message to an agent by keyword.
pub fn classify(text: &str) -> Selection {
    let lower = text.to_lowercase();
    for (agent, topic, keywords) in ROUTES {
        if let Some(kw) = keywords.iter().find(|kw| lower.contains(*kw)) {
            return Selection {
                agent: *agent,
                confidence: KEYWORD_CONFIDENCE,
                reason: format!("{topic} keyword '{kw}' matched"),
            };
        }
    }
    Selection {
        agent: AgentKind::Assistant,
        confidence: DEFAULT_CONFIDENCE,
        reason: "no specialized keywords, using general assistant".into(),
    }
}

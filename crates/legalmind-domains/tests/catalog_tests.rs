use std::collections::HashSet;

use legalmind_core::agent::{AgentCatalog, AgentKind};
use legalmind_core::tool::ToolGroup;
use legalmind_domains::{default_registry, LegalCatalog};

#[test]
fn every_agent_kind_has_a_profile() {
    let catalog = LegalCatalog::new();
    assert_eq!(catalog.profiles().len(), AgentKind::ALL.len());
    for kind in AgentKind::ALL {
        let p = catalog.profile(kind);
        assert_eq!(p.kind, kind);
        assert!(!p.instructions.is_empty());
        assert!(!p.tool_groups.is_empty());
    }
}

#[test]
fn only_the_researcher_uses_search() {
    let catalog = LegalCatalog::new();
    let grounded: Vec<AgentKind> = catalog
        .profiles()
        .iter()
        .filter(|p| p.search_grounding)
        .map(|p| p.kind)
        .collect();
    assert_eq!(grounded, vec![AgentKind::LegalResearch]);
}

#[test]
fn agent_names_match_the_public_table() {
    let catalog = LegalCatalog::new();
    let names: Vec<&str> = AgentKind::ALL
        .iter()
        .map(|k| catalog.profile(*k).name)
        .collect();
    assert_eq!(
        names,
        vec![
            "Contract Parser",
            "Legal Researcher",
            "Compliance Checker",
            "Risk Assessor",
            "Legal Memo Writer",
            "Legal Assistant",
        ]
    );
}

#[test]
fn every_granted_group_has_tools() {
    let catalog = LegalCatalog::new();
    let registry = default_registry();
    for p in catalog.profiles() {
        for g in &p.tool_groups {
            assert!(
                !registry.in_group(*g).is_empty(),
                "{} grants empty group {}",
                p.name,
                g.as_str()
            );
        }
    }
}

#[test]
fn tool_names_are_unique_and_declared() {
    let registry = default_registry();
    let names = registry.names();
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(names.len(), 26);

    let all_groups = [
        ToolGroup::Contract,
        ToolGroup::Clause,
        ToolGroup::Compliance,
        ToolGroup::Risk,
        ToolGroup::Document,
        ToolGroup::Logging,
    ];
    for decl in registry.declarations(&all_groups) {
        assert_eq!(decl.parameters["type"], "object", "{}", decl.name);
        assert!(!decl.description.is_empty());
    }
}

#[test]
fn parser_gets_contract_and_clause_tools_only() {
    let catalog = LegalCatalog::new();
    let registry = default_registry();
    let decls = registry.declarations(&catalog.profile(AgentKind::ContractParser).tool_groups);
    let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"extract_clauses"));
    assert!(names.contains(&"log_thinking"));
    assert!(!names.contains(&"assess_contract_risk"));
    assert!(!names.contains(&"generate_legal_memo"));
}

#[test]
fn workflows_are_fixed_sequences() {
    let catalog = LegalCatalog::new();
    let names: Vec<&str> = catalog.workflows().iter().map(|w| w.name).collect();
    assert_eq!(
        names,
        vec!["full_review", "compliance_review", "risk_assessment", "quick_summary"]
    );
    let full = catalog.workflow("full_review").unwrap();
    assert_eq!(
        full.agents,
        vec![
            AgentKind::ContractParser,
            AgentKind::RiskAssessment,
            AgentKind::LegalMemo
        ]
    );
    assert!(catalog.workflow("nope").is_none());
}

#[test]
fn classifier_routes_by_keyword_order() {
    let catalog = LegalCatalog::new();
    let cases = [
        ("Please draft a memorandum on this NDA", AgentKind::LegalMemo),
        ("Is this contract GDPR compliant?", AgentKind::ComplianceChecker),
        ("What are the liability exposures here?", AgentKind::RiskAssessment),
        ("Extract the key dates and parties", AgentKind::ContractParser),
        ("Find case law on non-compete enforceability", AgentKind::LegalResearch),
        ("Hi, what can you do?", AgentKind::Assistant),
        // compliance is checked before risk
        ("Any regulatory risk in this?", AgentKind::ComplianceChecker),
    ];
    for (text, expected) in cases {
        let s = catalog.classify(text);
        assert_eq!(s.agent, expected, "{text}");
    }
    let hit = catalog.classify("any red flag?");
    assert_eq!(hit.confidence, 0.9);
    assert!(hit.reason.contains("red flag"));
}

// Scoring rules for compliance and risk, and the clause splitter.

use serde_json::json;

use legalmind_domains::clauses::split_sections;
use legalmind_domains::compliance::{self, Status};
use legalmind_domains::risk;

// ── compliance ───────────────────────────────────────────────────────────────

#[test]
fn requirement_status_thresholds() {
    assert_eq!(compliance::requirement_status(0, 4), Status::NonCompliant);
    assert_eq!(compliance::requirement_status(1, 4), Status::Partial);
    assert_eq!(compliance::requirement_status(2, 4), Status::Compliant);
    // 1 of 3 is below half
    assert_eq!(compliance::requirement_status(1, 3), Status::Partial);
    assert_eq!(compliance::requirement_status(2, 3), Status::Compliant);
}

#[test]
fn sox_fully_covered_scores_one_hundred() {
    let text = "The company maintains internal controls over financial reporting, \
                subject to annual audit. Records retention and document retention \
                follow policy, with a complete audit trail.";
    let report = compliance::check(text, &["sox".to_string()]);
    assert_eq!(report.frameworks.len(), 1);
    let (key, sox) = &report.frameworks[0];
    assert_eq!(*key, "SOX");
    assert_eq!(sox.compliant_count, 2);
    assert_eq!(sox.overall_status, Status::Compliant);
    assert_eq!(report.overall_score, 100.0);
    assert_eq!(report.overall_status, Status::Compliant);
}

#[test]
fn empty_text_is_non_compliant_everywhere() {
    let report = compliance::check("", &[]);
    assert_eq!(report.frameworks.len(), 4);
    assert_eq!(report.overall_score, 0.0);
    assert_eq!(report.overall_status, Status::NonCompliant);
    for (_, fw) in &report.frameworks {
        assert_eq!(fw.overall_status, Status::NonCompliant);
        assert_eq!(fw.compliant_count, 0);
    }
}

#[test]
fn unknown_frameworks_are_skipped() {
    let report = compliance::check("consent", &["PCI".into(), "gdpr".into(), "GDPR".into()]);
    let keys: Vec<&str> = report.frameworks.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec!["GDPR"]);
}

#[test]
fn mixed_framework_is_partial_and_score_is_rounded() {
    // GDPR: lawful basis (2/4 compliant), breach (1/4 partial), rest missing
    let text = "Processing relies on consent and legitimate interest. \
                Any data breach must be reported.";
    let report = compliance::check(text, &["GDPR".into()]);
    let gdpr = &report.frameworks[0].1;
    assert_eq!(gdpr.compliant_count, 1);
    assert_eq!(gdpr.partial_count, 1);
    assert_eq!(gdpr.non_compliant_count, 4);
    assert_eq!(gdpr.overall_status, Status::Partial);
    assert_eq!(report.overall_score, 16.67);
}

#[test]
fn recommendations_put_missing_requirements_first() {
    let details = json!({
        "GDPR": {
            "requirements": [
                { "id": "gdpr_a", "requirement": "A", "description": "a", "status": "partial" },
                { "id": "gdpr_b", "requirement": "B", "description": "b", "status": "compliant" },
                { "id": "gdpr_c", "requirement": "C", "description": "c", "status": "non-compliant" }
            ]
        }
    });
    let recs = compliance::recommendations_from_details(&details);
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["requirement_id"], "gdpr_c");
    assert_eq!(recs[0]["priority"], "high");
    assert_eq!(recs[1]["priority"], "medium");
    assert_eq!(recs[1]["action"], "Add or strengthen provisions for A");
}

// ── risk ─────────────────────────────────────────────────────────────────────

#[test]
fn severity_and_level_bands() {
    assert_eq!(risk::severity(50), "critical");
    assert_eq!(risk::severity(30), "high");
    assert_eq!(risk::severity(15), "medium");
    assert_eq!(risk::severity(10), "low");
    assert_eq!(risk::risk_level(75), "critical");
    assert_eq!(risk::risk_level(50), "high");
    assert_eq!(risk::risk_level(25), "medium");
    assert_eq!(risk::risk_level(24), "low");
}

#[test]
fn matches_are_capped_at_three_per_indicator() {
    let text = "Unlimited liability for all damages, including consequential damages, \
                punitive damages, with no cap.";
    let report = risk::assess(text);
    let liability = report
        .findings
        .iter()
        .find(|f| f.risk_type == "high_liability")
        .unwrap();
    assert_eq!(liability.matches.len(), 5);
    assert_eq!(liability.score, 75);
    assert_eq!(liability.severity, "critical");
    assert_eq!(report.overall_score, 75);
    assert_eq!(report.overall_level, "critical");
    assert_eq!(report.recommendations[0].action, "Negotiate liability caps");
    assert_eq!(report.recommendations[0].priority, "high");
}

#[test]
fn overall_score_is_capped_at_one_hundred() {
    let text = "unlimited liability, all damages, no cap. automatic renewal, termination fee, \
                penalty for termination. sole discretion, unilateral, non-negotiable.";
    let report = risk::assess(text);
    assert_eq!(report.overall_score, 100);
    assert_eq!(report.findings.len(), 3);
}

#[test]
fn clean_text_has_no_findings() {
    let report = risk::assess("The parties agree to cooperate in good faith.");
    assert!(report.findings.is_empty());
    assert_eq!(report.overall_score, 0);
    assert_eq!(report.overall_level, "low");
}

#[test]
fn match_context_surrounds_the_pattern() {
    let text = format!("{}Binding Arbitration applies.{}", "x".repeat(150), "y".repeat(150));
    let report = risk::assess(&text);
    let ctx = &report.findings[0].matches[0].context;
    assert!(ctx.starts_with("..."));
    assert!(ctx.contains("Binding Arbitration"));
    // 100 before + pattern + 100 after, plus the dots
    assert_eq!(ctx.len(), 100 + "binding arbitration".len() + 100 + 6);
}

#[test]
fn non_ascii_text_does_not_split_characters() {
    let text = format!("{}sole discretion{}", "é".repeat(80), "ü".repeat(80));
    let report = risk::assess(&text);
    assert_eq!(report.findings.len(), 1);
}

#[test]
fn clause_scoring_counts_each_indicator_once() {
    let risk = risk::assess_clause("Provided as is with no warranty, at our sole discretion.");
    // missing_protection 25/2 + one_sided 20/2
    assert_eq!(risk.score, 22);
    assert_eq!(risk.level, "low");
    assert_eq!(risk.factors.len(), 2);
    assert_eq!(
        risk.explanation,
        "One-sided or unfair terms; Missing standard protections"
    );

    let clean = risk::assess_clause("Payment is due in 30 days.");
    assert_eq!(clean.score, 0);
    assert_eq!(clean.explanation, "No significant risks identified");
}

#[test]
fn average_ignores_unscored_contracts() {
    assert_eq!(risk::average_nonzero(&[80, 0, 45]), 62.5);
    assert_eq!(risk::average_nonzero(&[0, 0]), 0.0);
    assert_eq!(risk::average_nonzero(&[10, 20, 20]), 16.67);
}

// ── clause splitter ──────────────────────────────────────────────────────────

const SAMPLE: &str = "MUTUAL NON-DISCLOSURE AGREEMENT
This agreement is made between Acme Corp and Globex Inc.

1. Definitions
\"Confidential Information\" means any non-public information.

2. Confidentiality Obligations
Each party shall keep Confidential Information secret.
1. it shall not disclose it to third parties.

3. Term and Termination
Either party may terminate on 30 days notice.

Section 4: Governing Law
This agreement is governed by the laws of Delaware.
";

#[test]
fn splits_numbered_and_section_headings() {
    let sections = split_sections(SAMPLE).unwrap();
    let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Preamble",
            "Definitions",
            "Confidentiality Obligations",
            "Term and Termination",
            "Governing Law"
        ]
    );
    let numbers: Vec<i64> = sections.iter().map(|s| s.section_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

    let types: Vec<&str> = sections.iter().map(|s| s.clause_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "confidentiality",
            "definitions",
            "confidentiality",
            "termination",
            "governing_law"
        ]
    );
    // lower-case list item stays inside its clause
    assert!(sections[2].content.contains("shall not disclose"));
}

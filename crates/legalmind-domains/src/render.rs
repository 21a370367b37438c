//! `.docx` rendering for memos, contract summaries and risk reports.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use docx_rs::*;
use serde_json::Value;

use legalmind_core::{truncate_chars, Clause, Contract};

const TITLE_SIZE: usize = 32;
const HEADING_SIZE: usize = 26;
const BODY_SIZE: usize = 22;
const SMALL_SIZE: usize = 18;

const DISCLAIMER: &str = "This memorandum is provided for informational purposes only and \
does not constitute legal advice. Consult a licensed attorney before acting on its contents.";

/// Collects paragraphs so section code reads top to bottom.
struct DocBuilder {
    paragraphs: Vec<Paragraph>,
}

impl DocBuilder {
    fn new() -> Self {
        Self {
            paragraphs: Vec::new(),
        }
    }

    fn push(&mut self, p: Paragraph) {
        self.paragraphs.push(p);
    }

    fn banner(&mut self, text: &str) {
        self.push(
            Paragraph::new()
                .add_run(Run::new().add_text(text).size(TITLE_SIZE).bold())
                .align(AlignmentType::Center),
        );
    }

    fn centered(&mut self, text: &str) {
        self.push(
            Paragraph::new()
                .add_run(Run::new().add_text(text).size(HEADING_SIZE))
                .align(AlignmentType::Center),
        );
    }

    fn heading(&mut self, text: &str) {
        self.push(Paragraph::new().add_run(Run::new().add_text(text).size(HEADING_SIZE).bold()));
    }

    fn text(&mut self, text: &str) {
        self.push(Paragraph::new().add_run(Run::new().add_text(text).size(BODY_SIZE)));
    }

    fn labeled(&mut self, label: &str, value: &str) {
        self.push(
            Paragraph::new()
                .add_run(Run::new().add_text(label).size(BODY_SIZE).bold())
                .add_run(Run::new().add_text(value).size(BODY_SIZE)),
        );
    }

    fn indented(&mut self, text: &str) {
        self.push(
            Paragraph::new()
                .add_run(Run::new().add_text(text).size(BODY_SIZE))
                .indent(Some(400), None, None, None),
        );
    }

    fn note(&mut self, text: &str) {
        self.push(Paragraph::new().add_run(Run::new().add_text(text).size(SMALL_SIZE).italic()));
    }

    fn blank(&mut self) {
        self.push(Paragraph::new());
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut docx = Docx::new();
        for p in self.paragraphs {
            docx = docx.add_paragraph(p);
        }
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        docx.build()
            .pack(&mut cursor)
            .map_err(|e| anyhow!("failed to build docx: {e}"))?;
        Ok(bytes)
    }
}

fn title_case(s: &str) -> String {
    s.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn str_field<'a>(v: &'a Value, key: &str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or_default()
}

// ── Legal memo ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoFinding {
    pub title: String,
    pub description: String,
    pub severity: String,
}

impl MemoFinding {
    /// Accepts `{title, description, severity}` objects or bare strings.
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::String(s) => Self {
                description: s.clone(),
                ..Self::default()
            },
            _ => Self {
                title: str_field(v, "title").to_string(),
                description: str_field(v, "description").to_string(),
                severity: str_field(v, "severity").to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoInput {
    pub title: String,
    pub subject: String,
    pub analysis: String,
    pub findings: Vec<MemoFinding>,
    pub recommendations: Vec<String>,
    pub prepared_by: String,
    /// Already formatted, e.g. "March 04, 2026".
    pub date: String,
}

pub fn legal_memo(memo: &MemoInput) -> Result<Vec<u8>> {
    let mut doc = DocBuilder::new();
    doc.banner("CONFIDENTIAL LEGAL MEMORANDUM");
    doc.centered(&memo.title);
    doc.blank();

    doc.labeled("TO: ", "Legal Review");
    doc.labeled("FROM: ", &memo.prepared_by);
    doc.labeled("DATE: ", &memo.date);
    doc.labeled("RE: ", &memo.subject);
    doc.blank();

    doc.heading("EXECUTIVE SUMMARY");
    doc.text(&truncate_chars(&memo.analysis, 500));
    doc.blank();

    if !memo.findings.is_empty() {
        doc.heading("KEY FINDINGS");
        for (i, f) in memo.findings.iter().enumerate() {
            let title = if f.title.is_empty() { "Finding" } else { &f.title };
            doc.push(
                Paragraph::new()
                    .add_run(Run::new().add_text(format!("{}. {title}", i + 1)).size(BODY_SIZE).bold()),
            );
            if !f.description.is_empty() {
                doc.indented(&f.description);
            }
            if !f.severity.is_empty() {
                doc.push(
                    Paragraph::new()
                        .add_run(Run::new().add_text("Severity: ").size(BODY_SIZE).bold())
                        .add_run(Run::new().add_text(f.severity.to_uppercase()).size(BODY_SIZE))
                        .indent(Some(400), None, None, None),
                );
            }
        }
        doc.blank();
    }

    doc.heading("DETAILED ANALYSIS");
    for para in memo.analysis.split("\n\n").filter(|p| !p.trim().is_empty()) {
        doc.text(para.trim());
    }
    doc.blank();

    if !memo.recommendations.is_empty() {
        doc.heading("RECOMMENDATIONS");
        for (i, r) in memo.recommendations.iter().enumerate() {
            doc.text(&format!("{}. {r}", i + 1));
        }
        doc.blank();
    }

    doc.note(DISCLAIMER);
    doc.finish()
}

// ── Contract summary ─────────────────────────────────────────────────────

pub fn contract_summary(contract: &Contract, clauses: &[Clause]) -> Result<Vec<u8>> {
    let na = "N/A";
    let mut doc = DocBuilder::new();
    doc.banner("CONTRACT SUMMARY");
    doc.centered(&contract.title);
    doc.blank();

    doc.heading("Contract Information");
    doc.labeled("Title: ", &contract.title);
    doc.labeled("Type: ", contract.contract_type.as_deref().unwrap_or(na));
    doc.labeled("Status: ", contract.status.as_str());
    doc.labeled("Risk Level: ", contract.risk_level.as_deref().unwrap_or(na));
    doc.labeled("Compliance: ", contract.compliance_status.as_deref().unwrap_or(na));
    doc.blank();

    if !contract.parties.is_empty() {
        doc.heading("Parties");
        for p in &contract.parties {
            doc.indented(&format!("• {} ({})", p.name, p.role));
        }
        doc.blank();
    }

    if let Some(dates) = contract.key_dates.as_ref().and_then(Value::as_array) {
        if !dates.is_empty() {
            doc.heading("Key Dates");
            for d in dates {
                let line = match d {
                    Value::String(s) => format!("• {s}"),
                    _ => format!("• {}: {}", str_field(d, "date"), str_field(d, "description")),
                };
                doc.indented(&line);
            }
            doc.blank();
        }
    }

    if let Some(summary) = contract.summary.as_deref().filter(|s| !s.is_empty()) {
        doc.heading("Summary");
        doc.text(summary);
        doc.blank();
    }

    if let Some(score) = contract.overall_risk_score {
        doc.heading("Risk Assessment");
        doc.text(&format!(
            "Overall Risk Score: {score}/100 ({})",
            contract.risk_level.as_deref().unwrap_or("unknown")
        ));
        if let Some(findings) = contract.risk_findings.as_ref().and_then(Value::as_array) {
            if !findings.is_empty() {
                doc.labeled("Key Risk Findings:", "");
                for f in findings.iter().take(5) {
                    doc.indented(&format!(
                        "• {}: {}",
                        title_case(str_field(f, "risk_type")),
                        str_field(f, "description")
                    ));
                }
            }
        }
        doc.blank();
    }

    if !clauses.is_empty() {
        doc.heading("Clause Summary");
        let mut by_type: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for c in clauses {
            let entry = by_type.entry(c.clause_type.as_str()).or_default();
            entry.0 += 1;
            if matches!(c.risk_level.as_str(), "high" | "critical") {
                entry.1 += 1;
            }
        }
        for (clause_type, (count, high)) in by_type {
            doc.labeled(&format!("{}: ", title_case(clause_type)), "");
            doc.indented(&format!("Count: {count} | High Risk: {high}"));
        }
    }

    doc.finish()
}

// ── Risk report ──────────────────────────────────────────────────────────

pub fn risk_report(contract: &Contract, clauses: &[Clause], generated: &str) -> Result<Vec<u8>> {
    let mut doc = DocBuilder::new();
    doc.banner("RISK ASSESSMENT REPORT");
    doc.centered(&format!("Contract: {}", contract.title));
    doc.centered(&format!("Generated: {generated}"));
    doc.blank();

    let score = contract.overall_risk_score.unwrap_or(0);
    let level = contract.risk_level.as_deref().unwrap_or("unknown");
    doc.heading("Risk Score Summary");
    doc.push(
        Paragraph::new()
            .add_run(
                Run::new()
                    .add_text(format!("Overall Risk Score: {score}/100"))
                    .size(BODY_SIZE)
                    .bold(),
            )
            .add_run(Run::new().add_text(format!(" ({})", level.to_uppercase())).size(BODY_SIZE)),
    );
    doc.blank();

    let mut dist = [0usize; 4];
    for c in clauses {
        match c.risk_level.as_str() {
            "medium" => dist[1] += 1,
            "high" => dist[2] += 1,
            "critical" => dist[3] += 1,
            _ => dist[0] += 1,
        }
    }
    doc.heading("Clause Risk Distribution");
    for (label, n) in ["Low", "Medium", "High", "Critical"].iter().zip(dist) {
        doc.indented(&format!("{label}: {n}"));
    }
    doc.blank();

    let findings: Vec<Value> = contract
        .risk_findings
        .as_ref()
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if !findings.is_empty() {
        doc.heading("Risk Findings");
        for f in &findings {
            doc.labeled(&title_case(str_field(f, "risk_type")), "");
            doc.indented(str_field(f, "description"));
            doc.indented(&format!(
                "Score Impact: {} | Severity: {}",
                f.get("score").and_then(Value::as_i64).unwrap_or(0),
                str_field(f, "severity").to_uppercase()
            ));
            if let Some(matches) = f.get("matches").and_then(Value::as_array) {
                if !matches.is_empty() {
                    doc.indented("Matching Text:");
                    for m in matches.iter().take(3) {
                        let context: String = str_field(m, "context").chars().take(200).collect();
                        doc.indented(&format!("  • \"{}\" - {context}", str_field(m, "pattern")));
                    }
                }
            }
        }
        doc.blank();
    }

    let high: Vec<&Clause> = clauses
        .iter()
        .filter(|c| matches!(c.risk_level.as_str(), "high" | "critical"))
        .collect();
    if !high.is_empty() {
        doc.heading("High Risk Clauses");
        for c in high {
            doc.labeled(
                &format!("Section {}: {}", c.section_number, title_case(&c.clause_type)),
                "",
            );
            doc.indented(&format!("Risk Level: {}", c.risk_level.to_uppercase()));
            if let Some(expl) = c.risk_explanation.as_deref() {
                doc.indented(&format!("Risk Explanation: {expl}"));
            }
            doc.indented(&truncate_chars(&c.content, 500));
        }
        doc.blank();
    }

    doc.heading("Recommendations");
    doc.text("Based on the risk assessment, the following actions are recommended:");
    let mut n = 0;
    for f in &findings {
        if matches!(str_field(f, "severity"), "high" | "critical") {
            n += 1;
            doc.text(&format!(
                "{n}. Address {} issues",
                str_field(f, "risk_type").replace('_', " ")
            ));
        }
    }
    if n == 0 {
        doc.text("No high or critical risks were identified.");
    }

    doc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_splits_underscores() {
        assert_eq!(title_case("high_liability"), "High Liability");
        assert_eq!(title_case("limitation of liability"), "Limitation Of Liability");
    }

    #[test]
    fn memo_renders_a_zip_container() {
        let memo = MemoInput {
            title: "NDA review".into(),
            subject: "Confidentiality scope".into(),
            analysis: "The NDA is mutual.\n\nTerm is two years.".into(),
            findings: vec![MemoFinding::from_value(&serde_json::json!({
                "title": "Broad definition",
                "description": "Confidential information is not limited",
                "severity": "medium"
            }))],
            recommendations: vec!["Narrow the definition".into()],
            prepared_by: "LegalMind AI".into(),
            date: "January 01, 2026".into(),
        };
        let bytes = legal_memo(&memo).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}

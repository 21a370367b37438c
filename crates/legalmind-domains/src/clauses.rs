//! Split contract text into numbered sections and guess each clause's type.

use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;

/// `1. Definitions`, `12.3 Payment`, `ARTICLE IV - Term`, `Section 5: Notices`
const HEADING: &str = r"(?m)^[ \t]*(?:(?:ARTICLE|Article|SECTION|Section)[ \t]+([0-9]+|[IVXLC]+)[.:)\-]?|([0-9]{1,3})(?:(?:\.[0-9]{1,3})+\.?|[.)]))(?:[ \t]+([^\n]{0,120}))?[ \t]*$";

static HEADING_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(HEADING));

/// Checked in order against the heading, then the start of the body.
const CLAUSE_TYPES: &[(&str, &[&str])] = &[
    ("definitions", &["definition", "interpretation"]),
    ("confidentiality", &["confidential", "non-disclosure", "nondisclosure"]),
    ("termination", &["terminat"]),
    ("indemnification", &["indemnif", "hold harmless"]),
    ("limitation_of_liability", &["limitation of liability", "liabilit"]),
    ("payment", &["payment", "fees", "compensation", "invoice", "price"]),
    ("intellectual_property", &["intellectual property", "ownership", "license", "licence"]),
    ("data_protection", &["data protection", "personal data", "privacy", "gdpr"]),
    ("warranty", &["warrant", "representation"]),
    ("governing_law", &["governing law", "choice of law", "applicable law"]),
    ("dispute_resolution", &["dispute", "arbitration", "mediation"]),
    ("force_majeure", &["force majeure"]),
    ("non_compete", &["non-compet", "non-solicit", "restrictive covenant"]),
    ("assignment", &["assignment", "assign"]),
    ("notices", &["notice"]),
    ("term", &["term", "duration", "renewal"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub section_number: i64,
    pub title: String,
    pub clause_type: String,
    pub content: String,
}

pub fn classify_clause(title: &str, body: &str) -> &'static str {
    let title = title.to_lowercase();
    let head: String = body.chars().take(300).collect::<String>().to_lowercase();
    for hay in [&title, &head] {
        for (clause_type, keywords) in CLAUSE_TYPES {
            if keywords.iter().any(|k| hay.contains(k)) {
                return *clause_type;
            }
        }
    }
    "general"
}

/// Sections in document order, numbered from 1. Text before the first
/// heading is kept as a preamble; a document with no headings comes back
/// as one general section.
pub fn split_sections(text: &str) -> Result<Vec<Section>> {
    let re = HEADING_RE
        .as_ref()
        .map_err(|e| anyhow!("invalid clause heading pattern: {e}"))?;
    let text = text.replace("\r\n", "\n");
    let mut sections = Vec::new();

    let heads: Vec<(usize, usize, String)> = re
        .captures_iter(&text)
        .filter_map(|c| {
            let m = c.get(0)?;
            let title = c.get(3).map(|t| t.as_str()).unwrap_or_default();
            let title = title.trim().trim_matches(['.', ':', '-']).trim();
            if c.get(1).is_some() {
                let title = if title.is_empty() { m.as_str().trim() } else { title };
                return Some((m.start(), m.end(), title.to_string()));
            }
            // numbered list items inside a clause are sentences, not headings
            let capitalized = title.chars().next().is_some_and(char::is_uppercase);
            if !capitalized || title.len() > 80 {
                return None;
            }
            Some((m.start(), m.end(), title.to_string()))
        })
        .collect();

    let mut push = |title: String, body: &str| {
        let body = body.trim();
        if body.is_empty() {
            return;
        }
        let clause_type = classify_clause(&title, body).to_string();
        sections.push(Section {
            section_number: sections.len() as i64 + 1,
            title,
            clause_type,
            content: body.to_string(),
        });
    };

    let Some(first) = heads.first() else {
        push("General".into(), &text);
        return Ok(sections);
    };

    let preamble = &text[..first.0];
    if !preamble.trim().is_empty() {
        push("Preamble".into(), preamble);
    }
    for (i, (_, end, title)) in heads.iter().enumerate() {
        let next = heads.get(i + 1).map_or(text.len(), |h| h.0);
        push(title.clone(), &text[*end..next]);
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_pattern_is_compiled_once() {
        let first = HEADING_RE.as_ref().unwrap() as *const Regex;
        split_sections("1. Term\nTwo years.").unwrap();
        let second = HEADING_RE.as_ref().unwrap() as *const Regex;
        assert_eq!(first, second);
    }

    #[test]
    fn no_headings_is_one_section() {
        let s = split_sections("Just a paragraph of terms.").unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].title, "General");
    }

    #[test]
    fn empty_text_has_no_sections() {
        assert!(split_sections("   ").unwrap().is_empty());
    }

    #[test]
    fn article_heading_keeps_its_title() {
        let s = split_sections("ARTICLE IV - Term\nThis agreement lasts two years.").unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].title, "Term");
        assert_eq!(s[0].clause_type, "term");
    }

    #[test]
    fn type_from_heading_wins_over_body() {
        assert_eq!(
            classify_clause("Termination", "Payment is due on termination."),
            "termination"
        );
        assert_eq!(classify_clause("Miscellaneous", "Nothing here."), "general");
    }
}

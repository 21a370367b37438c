//! Pattern-based contract risk scoring.

use serde::Serialize;

use crate::compliance::round2;

pub struct Indicator {
    pub risk_type: &'static str,
    pub description: &'static str,
    pub patterns: &'static [&'static str],
    pub base_score: u32,
    pub action: &'static str,
    pub detail: &'static str,
}

pub const INDICATORS: &[Indicator] = &[
    Indicator {
        risk_type: "high_liability",
        description: "Clauses that expose party to significant liability",
        patterns: &[
            "unlimited liability",
            "all damages",
            "consequential damages",
            "punitive damages",
            "no cap",
            "full indemnification",
        ],
        base_score: 25,
        action: "Negotiate liability caps",
        detail: "Request a cap on liability, typically limited to the contract value or a \
                 multiple thereof. Exclude consequential damages.",
    },
    Indicator {
        risk_type: "weak_termination",
        description: "Unfavorable termination terms",
        patterns: &[
            "no termination for convenience",
            "automatic renewal",
            "long notice period",
            "penalty for termination",
            "termination fee",
        ],
        base_score: 20,
        action: "Improve termination rights",
        detail: "Add termination for convenience with reasonable notice (30-90 days). \
                 Remove or reduce termination penalties.",
    },
    Indicator {
        risk_type: "one_sided",
        description: "One-sided or unfair terms",
        patterns: &[
            "sole discretion",
            "unilateral",
            "at any time without notice",
            "non-negotiable",
            "as we see fit",
        ],
        base_score: 20,
        action: "Balance contract terms",
        detail: "Negotiate mutual rights where possible. Add 'reasonable' qualifiers to \
                 discretionary terms.",
    },
    Indicator {
        risk_type: "ip_risk",
        description: "Intellectual property ownership risks",
        patterns: &[
            "work for hire",
            "all ip belongs",
            "transfer of ownership",
            "assigns all rights",
            "perpetual license",
        ],
        base_score: 20,
        action: "Clarify IP ownership",
        detail: "Clearly define IP ownership boundaries. Consider joint ownership or license \
                 back provisions.",
    },
    Indicator {
        risk_type: "data_risk",
        description: "Data handling and privacy risks",
        patterns: &[
            "share with third parties",
            "no encryption",
            "unlimited retention",
            "no deletion",
            "transfer outside",
        ],
        base_score: 20,
        action: "Strengthen data protections",
        detail: "Add data security requirements, retention limits, and deletion rights. \
                 Restrict third-party sharing.",
    },
    Indicator {
        risk_type: "vague_language",
        description: "Ambiguous or vague language that could be exploited",
        patterns: &[
            "reasonable efforts",
            "as appropriate",
            "may include",
            "generally",
            "to the extent possible",
            "best efforts",
        ],
        base_score: 10,
        action: "Clarify ambiguous terms",
        detail: "Replace vague terms with specific, measurable criteria. Define what \
                 constitutes 'reasonable'.",
    },
    Indicator {
        risk_type: "missing_protection",
        description: "Missing standard protections",
        patterns: &[
            "no warranty",
            "as is",
            "no representation",
            "waives all claims",
            "releases all liability",
        ],
        base_score: 25,
        action: "Add standard protections",
        detail: "Request basic warranties and representations. Avoid blanket waivers \
                 without negotiation.",
    },
    Indicator {
        risk_type: "dispute_risk",
        description: "Unfavorable dispute resolution terms",
        patterns: &[
            "binding arbitration",
            "waive jury trial",
            "class action waiver",
            "inconvenient venue",
            "foreign jurisdiction",
        ],
        base_score: 15,
        action: "Improve dispute resolution",
        detail: "Negotiate a favorable or neutral venue. Consider mediation before \
                 arbitration. Review jury waiver.",
    },
];

const CONTEXT_CHARS: usize = 100;
const MATCH_CAP: usize = 3;

/// Severity of a single finding.
pub fn severity(score: u32) -> &'static str {
    match score {
        s if s >= 50 => "critical",
        s if s >= 30 => "high",
        s if s >= 15 => "medium",
        _ => "low",
    }
}

/// Level of an overall 0-100 score.
pub fn risk_level(score: u32) -> &'static str {
    match score {
        s if s >= 75 => "critical",
        s if s >= 50 => "high",
        s if s >= 25 => "medium",
        _ => "low",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    pub pattern: &'static str,
    pub context: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub risk_type: &'static str,
    pub description: &'static str,
    pub score: u32,
    pub matches: Vec<PatternMatch>,
    pub severity: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub risk_type: &'static str,
    pub severity: &'static str,
    pub action: &'static str,
    pub detail: &'static str,
    pub priority: &'static str,
}

#[derive(Debug, Clone)]
pub struct RiskReport {
    pub overall_score: u32,
    pub overall_level: &'static str,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
}

/// Up to 100 chars either side of the first match, in the original casing
/// when lower-casing kept byte offsets intact.
fn match_context(content: &str, lower: &str, idx: usize, len: usize) -> String {
    let source = if content.len() == lower.len() {
        content
    } else {
        lower
    };
    let start = floor_boundary(source, idx.saturating_sub(CONTEXT_CHARS));
    let end = ceil_boundary(source, (idx + len + CONTEXT_CHARS).min(source.len()));
    format!("...{}...", &source[start..end])
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

pub fn assess(content: &str) -> RiskReport {
    let lower = content.to_lowercase();
    let mut findings = Vec::new();
    let mut total = 0u32;

    for ind in INDICATORS {
        let matches: Vec<PatternMatch> = ind
            .patterns
            .iter()
            .filter_map(|p| {
                lower.find(*p).map(|idx| PatternMatch {
                    pattern: *p,
                    context: match_context(content, &lower, idx, p.len()),
                })
            })
            .collect();
        if matches.is_empty() {
            continue;
        }
        let score = ind.base_score * matches.len().min(MATCH_CAP) as u32;
        total += score;
        findings.push(Finding {
            risk_type: ind.risk_type,
            description: ind.description,
            score,
            matches,
            severity: severity(score),
        });
    }

    let overall_score = total.min(100);
    let recommendations = recommendations(&findings);
    RiskReport {
        overall_score,
        overall_level: risk_level(overall_score),
        findings,
        recommendations,
    }
}

fn recommendations(findings: &[Finding]) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = findings
        .iter()
        .filter_map(|f| {
            let ind = INDICATORS.iter().find(|i| i.risk_type == f.risk_type)?;
            Some(Recommendation {
                risk_type: f.risk_type,
                severity: f.severity,
                action: ind.action,
                detail: ind.detail,
                priority: if matches!(f.severity, "critical" | "high") {
                    "high"
                } else {
                    "medium"
                },
            })
        })
        .collect();
    out.sort_by_key(|r| if r.priority == "high" { 0 } else { 1 });
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactor {
    #[serde(rename = "type")]
    pub risk_type: &'static str,
    pub pattern: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct ClauseRisk {
    pub score: u32,
    pub level: &'static str,
    pub factors: Vec<RiskFactor>,
    pub explanation: String,
}

/// Clause-level scoring: half the base score per indicator, each indicator
/// counted once.
pub fn assess_clause(content: &str) -> ClauseRisk {
    let lower = content.to_lowercase();
    let mut factors = Vec::new();
    let mut total = 0.0f64;
    for ind in INDICATORS {
        if let Some(p) = ind.patterns.iter().find(|p| lower.contains(*p)) {
            factors.push(RiskFactor {
                risk_type: ind.risk_type,
                pattern: *p,
                description: ind.description,
            });
            total += f64::from(ind.base_score) / 2.0;
        }
    }
    let score = (total as u32).min(100);
    let explanation = if factors.is_empty() {
        "No significant risks identified".to_string()
    } else {
        factors
            .iter()
            .map(|f| f.description)
            .collect::<Vec<_>>()
            .join("; ")
    };
    ClauseRisk {
        score,
        level: risk_level(score),
        factors,
        explanation,
    }
}

/// Mean of the non-zero scores, rounded to two decimals.
pub fn average_nonzero(scores: &[i64]) -> f64 {
    let nonzero: Vec<i64> = scores.iter().copied().filter(|s| *s != 0).collect();
    if nonzero.is_empty() {
        return 0.0;
    }
    round2(nonzero.iter().sum::<i64>() as f64 / nonzero.len() as f64)
}

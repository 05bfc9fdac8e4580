//! Structured field extraction from a generated narrative.
//!
//! Each canonical field has an ordered list of [`Rule`]s. A rule names the
//! scope it searches (one numbered section, one action-plan horizon, or the
//! whole document), a pattern whose first capture group is the value, and a
//! transform applied to the capture. Rules are tried in order and the first
//! one producing a value wins. A field with no winning rule stays
//! [`Field::Unknown`]; extraction itself never fails.

use std::collections::HashMap;
use std::sync::LazyLock;

use bizintel_shared::{AnalysisRecord, AuditorStatus, Field, UNKNOWN};
use regex::Regex;
use tracing::debug;

use crate::template::{Horizon, Section};

// ---------------------------------------------------------------------------
// Document scoping
// ---------------------------------------------------------------------------

/// Start of any numbered section header (`##`, `###`, ...).
static SECTION_BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*#{2,}[ \t]*\**[ \t]*\d+\.").expect("valid regex")
});

static SECTION_HEADER_RES: LazyLock<HashMap<Section, Regex>> = LazyLock::new(|| {
    Section::ALL
        .into_iter()
        .map(|s| {
            let pattern = format!(
                r"(?im)^[ \t]*#{{2,}}[ \t]*\**[ \t]*{}\.[ \t]*{}",
                s.number(),
                regex::escape(s.title())
            );
            (s, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

static HORIZON_HEADER_RES: LazyLock<HashMap<Horizon, Regex>> = LazyLock::new(|| {
    Horizon::ALL
        .into_iter()
        .map(|h| {
            let pattern = format!(r"(?im)^[ \t]*###[^\n]*?{}", regex::escape(h.label()));
            (h, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

static SUBSECTION_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*###").expect("valid regex"));

/// Body following the header matched at `header_end`: from the next line up
/// to the next boundary (or the end of `text`).
fn body_after<'a>(text: &'a str, header_end: usize, boundary: &Regex) -> &'a str {
    let start = text[header_end..]
        .find('\n')
        .map_or(text.len(), |i| header_end + i + 1);
    let end = boundary
        .find_at(text, start)
        .map_or(text.len(), |m| m.start());
    &text[start..end]
}

/// Text of one numbered section, without its header line.
pub fn section_text(narrative: &str, section: Section) -> Option<&str> {
    let header = SECTION_HEADER_RES[&section].find(narrative)?;
    Some(body_after(narrative, header.end(), &SECTION_BOUNDARY_RE))
}

/// Text of one action-plan horizon inside the go-to-market section.
pub fn horizon_text(narrative: &str, horizon: Horizon) -> Option<&str> {
    let plan = section_text(narrative, Section::GoToMarket)?;
    let header = HORIZON_HEADER_RES[&horizon].find(plan)?;
    Some(body_after(plan, header.end(), &SUBSECTION_BOUNDARY_RE))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Where a rule searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Section(Section),
    Horizon(Horizon),
    Document,
}

impl Scope {
    fn slice(self, narrative: &str) -> Option<&str> {
        match self {
            Scope::Section(s) => section_text(narrative, s),
            Scope::Horizon(h) => horizon_text(narrative, h),
            Scope::Document => Some(narrative),
        }
    }
}

/// What to do with a rule's capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Trim whitespace.
    Trimmed,
    /// Trim and drop markdown emphasis (`*`).
    StripEmphasis,
    /// Parse as an integer score in `0..=100`.
    Score,
    /// Keep a multi-line block verbatim, trimmed.
    Block,
}

impl Transform {
    fn apply(self, raw: &str) -> Option<String> {
        let value = match self {
            Transform::Trimmed | Transform::Block => raw.trim().to_string(),
            Transform::StripEmphasis => raw.replace('*', "").trim().to_string(),
            Transform::Score => {
                let score: u8 = raw.trim().parse().ok()?;
                if score > 100 {
                    return None;
                }
                score.to_string()
            }
        };
        (!value.is_empty() && !is_unknown_marker(&value)).then_some(value)
    }
}

/// Whether `value` is the generator echoing the unknown-value marker back,
/// allowing for case, surrounding quotes and an en or em dash.
fn is_unknown_marker(value: &str) -> bool {
    let normalized: String = value
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.starts_with(&UNKNOWN.to_ascii_lowercase())
}

/// One extraction attempt for a field.
#[derive(Debug)]
pub struct Rule {
    pub scope: Scope,
    pub pattern: Regex,
    pub transform: Transform,
}

impl Rule {
    fn new(scope: Scope, pattern: &str, transform: Transform) -> Self {
        Self {
            scope,
            pattern: Regex::new(pattern).expect("valid regex"),
            transform,
        }
    }

    /// Captures the whole scope.
    fn block(scope: Scope) -> Self {
        Self::new(scope, r"(?s)\A(.*)\z", Transform::Block)
    }

    /// Apply this rule to `narrative`. `None` means "fall through".
    pub fn apply(&self, narrative: &str) -> Option<String> {
        let slice = self.scope.slice(narrative)?;
        let caps = self.pattern.captures(slice)?;
        self.transform.apply(caps.get(1)?.as_str())
    }
}

/// First rule producing a value wins.
fn first_match(field: &'static str, rules: &[Rule], narrative: &str) -> Option<String> {
    for (idx, rule) in rules.iter().enumerate() {
        if let Some(value) = rule.apply(narrative) {
            debug!(field, rule = idx, "extraction rule matched");
            return Some(value);
        }
    }
    debug!(field, "no extraction rule matched");
    None
}

/// Line-anchored `Label: value` first, then the label anywhere in the scope.
fn labelled(section: Section, label: &str) -> Vec<Rule> {
    let scope = Scope::Section(section);
    vec![
        Rule::new(
            scope,
            &format!(r"(?im)^[ \t]*[-*•]?[ \t]*\**{label}\**[ \t]*:[ \t]*\**([^\n]+)"),
            Transform::StripEmphasis,
        ),
        Rule::new(
            scope,
            &format!(r"(?i){label}[:\s]*\*?\*?([^\n]+)"),
            Transform::StripEmphasis,
        ),
    ]
}

const LEVEL_STRICT: &str = r"(?i)\*?\*?Prospect\s+Level\*?\*?[:\s]*\*?\*?\s*([A-Za-z]+)";
const SCORE_STRICT: &str = r"(?i)\*?\*?Prospect\s+Score\*?\*?[:\s]*\*?\*?\s*(\d+)";
const AUDITOR: &str = r"(?i)Auditor\s+Status\**\s*:?\s*\**\s*([^\n]+)";

static INDUSTRY_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| labelled(Section::CompanyOverview, "Industry"));
static LOCATION_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| labelled(Section::CompanyOverview, "Location"));
static EMPLOYEES_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| labelled(Section::CompanyOverview, "Employees"));
static REVENUE_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| labelled(Section::FinancialHealth, "Revenue"));

static LEVEL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let section = Scope::Section(Section::ProspectAnalysis);
    vec![
        Rule::new(section, LEVEL_STRICT, Transform::Trimmed),
        Rule::new(section, r"(?i)Prospect\s+Level[:\s]+([A-Za-z]+)", Transform::Trimmed),
        Rule::new(
            section,
            r"(?i)Level[:\s]*\*?\*?\s*(High|Medium|Low)",
            Transform::Trimmed,
        ),
        Rule::new(Scope::Document, LEVEL_STRICT, Transform::Trimmed),
    ]
});

static SCORE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let section = Scope::Section(Section::ProspectAnalysis);
    vec![
        Rule::new(section, SCORE_STRICT, Transform::Score),
        Rule::new(section, r"(?i)Prospect\s+Score[:\s]+(\d+)", Transform::Score),
        Rule::new(section, r"(?i)Score[:\s]*\*?\*?\s*(\d+)/100", Transform::Score),
        Rule::new(section, r"(?i)Score[:\s]*\*?\*?\s*(\d+)\s*/\s*100", Transform::Score),
        Rule::new(Scope::Document, SCORE_STRICT, Transform::Score),
    ]
});

static AUDITOR_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            Scope::Section(Section::ProspectAnalysis),
            AUDITOR,
            Transform::StripEmphasis,
        ),
        Rule::new(Scope::Document, AUDITOR, Transform::StripEmphasis),
    ]
});

fn block_rules(section: Section) -> Vec<Rule> {
    vec![Rule::block(Scope::Section(section))]
}

static WIN_THEMES_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| block_rules(Section::WinThemes));
static SOLUTIONS_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| block_rules(Section::RecommendedSolutions));
static PERSONNEL_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| block_rules(Section::KeyPersonnel));
static ENGAGEMENT_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| block_rules(Section::EngagementStrategy));

static HORIZON_RULES: LazyLock<HashMap<Horizon, Vec<Rule>>> = LazyLock::new(|| {
    Horizon::ALL
        .into_iter()
        .map(|h| (h, vec![Rule::block(Scope::Horizon(h))]))
        .collect()
});

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Classify raw auditor-status text by its cues.
pub fn classify_auditor(raw: &str) -> AuditorStatus {
    if raw.contains("CHECK") || raw.contains("DESC") || raw.contains('⚠') {
        AuditorStatus::CheckRequired
    } else if raw.contains("Other") || raw.contains('✓') {
        AuditorStatus::OtherAuditor
    } else {
        AuditorStatus::Reported(raw.to_string())
    }
}

fn text(field: &'static str, rules: &[Rule], narrative: &str) -> Field<String> {
    first_match(field, rules, narrative).into()
}

fn horizon(field: &'static str, h: Horizon, narrative: &str) -> Field<String> {
    text(field, &HORIZON_RULES[&h], narrative)
}

/// Parse a narrative into an [`AnalysisRecord`].
pub fn extract(narrative: &str) -> AnalysisRecord {
    AnalysisRecord {
        prospect_level: text("prospect_level", &LEVEL_RULES, narrative),
        prospect_score: first_match("prospect_score", &SCORE_RULES, narrative)
            .and_then(|s| s.parse::<u8>().ok())
            .into(),
        industry: text("industry", &INDUSTRY_RULES, narrative),
        location: text("location", &LOCATION_RULES, narrative),
        employees: text("employees", &EMPLOYEES_RULES, narrative),
        revenue: text("revenue", &REVENUE_RULES, narrative),
        auditor_status: first_match("auditor_status", &AUDITOR_RULES, narrative)
            .map(|raw| classify_auditor(&raw))
            .into(),
        win_themes: text("win_themes", &WIN_THEMES_RULES, narrative),
        key_personnel: text("key_personnel", &PERSONNEL_RULES, narrative),
        engagement_strategy: text("engagement_strategy", &ENGAGEMENT_RULES, narrative),
        gtm_immediate: horizon("gtm_immediate", Horizon::Immediate, narrative),
        gtm_short_term: horizon("gtm_short_term", Horizon::ShortTerm, narrative),
        gtm_mid_term: horizon("gtm_mid_term", Horizon::MidTerm, narrative),
        gtm_long_term: horizon("gtm_long_term", Horizon::LongTerm, narrative),
        recommended_solutions: text("recommended_solutions", &SOLUTIONS_RULES, narrative),
    }
}

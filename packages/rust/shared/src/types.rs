//! Core domain types: reference records, the per-request match context and the
//! canonical analysis record.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Sentinel rendered for any canonical field the narrative did not supply.
pub const UNKNOWN: &str = "Unknown - needs manual research";

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A canonical field value: either parsed from the narrative or unknown.
///
/// `Unknown` is distinct from any parsed value, so a parsed score of 0 never
/// collapses into "no score".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Known(T),
    Unknown,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T> Field<T> {
    /// Borrow the parsed value, if any.
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Keep a parsed value; otherwise take `fallback` when it is present.
    pub fn or_known(self, fallback: Option<T>) -> Self {
        match (self, fallback) {
            (Self::Known(v), _) => Self::Known(v),
            (Self::Unknown, Some(v)) => Self::Known(v),
            (Self::Unknown, None) => Self::Unknown,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => v.fmt(f),
            Self::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(v) => v.serialize(serializer),
            Self::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference records
// ---------------------------------------------------------------------------

/// A row of the entities collection (known customers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub company_name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub account_manager: Option<String>,
    #[serde(default)]
    pub relationship_status: Option<String>,
    #[serde(default)]
    pub last_interaction_date: Option<String>,
    #[serde(default)]
    pub auditor_firm: Option<String>,
    #[serde(default)]
    pub annual_revenue: Option<String>,
    #[serde(default)]
    pub employee_count: Option<String>,
    #[serde(default)]
    pub headquarters_location: Option<String>,
}

/// A row of the offerings collection (product catalog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingRecord {
    pub product_name: String,
    #[serde(default)]
    pub product_category: Option<String>,
    /// Free text listing the industries this product targets.
    #[serde(default)]
    pub target_industries: Option<String>,
    #[serde(default)]
    pub features: Option<String>,
    #[serde(default)]
    pub competitive_advantage: Option<String>,
    #[serde(default)]
    pub base_price: Option<String>,
}

/// A row of the campaigns collection (marketing budget).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub campaign_name: String,
    #[serde(default)]
    pub target_industry: Option<String>,
    #[serde(default)]
    pub budget_allocated: Option<f64>,
    /// Conversion rate in percent.
    #[serde(default)]
    pub conversion_rate: Option<f64>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A row of the playbooks collection (sales plays).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookRecord {
    pub play_name: String,
    #[serde(default)]
    pub target_persona: Option<String>,
    #[serde(default)]
    pub target_industry: Option<String>,
    #[serde(default)]
    pub value_proposition: Option<String>,
    #[serde(default)]
    pub engagement_strategy: Option<String>,
    #[serde(default)]
    pub success_metrics: Option<String>,
    #[serde(default)]
    pub recommended_products: Option<String>,
}

// ---------------------------------------------------------------------------
// MatchContext
// ---------------------------------------------------------------------------

/// Reference data assembled for one analysis request.
///
/// The matched entity name and the entity record live in one `Option`, so a
/// context can never carry one without the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchContext {
    customer: Option<CustomerRecord>,
    pub relevant_offerings: Vec<OfferingRecord>,
    pub relevant_campaigns: Vec<CampaignRecord>,
    pub relevant_playbooks: Vec<PlaybookRecord>,
}

impl MatchContext {
    /// A context with no customer match and no reference data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A context anchored on a matched customer.
    pub fn matched(customer: CustomerRecord) -> Self {
        Self {
            customer: Some(customer),
            ..Self::default()
        }
    }

    /// Canonical name from the record store, if a customer matched.
    pub fn matched_entity_name(&self) -> Option<&str> {
        self.customer.as_ref().map(|c| c.company_name.as_str())
    }

    /// The matched customer's record, if any.
    pub fn entity_record(&self) -> Option<&CustomerRecord> {
        self.customer.as_ref()
    }

    pub fn is_existing_customer(&self) -> bool {
        self.customer.is_some()
    }

    /// Counts reported alongside an analysis.
    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            customer_match: self.matched_entity_name().map(str::to_string),
            offerings_found: self.relevant_offerings.len(),
            campaigns_found: self.relevant_campaigns.len(),
            playbooks_found: self.relevant_playbooks.len(),
        }
    }
}

/// What the aggregator found, without the records themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    pub customer_match: Option<String>,
    pub offerings_found: usize,
    pub campaigns_found: usize,
    pub playbooks_found: usize,
}

// ---------------------------------------------------------------------------
// AnalysisRecord
// ---------------------------------------------------------------------------

/// Classified auditor status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditorStatus {
    /// The narrative flagged the auditor as needing a check.
    CheckRequired,
    /// Confirmed to be audited by another firm.
    OtherAuditor,
    /// Anything else, passed through as written.
    Reported(String),
}

impl AuditorStatus {
    /// Inverse of `Display`: the two fixed labels map back to their buckets.
    pub fn from_label(label: &str) -> Self {
        match label {
            "⚠️ CHECK DESC" => Self::CheckRequired,
            "✓ Other Auditor" => Self::OtherAuditor,
            other => Self::Reported(other.to_string()),
        }
    }
}

impl fmt::Display for AuditorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckRequired => f.write_str("⚠️ CHECK DESC"),
            Self::OtherAuditor => f.write_str("✓ Other Auditor"),
            Self::Reported(s) => f.write_str(s),
        }
    }
}

impl Serialize for AuditorStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Canonical structured output of one entity's analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisRecord {
    pub prospect_level: Field<String>,
    /// Always within 0..=100 when known.
    pub prospect_score: Field<u8>,
    pub industry: Field<String>,
    pub location: Field<String>,
    pub employees: Field<String>,
    pub revenue: Field<String>,
    pub auditor_status: Field<AuditorStatus>,
    pub win_themes: Field<String>,
    pub key_personnel: Field<String>,
    pub engagement_strategy: Field<String>,
    pub gtm_immediate: Field<String>,
    pub gtm_short_term: Field<String>,
    pub gtm_mid_term: Field<String>,
    pub gtm_long_term: Field<String>,
    pub recommended_solutions: Field<String>,
}

impl AnalysisRecord {
    /// Score used for ranking: unknown scores rank as 0.
    pub fn ranking_score(&self) -> u8 {
        self.prospect_score.known().copied().unwrap_or(0)
    }

    /// Fill fields the narrative left unknown from the matched customer record.
    ///
    /// Values extracted from the narrative always win: a customer record only
    /// supplies industry, location, employees, revenue and auditor when the
    /// extracted field is [`Field::Unknown`]. It never overrides a value the
    /// narrative stated.
    pub fn merge_customer(&mut self, customer: &CustomerRecord) {
        self.industry = std::mem::take(&mut self.industry).or_known(customer.industry.clone());
        self.location =
            std::mem::take(&mut self.location).or_known(customer.headquarters_location.clone());
        self.employees =
            std::mem::take(&mut self.employees).or_known(customer.employee_count.clone());
        self.revenue = std::mem::take(&mut self.revenue).or_known(customer.annual_revenue.clone());
        self.auditor_status = std::mem::take(&mut self.auditor_status)
            .or_known(customer.auditor_firm.clone().map(AuditorStatus::Reported));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> CustomerRecord {
        CustomerRecord {
            company_name: "Acme Corp".into(),
            industry: Some("Manufacturing".into()),
            account_manager: Some("Dana Lee".into()),
            relationship_status: Some("Active".into()),
            last_interaction_date: None,
            auditor_firm: Some("KPMG".into()),
            annual_revenue: None,
            employee_count: Some("1200".into()),
            headquarters_location: Some("Austin, TX".into()),
        }
    }

    #[test]
    fn unknown_field_serializes_as_sentinel() {
        let field: Field<u8> = Field::Unknown;
        assert_eq!(serde_json::to_string(&field).unwrap(), format!("\"{UNKNOWN}\""));
        let field = Field::Known(0u8);
        assert_eq!(serde_json::to_string(&field).unwrap(), "0");
    }

    #[test]
    fn parsed_zero_is_not_unknown() {
        let zero = Field::Known(0u8);
        assert!(!zero.is_unknown());
        assert_eq!(zero.known(), Some(&0));
        assert_ne!(zero, Field::Unknown);
    }

    #[test]
    fn context_name_and_record_travel_together() {
        let empty = MatchContext::empty();
        assert!(empty.matched_entity_name().is_none());
        assert!(empty.entity_record().is_none());

        let ctx = MatchContext::matched(customer());
        assert_eq!(ctx.matched_entity_name(), Some("Acme Corp"));
        assert!(ctx.entity_record().is_some());
        assert_eq!(ctx.summary().customer_match.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn merge_customer_only_fills_unknowns() {
        let mut record = AnalysisRecord {
            industry: Field::Known("Industrial Automation".into()),
            ..Default::default()
        };
        record.merge_customer(&customer());

        assert_eq!(record.industry, Field::Known("Industrial Automation".into()));
        assert_eq!(record.location, Field::Known("Austin, TX".into()));
        assert_eq!(record.employees, Field::Known("1200".into()));
        assert_eq!(record.revenue, Field::Unknown);
        assert_eq!(
            record.auditor_status,
            Field::Known(AuditorStatus::Reported("KPMG".into()))
        );
    }

    #[test]
    fn auditor_status_display() {
        assert_eq!(AuditorStatus::CheckRequired.to_string(), "⚠️ CHECK DESC");
        assert_eq!(AuditorStatus::OtherAuditor.to_string(), "✓ Other Auditor");
        assert_eq!(AuditorStatus::Reported("EY".into()).to_string(), "EY");
        for status in [
            AuditorStatus::CheckRequired,
            AuditorStatus::OtherAuditor,
            AuditorStatus::Reported("Deloitte".into()),
        ] {
            assert_eq!(AuditorStatus::from_label(&status.to_string()), status);
        }
    }

    #[test]
    fn ranking_score_defaults_to_zero() {
        let mut record = AnalysisRecord::default();
        assert_eq!(record.ranking_score(), 0);
        record.prospect_score = Field::Known(72);
        assert_eq!(record.ranking_score(), 72);
    }
}

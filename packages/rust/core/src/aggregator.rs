//! Context aggregation: match an entity name against the customer collection
//! and pull the industry-relevant offerings, campaigns and playbooks.

use std::cmp::Ordering;

use bizintel_shared::{CampaignRecord, MatchContext, Result};
use tracing::{debug, info, instrument, warn};

use crate::store::RecordStore;

/// Ratio a fuzzy candidate must exceed to count as a match.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

pub const MAX_OFFERINGS: usize = 5;
pub const MAX_CAMPAIGNS: usize = 3;
pub const MAX_PLAYBOOKS: usize = 5;

// ---------------------------------------------------------------------------
// Fuzzy matching
// ---------------------------------------------------------------------------

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Symmetric edit similarity in `[0, 1]` between two normalized strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Match `name` against `candidates`, keyed by `key`.
///
/// Exact matches beat substring matches, which beat fuzzy matches. Within a
/// tier the first candidate in input order wins. Fuzzy matches must score
/// strictly above [`SIMILARITY_THRESHOLD`].
pub fn fuzzy_match_by<'a, T>(
    name: &str,
    candidates: &'a [T],
    key: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let target = normalize(name);
    if target.is_empty() {
        return None;
    }
    let normalized: Vec<(usize, String)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, normalize(key(c))))
        .filter(|(_, c)| !c.is_empty())
        .collect();

    if let Some((i, _)) = normalized.iter().find(|(_, c)| *c == target) {
        return Some(&candidates[*i]);
    }

    if let Some((i, _)) = normalized
        .iter()
        .find(|(_, c)| c.contains(&target) || target.contains(c.as_str()))
    {
        return Some(&candidates[*i]);
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, c) in &normalized {
        let ratio = similarity(&target, c);
        if best.is_none_or(|(_, b)| ratio > b) {
            best = Some((*i, ratio));
        }
    }
    best.filter(|(_, ratio)| *ratio > SIMILARITY_THRESHOLD)
        .map(|(i, _)| &candidates[i])
}

/// Match `name` against plain candidate names.
pub fn fuzzy_match<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    fuzzy_match_by(name, candidates, |c| *c).copied()
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Sort campaigns by conversion rate, then budget, both descending.
/// Missing values sort last. The sort is stable.
pub fn sort_campaigns(campaigns: &mut [CampaignRecord]) {
    fn desc(a: Option<f64>, b: Option<f64>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
    campaigns.sort_by(|a, b| {
        desc(a.conversion_rate, b.conversion_rate)
            .then_with(|| desc(a.budget_allocated, b.budget_allocated))
    });
}

fn targets_industry(target: Option<&str>, industry: &str) -> bool {
    target.is_some_and(|t| t.to_lowercase().contains(industry))
}

/// Keep rows whose target field contains `industry` (case-insensitive), up to
/// `limit`. An empty filter result falls back to the unfiltered head.
fn filter_relevant<T: Clone>(
    rows: Vec<T>,
    industry: Option<&str>,
    limit: usize,
    target: impl Fn(&T) -> Option<&str>,
) -> Vec<T> {
    if let Some(industry) = industry.map(normalize).filter(|i| !i.is_empty()) {
        let filtered: Vec<T> = rows
            .iter()
            .filter(|r| targets_industry(target(r), &industry))
            .take(limit)
            .cloned()
            .collect();
        if !filtered.is_empty() {
            return filtered;
        }
    }
    rows.into_iter().take(limit).collect()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Build the [`MatchContext`] for `entity_name`.
///
/// A store failure is logged and yields an empty context; generation then
/// proceeds on public knowledge only.
#[instrument(skip_all, fields(entity = %entity_name))]
pub async fn aggregate(entity_name: &str, store: &dyn RecordStore) -> MatchContext {
    match try_aggregate(entity_name, store).await {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(error = %e, "record store unavailable, continuing without context");
            MatchContext::empty()
        }
    }
}

async fn try_aggregate(entity_name: &str, store: &dyn RecordStore) -> Result<MatchContext> {
    let (customers, offerings, mut campaigns, playbooks) = tokio::try_join!(
        store.fetch_entities(),
        store.fetch_offerings(),
        store.fetch_campaigns(),
        store.fetch_playbooks(),
    )?;
    sort_campaigns(&mut campaigns);

    let customer = fuzzy_match_by(entity_name, &customers, |c| c.company_name.as_str()).cloned();
    let industry = customer.as_ref().and_then(|c| c.industry.clone());

    let mut ctx = match customer {
        Some(customer) => {
            info!(
                matched = %customer.company_name,
                industry = customer.industry.as_deref().unwrap_or("-"),
                "existing customer found"
            );
            MatchContext::matched(customer)
        }
        None => MatchContext::empty(),
    };

    let industry = industry.as_deref();
    ctx.relevant_offerings = filter_relevant(offerings, industry, MAX_OFFERINGS, |o| {
        o.target_industries.as_deref()
    });
    ctx.relevant_campaigns = filter_relevant(campaigns, industry, MAX_CAMPAIGNS, |c| {
        c.target_industry.as_deref()
    });
    ctx.relevant_playbooks = filter_relevant(playbooks, industry, MAX_PLAYBOOKS, |p| {
        p.target_industry.as_deref()
    });

    debug!(
        offerings = ctx.relevant_offerings.len(),
        campaigns = ctx.relevant_campaigns.len(),
        playbooks = ctx.relevant_playbooks.len(),
        "context assembled"
    );
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bizintel_shared::{CustomerRecord, OfferingRecord, PlaybookRecord};

    fn customer(name: &str, industry: &str) -> CustomerRecord {
        CustomerRecord {
            company_name: name.into(),
            industry: Some(industry.into()),
            account_manager: None,
            relationship_status: None,
            last_interaction_date: None,
            auditor_firm: None,
            annual_revenue: None,
            employee_count: None,
            headquarters_location: None,
        }
    }

    fn offering(name: &str, targets: &str) -> OfferingRecord {
        OfferingRecord {
            product_name: name.into(),
            product_category: None,
            target_industries: Some(targets.into()),
            features: None,
            competitive_advantage: None,
            base_price: None,
        }
    }

    fn campaign(name: &str, industry: &str, rate: f64, budget: f64) -> CampaignRecord {
        CampaignRecord {
            campaign_name: name.into(),
            target_industry: Some(industry.into()),
            budget_allocated: Some(budget),
            conversion_rate: Some(rate),
            end_date: None,
        }
    }

    fn playbook(name: &str, industry: &str) -> PlaybookRecord {
        PlaybookRecord {
            play_name: name.into(),
            target_persona: None,
            target_industry: Some(industry.into()),
            value_proposition: None,
            engagement_strategy: None,
            success_metrics: None,
            recommended_products: None,
        }
    }

    #[test]
    fn exact_match_wins_over_earlier_substring_and_fuzzy() {
        let candidates = ["Acme Corporation", "Acme Corq", "  ACME CORP "];
        assert_eq!(fuzzy_match("acme corp", &candidates), Some("  ACME CORP "));
    }

    #[test]
    fn substring_match_either_direction() {
        assert_eq!(fuzzy_match("Globex", &["Initech", "Globex Inc"]), Some("Globex Inc"));
        assert_eq!(fuzzy_match("Globex Inc Europe", &["Globex Inc"]), Some("Globex Inc"));
    }

    #[test]
    fn fuzzy_match_requires_ratio_above_threshold() {
        // one substitution in ten characters: ratio 0.9
        assert_eq!(fuzzy_match("Umbrellaco", &["Umbrellako"]), Some("Umbrellako"));
        // two substitutions in ten characters: ratio exactly 0.8
        assert_eq!(fuzzy_match("Umbrellaco", &["Umbrelxako"]), None);
        assert_eq!(fuzzy_match("Stark Industries", &["Wayne Enterprises"]), None);
    }

    #[test]
    fn fuzzy_tie_keeps_first_candidate() {
        assert_eq!(
            fuzzy_match("Umbrellaco", &["Umbrellako", "Umbrellacx"]),
            Some("Umbrellako")
        );
    }

    #[test]
    fn blank_inputs_never_match() {
        assert_eq!(fuzzy_match("   ", &["Acme"]), None);
        assert_eq!(fuzzy_match("Acme", &["", "  "]), None);
    }

    #[test]
    fn campaigns_sort_by_rate_then_budget() {
        let mut campaigns = vec![
            campaign("a", "x", 2.0, 100.0),
            campaign("b", "x", 5.0, 50.0),
            campaign("c", "x", 5.0, 80.0),
        ];
        sort_campaigns(&mut campaigns);
        let names: Vec<_> = campaigns.iter().map(|c| c.campaign_name.as_str()).collect();
        assert_eq!(names, ["c", "b", "a"]);
    }

    fn seeded_store() -> MemoryStore {
        MemoryStore::new()
            .with_customers(vec![customer("Acme Corp", "Manufacturing")])
            .with_offerings(vec![
                offering("Cloud CRM", "Retail, Technology"),
                offering("Shop Floor IoT", "Manufacturing, Logistics"),
            ])
            .with_campaigns(vec![
                campaign("Retail Push", "Retail", 9.0, 10.0),
                campaign("Factory Week", "manufacturing", 3.0, 10.0),
                campaign("Plant Digital", "Manufacturing", 4.0, 5.0),
            ])
            .with_playbooks(vec![playbook("Retail Play", "Retail")])
    }

    #[tokio::test]
    async fn matched_entity_filters_by_industry() {
        let store = seeded_store();
        let ctx = aggregate("acme corp", &store).await;

        assert_eq!(ctx.matched_entity_name(), Some("Acme Corp"));
        assert!(ctx.entity_record().is_some());
        let offerings: Vec<_> = ctx
            .relevant_offerings
            .iter()
            .map(|o| o.product_name.as_str())
            .collect();
        assert_eq!(offerings, ["Shop Floor IoT"]);
        let campaigns: Vec<_> = ctx
            .relevant_campaigns
            .iter()
            .map(|c| c.campaign_name.as_str())
            .collect();
        assert_eq!(campaigns, ["Plant Digital", "Factory Week"]);
        // No manufacturing playbook: fall back to the head of the collection.
        assert_eq!(ctx.relevant_playbooks.len(), 1);
    }

    #[tokio::test]
    async fn unmatched_entity_gets_unfiltered_heads() {
        let store = seeded_store();
        let ctx = aggregate("Wayne Enterprises", &store).await;

        assert!(ctx.matched_entity_name().is_none());
        assert!(ctx.entity_record().is_none());
        assert_eq!(ctx.relevant_offerings.len(), 2);
        assert_eq!(ctx.relevant_campaigns[0].campaign_name, "Retail Push");
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty_context() {
        let store = seeded_store();
        store.fail_reads(true);
        let ctx = aggregate("Acme Corp", &store).await;
        assert_eq!(ctx, MatchContext::empty());
    }

    #[tokio::test]
    async fn heads_are_capped() {
        let offerings = (0..8).map(|i| offering(&format!("p{i}"), "Any")).collect();
        let campaigns = (0..6u32)
            .map(|i| campaign(&format!("c{i}"), "Any", f64::from(i), 1.0))
            .collect();
        let store = MemoryStore::new()
            .with_offerings(offerings)
            .with_campaigns(campaigns);
        let ctx = aggregate("Nobody", &store).await;
        assert_eq!(ctx.relevant_offerings.len(), MAX_OFFERINGS);
        assert_eq!(ctx.relevant_campaigns.len(), MAX_CAMPAIGNS);
        assert_eq!(ctx.relevant_campaigns[0].campaign_name, "c5");
    }
}

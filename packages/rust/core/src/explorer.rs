//! Read-only views over the reference data.

use serde::Serialize;

use bizintel_shared::{
    CampaignRecord, CustomerRecord, OfferingRecord, PlaybookRecord, Result,
};
use bizintel_storage::{COLLECTIONS, CollectionCount, StoredAnalysis};

use crate::aggregator::fuzzy_match;
use crate::store::ScopedStorage;

/// Row counts for every logical collection in the namespace.
pub async fn collection_counts(store: &ScopedStorage) -> Result<Vec<CollectionCount>> {
    store.storage().collection_counts(store.namespace()).await
}

/// Rows returned by [`list_rows`] when the caller sets no limit.
pub const DEFAULT_ROW_LIMIT: usize = 1000;

/// A collection that can be listed row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Customers,
    Products,
    Campaigns,
    SalesPlays,
    Analyses,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Customers,
        Collection::Products,
        Collection::Campaigns,
        Collection::SalesPlays,
        Collection::Analyses,
    ];

    /// Name of the backing table, as shown by [`collection_counts`].
    pub fn name(self) -> &'static str {
        match self {
            Collection::Customers => COLLECTIONS[0],
            Collection::Products => COLLECTIONS[1],
            Collection::Campaigns => COLLECTIONS[2],
            Collection::SalesPlays => COLLECTIONS[3],
            Collection::Analyses => COLLECTIONS[4],
        }
    }

    /// Case-insensitive lookup by table name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Rows of one collection, in the order storage lists them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CollectionRows {
    Customers(Vec<CustomerRecord>),
    Products(Vec<OfferingRecord>),
    Campaigns(Vec<CampaignRecord>),
    SalesPlays(Vec<PlaybookRecord>),
    Analyses(Vec<StoredAnalysis>),
}

impl CollectionRows {
    pub fn len(&self) -> usize {
        match self {
            CollectionRows::Customers(r) => r.len(),
            CollectionRows::Products(r) => r.len(),
            CollectionRows::Campaigns(r) => r.len(),
            CollectionRows::SalesPlays(r) => r.len(),
            CollectionRows::Analyses(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn capped<T>(mut rows: Vec<T>, limit: usize) -> Vec<T> {
    rows.truncate(limit);
    rows
}

/// At most `limit` rows of `collection`. Analyses come newest first.
pub async fn list_rows(
    store: &ScopedStorage,
    collection: Collection,
    limit: usize,
) -> Result<CollectionRows> {
    let (storage, ns) = (store.storage(), store.namespace());
    Ok(match collection {
        Collection::Customers => {
            CollectionRows::Customers(capped(storage.list_customers(ns).await?, limit))
        }
        Collection::Products => {
            CollectionRows::Products(capped(storage.list_products(ns).await?, limit))
        }
        Collection::Campaigns => {
            CollectionRows::Campaigns(capped(storage.list_campaigns(ns).await?, limit))
        }
        Collection::SalesPlays => {
            CollectionRows::SalesPlays(capped(storage.list_sales_plays(ns).await?, limit))
        }
        Collection::Analyses => {
            CollectionRows::Analyses(capped(storage.list_analyses(ns).await?, limit))
        }
    })
}

/// A customer with the latest score of the matching analysed company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCustomer {
    #[serde(flatten)]
    pub customer: CustomerRecord,
    pub prospect_score: Option<u8>,
}

/// Every customer, annotated with the most recent prospect score of the
/// analysed company its name fuzzy-matches.
pub async fn customers_with_scores(store: &ScopedStorage) -> Result<Vec<ScoredCustomer>> {
    let ns = store.namespace();
    let customers = store.storage().list_customers(ns).await?;
    let analyses = store.storage().list_analyses(ns).await?;
    Ok(attach_scores(customers, &analyses))
}

/// `analyses` must be newest first.
fn attach_scores(customers: Vec<CustomerRecord>, analyses: &[StoredAnalysis]) -> Vec<ScoredCustomer> {
    let mut names: Vec<&str> = Vec::new();
    for a in analyses {
        if !names.contains(&a.company_name.as_str()) {
            names.push(&a.company_name);
        }
    }

    customers
        .into_iter()
        .map(|customer| {
            let prospect_score = fuzzy_match(&customer.company_name, &names).and_then(|name| {
                analyses
                    .iter()
                    .find(|a| a.company_name == name)
                    .and_then(|a| a.record.prospect_score.known().copied())
            });
            ScoredCustomer {
                customer,
                prospect_score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bizintel_shared::{AnalysisRecord, Field};
    use bizintel_storage::Storage;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn customer(name: &str) -> CustomerRecord {
        CustomerRecord {
            company_name: name.into(),
            industry: None,
            account_manager: None,
            relationship_status: None,
            last_interaction_date: None,
            auditor_firm: None,
            annual_revenue: None,
            employee_count: None,
            headquarters_location: None,
        }
    }

    fn analysis(company: &str, score: u8, minutes_ago: i64) -> StoredAnalysis {
        StoredAnalysis {
            analyzed_at: Utc::now() - Duration::minutes(minutes_ago),
            company_name: company.into(),
            directive: "review".into(),
            analyzed_by: "a".into(),
            existing_customer: true,
            record: AnalysisRecord {
                prospect_score: Field::Known(score),
                ..AnalysisRecord::default()
            },
            full_analysis: String::new(),
        }
    }

    #[test]
    fn latest_matching_score_is_attached() {
        // newest first
        let analyses = vec![
            analysis("Acme Corporation", 88, 1),
            analysis("Acme Corporation", 40, 60),
        ];
        let scored = attach_scores(vec![customer("Acme"), customer("Umbrella")], &analyses);
        assert_eq!(scored[0].prospect_score, Some(88));
        assert_eq!(scored[1].prospect_score, None);
    }

    #[tokio::test]
    async fn counts_and_scores_from_storage() {
        let tmp = std::env::temp_dir().join(format!("bi_test_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.unwrap());
        storage.insert_customer("ns", &customer("Initech")).await.unwrap();
        storage
            .append_analysis("ns", &analysis("Initech", 64, 0))
            .await
            .unwrap();
        let store = ScopedStorage::new(storage, "ns");

        let counts = collection_counts(&store).await.unwrap();
        let customers = counts.iter().find(|c| c.name == "customers").unwrap();
        assert_eq!(customers.rows, 1);

        let scored = customers_with_scores(&store).await.unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].prospect_score, Some(64));
    }

    fn product(name: &str) -> OfferingRecord {
        OfferingRecord {
            product_name: name.into(),
            product_category: None,
            target_industries: None,
            features: None,
            competitive_advantage: None,
            base_price: None,
        }
    }

    #[test]
    fn collections_resolve_by_table_name() {
        assert_eq!(Collection::from_name("Products"), Some(Collection::Products));
        assert_eq!(
            Collection::from_name("analysis_complete"),
            Some(Collection::Analyses)
        );
        assert_eq!(Collection::from_name("marketing_budget"), Some(Collection::Campaigns));
        assert_eq!(Collection::from_name("invoices"), None);
        for c in Collection::ALL {
            assert_eq!(Collection::from_name(c.name()), Some(c));
        }
    }

    #[tokio::test]
    async fn rows_are_listed_up_to_the_limit() {
        let tmp = std::env::temp_dir().join(format!("bi_test_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.unwrap());
        for name in ["Line Monitor", "Shop Floor IoT", "Edge Gateway"] {
            storage.insert_product("ns", &product(name)).await.unwrap();
        }
        storage.insert_product("other", &product("Hidden")).await.unwrap();
        storage
            .append_analysis("ns", &analysis("Initech", 50, 30))
            .await
            .unwrap();
        storage
            .append_analysis("ns", &analysis("Globex", 70, 1))
            .await
            .unwrap();
        let store = ScopedStorage::new(storage, "ns");

        let rows = list_rows(&store, Collection::Products, 2).await.unwrap();
        assert_eq!(
            rows,
            CollectionRows::Products(vec![product("Line Monitor"), product("Shop Floor IoT")])
        );

        let all = list_rows(&store, Collection::Products, DEFAULT_ROW_LIMIT)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        match list_rows(&store, Collection::Analyses, 1).await.unwrap() {
            CollectionRows::Analyses(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].company_name, "Globex");
            }
            other => panic!("expected analyses, got {other:?}"),
        }

        assert!(
            list_rows(&store, Collection::SalesPlays, DEFAULT_ROW_LIMIT)
                .await
                .unwrap()
                .is_empty()
        );
    }
}

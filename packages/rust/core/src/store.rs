//! The record store boundary.
//!
//! [`RecordStore`] is what the aggregator reads reference collections from and
//! what the pipeline appends completed analyses to. [`ScopedStorage`] binds the
//! libSQL [`Storage`] to one namespace; [`MemoryStore`] keeps everything in
//! process and can be told to fail reads or writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bizintel_shared::{
    BizIntelError, CampaignRecord, CustomerRecord, OfferingRecord, PlaybookRecord, Result,
};
use bizintel_storage::{StoredAnalysis, Storage};

/// Read/append access to the four reference collections and the analysis log.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_entities(&self) -> Result<Vec<CustomerRecord>>;

    async fn fetch_offerings(&self) -> Result<Vec<OfferingRecord>>;

    /// Campaigns, best conversion rate first, then largest budget.
    async fn fetch_campaigns(&self) -> Result<Vec<CampaignRecord>>;

    async fn fetch_playbooks(&self) -> Result<Vec<PlaybookRecord>>;

    /// Append one completed analysis.
    async fn append_analysis(&self, analysis: &StoredAnalysis) -> Result<()>;
}

// ---------------------------------------------------------------------------
// libSQL-backed store
// ---------------------------------------------------------------------------

/// [`Storage`] scoped to one namespace.
#[derive(Clone)]
pub struct ScopedStorage {
    storage: Arc<Storage>,
    namespace: String,
}

impl ScopedStorage {
    pub fn new(storage: Arc<Storage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

#[async_trait]
impl RecordStore for ScopedStorage {
    async fn fetch_entities(&self) -> Result<Vec<CustomerRecord>> {
        self.storage.list_customers(&self.namespace).await
    }

    async fn fetch_offerings(&self) -> Result<Vec<OfferingRecord>> {
        self.storage.list_products(&self.namespace).await
    }

    async fn fetch_campaigns(&self) -> Result<Vec<CampaignRecord>> {
        self.storage.list_campaigns(&self.namespace).await
    }

    async fn fetch_playbooks(&self) -> Result<Vec<PlaybookRecord>> {
        self.storage.list_sales_plays(&self.namespace).await
    }

    async fn append_analysis(&self, analysis: &StoredAnalysis) -> Result<()> {
        self.storage.append_analysis(&self.namespace, analysis).await
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-process record store.
#[derive(Default)]
pub struct MemoryStore {
    customers: Vec<CustomerRecord>,
    offerings: Vec<OfferingRecord>,
    campaigns: Vec<CampaignRecord>,
    playbooks: Vec<PlaybookRecord>,
    analyses: Mutex<Vec<StoredAnalysis>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(mut self, customers: Vec<CustomerRecord>) -> Self {
        self.customers = customers;
        self
    }

    pub fn with_offerings(mut self, offerings: Vec<OfferingRecord>) -> Self {
        self.offerings = offerings;
        self
    }

    pub fn with_campaigns(mut self, campaigns: Vec<CampaignRecord>) -> Self {
        self.campaigns = campaigns;
        self
    }

    pub fn with_playbooks(mut self, playbooks: Vec<PlaybookRecord>) -> Self {
        self.playbooks = playbooks;
        self
    }

    /// Make every subsequent read fail with a storage error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent append fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Analyses appended so far, in append order.
    pub fn analyses(&self) -> Vec<StoredAnalysis> {
        self.analyses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BizIntelError::storage("record store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_entities(&self) -> Result<Vec<CustomerRecord>> {
        self.check_read()?;
        Ok(self.customers.clone())
    }

    async fn fetch_offerings(&self) -> Result<Vec<OfferingRecord>> {
        self.check_read()?;
        Ok(self.offerings.clone())
    }

    async fn fetch_campaigns(&self) -> Result<Vec<CampaignRecord>> {
        self.check_read()?;
        let mut campaigns = self.campaigns.clone();
        crate::aggregator::sort_campaigns(&mut campaigns);
        Ok(campaigns)
    }

    async fn fetch_playbooks(&self) -> Result<Vec<PlaybookRecord>> {
        self.check_read()?;
        Ok(self.playbooks.clone())
    }

    async fn append_analysis(&self, analysis: &StoredAnalysis) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BizIntelError::storage("record store rejected write"));
        }
        self.analyses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(analysis.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizintel_shared::AnalysisRecord;
    use chrono::Utc;
    use uuid::Uuid;

    fn analysis(company: &str) -> StoredAnalysis {
        StoredAnalysis {
            analyzed_at: Utc::now(),
            company_name: company.into(),
            directive: "review".into(),
            analyzed_by: "tester".into(),
            existing_customer: false,
            record: AnalysisRecord::default(),
            full_analysis: String::new(),
        }
    }

    #[tokio::test]
    async fn memory_store_failure_injection() {
        let store = MemoryStore::new();
        assert!(store.fetch_entities().await.unwrap().is_empty());

        store.fail_reads(true);
        assert!(store.fetch_entities().await.is_err());
        assert!(store.fetch_campaigns().await.is_err());

        store.fail_writes(true);
        assert!(store.append_analysis(&analysis("A")).await.is_err());
        store.fail_writes(false);
        store.append_analysis(&analysis("B")).await.unwrap();
        assert_eq!(store.analyses().len(), 1);
    }

    #[tokio::test]
    async fn scoped_storage_reads_its_namespace_only() {
        let tmp = std::env::temp_dir().join(format!("bi_test_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.unwrap());
        let customer = CustomerRecord {
            company_name: "Initech".into(),
            industry: Some("Software".into()),
            account_manager: None,
            relationship_status: None,
            last_interaction_date: None,
            auditor_firm: None,
            annual_revenue: None,
            employee_count: None,
            headquarters_location: None,
        };
        storage.insert_customer("east", &customer).await.unwrap();

        let east = ScopedStorage::new(storage.clone(), "east");
        let west = ScopedStorage::new(storage, "west");
        assert_eq!(east.fetch_entities().await.unwrap().len(), 1);
        assert!(west.fetch_entities().await.unwrap().is_empty());

        east.append_analysis(&analysis("Initech")).await.unwrap();
        assert_eq!(east.storage().list_analyses("east").await.unwrap().len(), 1);
    }
}

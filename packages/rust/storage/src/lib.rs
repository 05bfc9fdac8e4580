//! libSQL storage layer for the bizintel record store.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the four
//! reference collections (customers, products, marketing budget, sales plays)
//! and the append-only `analysis_complete` table. Every row is scoped by a
//! namespace column so several datasets can share one file.
//!
//! **Access rules:**
//! - CLI commands that seed or analyse: read-write via [`Storage::open`]
//! - Reporting commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use bizintel_shared::{
    AnalysisRecord, AuditorStatus, BizIntelError, CampaignRecord, CustomerRecord, Field,
    OfferingRecord, PlaybookRecord, Result,
};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;

/// Value written to `analysis_status` for every appended analysis.
pub const ANALYSIS_STATUS_SUCCESS: &str = "success";

/// Logical collections and their backing tables, in display order.
pub const COLLECTIONS: [&str; 5] = [
    "customers",
    "products",
    "marketing_budget",
    "sales_plays",
    "analysis_complete",
];

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BizIntelError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(BizIntelError::storage)?;
        let conn = db.connect().map_err(BizIntelError::storage)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(BizIntelError::storage)?;
        let conn = db.connect().map_err(BizIntelError::storage)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        BizIntelError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(BizIntelError::storage("database is opened in read-only mode"));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Customers (entities)
    // -----------------------------------------------------------------------

    pub async fn insert_customer(&self, ns: &str, customer: &CustomerRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO customers (namespace, company_name, industry, account_manager,
                    relationship_status, last_interaction_date, auditor_firm, annual_revenue,
                    employee_count, headquarters_location)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    ns,
                    customer.company_name.as_str(),
                    customer.industry.as_deref(),
                    customer.account_manager.as_deref(),
                    customer.relationship_status.as_deref(),
                    customer.last_interaction_date.as_deref(),
                    customer.auditor_firm.as_deref(),
                    customer.annual_revenue.as_deref(),
                    customer.employee_count.as_deref(),
                    customer.headquarters_location.as_deref(),
                ],
            )
            .await
            .map_err(BizIntelError::storage)?;
        Ok(())
    }

    /// All customers in `ns`, in insertion order.
    pub async fn list_customers(&self, ns: &str) -> Result<Vec<CustomerRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT company_name, industry, account_manager, relationship_status,
                    last_interaction_date, auditor_firm, annual_revenue, employee_count,
                    headquarters_location
                 FROM customers WHERE namespace = ?1 ORDER BY id",
                params![ns],
            )
            .await
            .map_err(BizIntelError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(BizIntelError::storage)? {
            results.push(CustomerRecord {
                company_name: row.get::<String>(0).map_err(BizIntelError::storage)?,
                industry: row.get::<String>(1).ok(),
                account_manager: row.get::<String>(2).ok(),
                relationship_status: row.get::<String>(3).ok(),
                last_interaction_date: row.get::<String>(4).ok(),
                auditor_firm: row.get::<String>(5).ok(),
                annual_revenue: row.get::<String>(6).ok(),
                employee_count: row.get::<String>(7).ok(),
                headquarters_location: row.get::<String>(8).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Products (offerings)
    // -----------------------------------------------------------------------

    pub async fn insert_product(&self, ns: &str, product: &OfferingRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO products (namespace, product_name, product_category,
                    target_industries, features, competitive_advantage, base_price)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ns,
                    product.product_name.as_str(),
                    product.product_category.as_deref(),
                    product.target_industries.as_deref(),
                    product.features.as_deref(),
                    product.competitive_advantage.as_deref(),
                    product.base_price.as_deref(),
                ],
            )
            .await
            .map_err(BizIntelError::storage)?;
        Ok(())
    }

    pub async fn list_products(&self, ns: &str) -> Result<Vec<OfferingRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT product_name, product_category, target_industries, features,
                    competitive_advantage, base_price
                 FROM products WHERE namespace = ?1 ORDER BY id",
                params![ns],
            )
            .await
            .map_err(BizIntelError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(BizIntelError::storage)? {
            results.push(OfferingRecord {
                product_name: row.get::<String>(0).map_err(BizIntelError::storage)?,
                product_category: row.get::<String>(1).ok(),
                target_industries: row.get::<String>(2).ok(),
                features: row.get::<String>(3).ok(),
                competitive_advantage: row.get::<String>(4).ok(),
                base_price: row.get::<String>(5).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Marketing budget (campaigns)
    // -----------------------------------------------------------------------

    pub async fn insert_campaign(&self, ns: &str, campaign: &CampaignRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO marketing_budget (namespace, campaign_name, target_industry,
                    budget_allocated, conversion_rate, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    ns,
                    campaign.campaign_name.as_str(),
                    campaign.target_industry.as_deref(),
                    campaign.budget_allocated,
                    campaign.conversion_rate,
                    campaign.end_date.as_deref(),
                ],
            )
            .await
            .map_err(BizIntelError::storage)?;
        Ok(())
    }

    /// Campaigns in `ns`, best conversion rate first, then largest budget.
    pub async fn list_campaigns(&self, ns: &str) -> Result<Vec<CampaignRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT campaign_name, target_industry, budget_allocated, conversion_rate, end_date
                 FROM marketing_budget WHERE namespace = ?1
                 ORDER BY conversion_rate DESC, budget_allocated DESC, id",
                params![ns],
            )
            .await
            .map_err(BizIntelError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(BizIntelError::storage)? {
            results.push(CampaignRecord {
                campaign_name: row.get::<String>(0).map_err(BizIntelError::storage)?,
                target_industry: row.get::<String>(1).ok(),
                budget_allocated: row.get::<f64>(2).ok(),
                conversion_rate: row.get::<f64>(3).ok(),
                end_date: row.get::<String>(4).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Sales plays (playbooks)
    // -----------------------------------------------------------------------

    pub async fn insert_sales_play(&self, ns: &str, play: &PlaybookRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO sales_plays (namespace, play_name, target_persona, target_industry,
                    value_proposition, engagement_strategy, success_metrics, recommended_products)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    ns,
                    play.play_name.as_str(),
                    play.target_persona.as_deref(),
                    play.target_industry.as_deref(),
                    play.value_proposition.as_deref(),
                    play.engagement_strategy.as_deref(),
                    play.success_metrics.as_deref(),
                    play.recommended_products.as_deref(),
                ],
            )
            .await
            .map_err(BizIntelError::storage)?;
        Ok(())
    }

    pub async fn list_sales_plays(&self, ns: &str) -> Result<Vec<PlaybookRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT play_name, target_persona, target_industry, value_proposition,
                    engagement_strategy, success_metrics, recommended_products
                 FROM sales_plays WHERE namespace = ?1 ORDER BY id",
                params![ns],
            )
            .await
            .map_err(BizIntelError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(BizIntelError::storage)? {
            results.push(PlaybookRecord {
                play_name: row.get::<String>(0).map_err(BizIntelError::storage)?,
                target_persona: row.get::<String>(1).ok(),
                target_industry: row.get::<String>(2).ok(),
                value_proposition: row.get::<String>(3).ok(),
                engagement_strategy: row.get::<String>(4).ok(),
                success_metrics: row.get::<String>(5).ok(),
                recommended_products: row.get::<String>(6).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Completed analyses (append-only)
    // -----------------------------------------------------------------------

    /// Append one completed analysis. Rows are never updated afterwards.
    pub async fn append_analysis(&self, ns: &str, analysis: &StoredAnalysis) -> Result<()> {
        self.check_writable()?;
        let record = &analysis.record;
        let auditor = record.auditor_status.known().map(ToString::to_string);
        self.conn
            .execute(
                "INSERT INTO analysis_complete (namespace, analyzed_at, company_name, directive,
                    analyzed_by, existing_customer, analysis_status, prospect_level,
                    prospect_score, industry, location, employees, revenue, auditor_status,
                    win_themes, key_personnel, engagement_strategy, gtm_immediate,
                    gtm_short_term, gtm_mid_term, gtm_long_term, recommended_solutions,
                    full_analysis)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                params![
                    ns,
                    analysis.analyzed_at.to_rfc3339(),
                    analysis.company_name.as_str(),
                    analysis.directive.as_str(),
                    analysis.analyzed_by.as_str(),
                    i64::from(analysis.existing_customer),
                    ANALYSIS_STATUS_SUCCESS,
                    text(&record.prospect_level),
                    record.prospect_score.known().map(|s| i64::from(*s)),
                    text(&record.industry),
                    text(&record.location),
                    text(&record.employees),
                    text(&record.revenue),
                    auditor,
                    text(&record.win_themes),
                    text(&record.key_personnel),
                    text(&record.engagement_strategy),
                    text(&record.gtm_immediate),
                    text(&record.gtm_short_term),
                    text(&record.gtm_mid_term),
                    text(&record.gtm_long_term),
                    text(&record.recommended_solutions),
                    analysis.full_analysis.as_str(),
                ],
            )
            .await
            .map_err(BizIntelError::storage)?;

        tracing::debug!(company = %analysis.company_name, ns, "analysis appended");
        Ok(())
    }

    /// Completed analyses in `ns`, newest first.
    pub async fn list_analyses(&self, ns: &str) -> Result<Vec<StoredAnalysis>> {
        let mut rows = self
            .conn
            .query(
                "SELECT analyzed_at, company_name, directive, analyzed_by, existing_customer,
                    prospect_level, prospect_score, industry, location, employees, revenue,
                    auditor_status, win_themes, key_personnel, engagement_strategy,
                    gtm_immediate, gtm_short_term, gtm_mid_term, gtm_long_term,
                    recommended_solutions, full_analysis
                 FROM analysis_complete WHERE namespace = ?1
                 ORDER BY analyzed_at DESC, id DESC",
                params![ns],
            )
            .await
            .map_err(BizIntelError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(BizIntelError::storage)? {
            results.push(row_to_analysis(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Collection listing
    // -----------------------------------------------------------------------

    /// Row count per logical collection in `ns`, in [`COLLECTIONS`] order.
    pub async fn collection_counts(&self, ns: &str) -> Result<Vec<CollectionCount>> {
        let mut counts = Vec::with_capacity(COLLECTIONS.len());
        for name in COLLECTIONS {
            let sql = format!("SELECT COUNT(*) FROM {name} WHERE namespace = ?1");
            let mut rows = self
                .conn
                .query(&sql, params![ns])
                .await
                .map_err(BizIntelError::storage)?;
            let rows_in_table = match rows.next().await.map_err(BizIntelError::storage)? {
                Some(row) => row.get::<i64>(0).map_err(BizIntelError::storage)?.max(0) as u64,
                None => 0,
            };
            counts.push(CollectionCount {
                name: name.to_string(),
                rows: rows_in_table,
            });
        }
        Ok(counts)
    }
}

/// One row of `analysis_complete`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAnalysis {
    pub analyzed_at: DateTime<Utc>,
    pub company_name: String,
    pub directive: String,
    /// Identity of the acting user.
    pub analyzed_by: String,
    pub existing_customer: bool,
    pub record: AnalysisRecord,
    /// Raw narrative text the record was extracted from.
    pub full_analysis: String,
}

/// Row count of one logical collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionCount {
    pub name: String,
    pub rows: u64,
}

fn text(field: &Field<String>) -> Option<&str> {
    field.known().map(String::as_str)
}

fn text_field(row: &libsql::Row, idx: i32) -> Field<String> {
    row.get::<String>(idx).ok().into()
}

fn row_to_analysis(row: &libsql::Row) -> Result<StoredAnalysis> {
    let analyzed_at = {
        let s: String = row.get(0).map_err(BizIntelError::storage)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| BizIntelError::Storage(format!("invalid date: {e}")))?
    };
    let prospect_score = row
        .get::<i64>(6)
        .ok()
        .and_then(|v| u8::try_from(v).ok())
        .filter(|v| *v <= 100)
        .into();
    let auditor_status = row
        .get::<String>(11)
        .ok()
        .map(|s| AuditorStatus::from_label(&s))
        .into();

    Ok(StoredAnalysis {
        analyzed_at,
        company_name: row.get::<String>(1).map_err(BizIntelError::storage)?,
        directive: row.get::<String>(2).map_err(BizIntelError::storage)?,
        analyzed_by: row.get::<String>(3).map_err(BizIntelError::storage)?,
        existing_customer: row.get::<i64>(4).map_err(BizIntelError::storage)? != 0,
        record: AnalysisRecord {
            prospect_level: text_field(row, 5),
            prospect_score,
            industry: text_field(row, 7),
            location: text_field(row, 8),
            employees: text_field(row, 9),
            revenue: text_field(row, 10),
            auditor_status,
            win_themes: text_field(row, 12),
            key_personnel: text_field(row, 13),
            engagement_strategy: text_field(row, 14),
            gtm_immediate: text_field(row, 15),
            gtm_short_term: text_field(row, 16),
            gtm_mid_term: text_field(row, 17),
            gtm_long_term: text_field(row, 18),
            recommended_solutions: text_field(row, 19),
        },
        full_analysis: row.get::<String>(20).map_err(BizIntelError::storage)?,
    })
}

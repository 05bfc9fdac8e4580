//! SQL migration definitions for the bizintel record store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Reference collections: customers, products, marketing_budget, sales_plays",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS customers (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace             TEXT NOT NULL,
    company_name          TEXT NOT NULL,
    industry              TEXT,
    account_manager       TEXT,
    relationship_status   TEXT,
    last_interaction_date TEXT,
    auditor_firm          TEXT,
    annual_revenue        TEXT,
    employee_count        TEXT,
    headquarters_location TEXT
);

CREATE INDEX IF NOT EXISTS idx_customers_ns ON customers(namespace);

CREATE TABLE IF NOT EXISTS products (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace             TEXT NOT NULL,
    product_name          TEXT NOT NULL,
    product_category      TEXT,
    target_industries     TEXT,
    features              TEXT,
    competitive_advantage TEXT,
    base_price            TEXT
);

CREATE INDEX IF NOT EXISTS idx_products_ns ON products(namespace);

CREATE TABLE IF NOT EXISTS marketing_budget (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace        TEXT NOT NULL,
    campaign_name    TEXT NOT NULL,
    target_industry  TEXT,
    budget_allocated REAL,
    conversion_rate  REAL,
    end_date         TEXT
);

CREATE INDEX IF NOT EXISTS idx_marketing_budget_ns ON marketing_budget(namespace);

CREATE TABLE IF NOT EXISTS sales_plays (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace            TEXT NOT NULL,
    play_name            TEXT NOT NULL,
    target_persona       TEXT,
    target_industry      TEXT,
    value_proposition    TEXT,
    engagement_strategy  TEXT,
    success_metrics      TEXT,
    recommended_products TEXT
);

CREATE INDEX IF NOT EXISTS idx_sales_plays_ns ON sales_plays(namespace);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Append-only completed analyses",
            sql: r#"
CREATE TABLE IF NOT EXISTS analysis_complete (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace             TEXT NOT NULL,
    analyzed_at           TEXT NOT NULL,
    company_name          TEXT NOT NULL,
    directive             TEXT NOT NULL,
    analyzed_by           TEXT NOT NULL,
    existing_customer     INTEGER NOT NULL DEFAULT 0,
    analysis_status       TEXT NOT NULL,
    prospect_level        TEXT,
    prospect_score        INTEGER,
    industry              TEXT,
    location              TEXT,
    employees             TEXT,
    revenue               TEXT,
    auditor_status        TEXT,
    win_themes            TEXT,
    key_personnel         TEXT,
    engagement_strategy   TEXT,
    gtm_immediate         TEXT,
    gtm_short_term        TEXT,
    gtm_mid_term          TEXT,
    gtm_long_term         TEXT,
    recommended_solutions TEXT,
    full_analysis         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analysis_complete_ns ON analysis_complete(namespace, analyzed_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

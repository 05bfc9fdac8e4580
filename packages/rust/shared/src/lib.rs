//! Shared types, error model, and configuration for bizintel.
//!
//! This crate is the foundation depended on by all other bizintel crates.
//! It provides:
//! - [`BizIntelError`], the unified error type
//! - Domain types ([`MatchContext`], [`AnalysisRecord`], [`Field`], reference records)
//! - Batch job snapshots ([`BatchJob`], [`JobId`], [`JobStatus`])
//! - Configuration ([`AppConfig`], [`GenerationConfig`], config loading)

pub mod config;
pub mod error;
pub mod job;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GenerationConfig, GenerationSettings, JobsConfig, StoreConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{BizIntelError, Result};
pub use job::{BatchEntry, BatchJob, BatchOutcome, JobId, JobStatus};
pub use types::{
    AnalysisRecord, AuditorStatus, CampaignRecord, ContextSummary, CustomerRecord, Field,
    MatchContext, OfferingRecord, PlaybookRecord, UNKNOWN,
};

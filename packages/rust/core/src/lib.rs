//! Core analysis pipeline for bizintel.
//!
//! Reference data is aggregated for an entity, rendered into a directive
//! document, sent to a narrative generator and parsed back into a structured
//! [`AnalysisRecord`](bizintel_shared::AnalysisRecord). The orchestrator runs
//! that pipeline over batches as tracked background jobs.

pub mod aggregator;
pub mod explorer;
pub mod export;
pub mod extractor;
pub mod generator;
pub mod input;
pub mod jobs;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod store;
pub mod template;

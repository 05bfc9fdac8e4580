//! Single-entity analysis: context → prompt → narrative → record → write-back.
//!
//! Both the `analyze` command and every entity of a batch job go through
//! [`analyze_entity`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use bizintel_shared::{AnalysisRecord, BatchOutcome, ContextSummary, GenerationConfig, Result};
use bizintel_storage::StoredAnalysis;

use crate::aggregator;
use crate::extractor;
use crate::generator::{GenerationRequest, NarrativeGenerator};
use crate::prompt;
use crate::store::RecordStore;

/// Backends an analysis runs against.
#[derive(Clone)]
pub struct AnalysisDeps {
    pub store: Arc<dyn RecordStore>,
    pub generator: Arc<dyn NarrativeGenerator>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl AnalysisDeps {
    /// Use the sampling parameters from `config`.
    pub fn new(
        store: Arc<dyn RecordStore>,
        generator: Arc<dyn NarrativeGenerator>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            store,
            generator,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Result of analysing one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityAnalysis {
    pub entity: String,
    pub directive: String,
    pub record: AnalysisRecord,
    pub context: ContextSummary,
    pub narrative: String,
}

impl EntityAnalysis {
    /// Project into the shape a batch job collects.
    pub fn into_outcome(self) -> BatchOutcome {
        BatchOutcome {
            company: self.entity,
            directive: self.directive,
            record: self.record,
            customer_match: self.context.customer_match,
            narrative: self.narrative,
        }
    }
}

/// Run the full analysis for one entity.
///
/// Only a generation failure is returned as an error. Store read failures
/// degrade to an empty context and write-back failures are logged.
#[instrument(skip_all, fields(entity = %entity))]
pub async fn analyze_entity(
    entity: &str,
    directive: &str,
    analyst: &str,
    deps: &AnalysisDeps,
) -> Result<EntityAnalysis> {
    let start = Instant::now();

    let ctx = aggregator::aggregate(entity, deps.store.as_ref()).await;
    let request = GenerationRequest {
        prompt: prompt::render_prompt(entity, directive, &ctx),
        temperature: deps.temperature,
        max_output_tokens: deps.max_output_tokens,
    };

    let narrative = deps.generator.generate(&request).await?;

    let mut record = extractor::extract(&narrative);
    if let Some(customer) = ctx.entity_record() {
        record.merge_customer(customer);
    }

    let stored = StoredAnalysis {
        analyzed_at: Utc::now(),
        company_name: entity.to_string(),
        directive: directive.to_string(),
        analyzed_by: analyst.to_string(),
        existing_customer: ctx.is_existing_customer(),
        record: record.clone(),
        full_analysis: narrative.clone(),
    };
    if let Err(e) = deps.store.append_analysis(&stored).await {
        warn!(error = %e, "failed to persist analysis, continuing");
    }

    info!(
        score = record.ranking_score(),
        existing_customer = ctx.is_existing_customer(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "entity analysed"
    );

    Ok(EntityAnalysis {
        entity: entity.to_string(),
        directive: directive.to_string(),
        record,
        context: ctx.summary(),
        narrative,
    })
}

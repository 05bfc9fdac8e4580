//! Batch job types shared between the orchestrator and its pollers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::AnalysisRecord;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for batch job identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Submission and outcomes
// ---------------------------------------------------------------------------

/// Lifecycle state of a batch job.
///
/// Only `Processing -> Completed` and `Processing -> Failed` are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => f.write_str("processing"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// One row of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub company_name: String,
    pub directive: String,
}

impl BatchEntry {
    pub fn new(company_name: impl Into<String>, directive: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            directive: directive.into(),
        }
    }
}

/// The result of one successfully analysed entity within a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub company: String,
    pub directive: String,
    pub record: AnalysisRecord,
    /// Canonical customer name when the entity matched the record store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_match: Option<String>,
    pub narrative: String,
}

impl BatchOutcome {
    /// Score used for ranking (unknown = 0).
    pub fn score(&self) -> u8 {
        self.record.ranking_score()
    }
}

// ---------------------------------------------------------------------------
// BatchJob
// ---------------------------------------------------------------------------

/// Snapshot of a batch job as seen by a poller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchJob {
    pub id: JobId,
    pub status: JobStatus,
    pub total: usize,
    pub completed: usize,
    /// Completion order while processing; score-descending once completed.
    pub results: Vec<BatchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// A freshly registered job in `processing` state.
    pub fn new(id: JobId, total: usize) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            total,
            completed: 0,
            results: Vec::new(),
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// `completed / total * 100`.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

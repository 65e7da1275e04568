//! Run ingestion payload and response DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{RollupCounters, RunMetadata, RunStatus, SuiteStatus};

/// Full run payload: the run plus nested suites and specs.
///
/// Timestamps are RFC 3339 strings and are validated by the ingestion service,
/// so a bad spec timestamp skips that spec instead of rejecting the whole body.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct IngestRunRequest {
    pub project_id: String,
    /// Externally supplied, unique run identifier.
    pub run_id: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Explicit duration; overrides `end_time - start_time`.
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub metadata: RunMetadata,
    #[serde(default)]
    pub suites: Vec<SuitePayload>,
}

/// One suite in an ingestion payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct SuitePayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub specs: Vec<SpecPayload>,
}

/// One spec execution in an ingestion payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct SpecPayload {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Reported duration, used to fill a missing start or end bound.
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default, alias = "message")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
    /// Retries before the reported outcome; absent means none.
    #[serde(default)]
    pub retry_count: i32,
}

/// Non-fatal problem encountered while ingesting a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestionWarning {
    /// Spec failed validation and was not stored.
    SpecSkipped {
        suite: String,
        index: usize,
        reason: String,
    },
    /// Spec was valid but the store rejected the write.
    SpecFailed {
        suite: String,
        index: usize,
        reason: String,
    },
    /// Suite row could not be created; its specs were not ingested.
    SuiteFailed {
        suite: String,
        specs: usize,
        reason: String,
    },
}

/// Per-suite result of an ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuiteSummary {
    pub id: Uuid,
    pub name: String,
    pub status: SuiteStatus,
    pub counters: RollupCounters,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunSummary {
    /// Internal UUID of the persisted run.
    pub id: Uuid,
    pub run_id: String,
    pub project_id: String,
    pub status: RunStatus,
    pub counters: RollupCounters,
    pub suites: Vec<SuiteSummary>,
    /// Specs from the payload that were not persisted.
    pub skipped_specs: usize,
    #[serde(default)]
    pub warnings: Vec<IngestionWarning>,
}

//! Suite domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::RollupCounters;

/// Suite status, derived from spec outcomes at rollup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuiteStatus {
    /// Created, not yet rolled up.
    Running,
    Passed,
    Failed,
}

impl SuiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn from_counters(counters: &RollupCounters) -> Self {
        if counters.failed > 0 {
            Self::Failed
        } else {
            Self::Passed
        }
    }
}

/// A named group of specs within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Suite {
    pub id: Uuid,
    /// Owning run (internal UUID).
    pub run_id: Uuid,
    pub name: String,
    pub status: SuiteStatus,
    /// Position in the ingested payload.
    pub sequence: i32,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub counters: RollupCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

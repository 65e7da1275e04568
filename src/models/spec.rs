//! Spec (single test case execution) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Terminal status of a spec execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    Passed,
    Failed,
    Skipped,
    Pending,
}

impl SpecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Pending => "pending",
        }
    }

    /// Strict parse: anything outside the four statuses is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted spec execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Spec {
    pub id: Uuid,
    pub suite_id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    pub status: SpecStatus,
    /// Position within the suite payload.
    pub sequence: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub retry_count: i32,
    pub is_flaky: bool,
    pub created_at: DateTime<Utc>,
}

/// Specs of one suite.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpecListResponse {
    pub suite_id: Uuid,
    pub specs: Vec<Spec>,
}

/// Query parameters for listing a suite's specs.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ListSpecsQuery {
    #[serde(default)]
    pub status: Option<SpecStatus>,
}

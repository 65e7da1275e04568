//! Run domain models and DTOs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Pagination, RollupCounters, Suite};

/// Run status.
///
/// Runs start as `running` and move forward to exactly one terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Re-applying the current status is allowed (no-op); terminal statuses are final.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        *self == next || (*self == Self::Running && next.is_terminal())
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a persisted row. Reads only ever see `Active` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Active,
    Deleted,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Free-form run metadata (stored as a JSON object of strings).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RunMetadata(pub BTreeMap<String, String>);

impl RunMetadata {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect(),
        )
    }

    /// Read metadata back from a JSON object column.
    ///
    /// Non-string scalar values are kept in their JSON text form; nested values are dropped.
    pub fn from_json(value: Option<&JsonValue>) -> Self {
        let Some(JsonValue::Object(map)) = value else {
            return Self::default();
        };

        let entries = map
            .iter()
            .filter_map(|(k, v)| match v {
                JsonValue::String(s) => Some((k.clone(), s.clone())),
                JsonValue::Number(n) => Some((k.clone(), n.to_string())),
                JsonValue::Bool(b) => Some((k.clone(), b.to_string())),
                _ => None,
            })
            .collect();

        Self(entries)
    }
}

/// A persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Run {
    /// Internal UUID.
    pub id: Uuid,
    pub project_id: String,
    /// Externally supplied run identifier (unique).
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "RunMetadata::is_empty")]
    pub metadata: RunMetadata,
    pub counters: RollupCounters,
    pub state: EntityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Run with its suites.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunDetailResponse {
    pub run: Run,
    pub suites: Vec<Suite>,
}

/// Run list response with pagination.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunListResponse {
    pub runs: Vec<Run>,
    pub pagination: Pagination,
}

/// Query parameters for listing runs.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ListRunsQuery {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Request body for an explicit run status update.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateRunStatusRequest {
    pub status: RunStatus,
    /// End time to record on a terminal transition (defaults to now).
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

//! Domain models for Flakewatch.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod ingest;
pub mod run;
pub mod spec;
pub mod suite;

// Re-export commonly used types
pub use flaky_test::{
    FlakyKey, FlakySeverity, FlakyStatus, FlakyTest, FlakyTestListResponse, ListFlakyTestsQuery,
};
pub use ingest::{IngestRunRequest, IngestionWarning, RunSummary, SpecPayload, SuitePayload, SuiteSummary};
pub use run::{
    EntityState, ListRunsQuery, Run, RunDetailResponse, RunListResponse, RunMetadata, RunStatus,
    UpdateRunStatusRequest,
};
pub use spec::{ListSpecsQuery, Spec, SpecListResponse, SpecStatus};
pub use suite::{Suite, SuiteStatus};

/// Aggregate spec counters carried by suites and runs.
///
/// `pending` specs are counted as skipped, so `total == passed + failed + skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RollupCounters {
    pub total: i32,
    pub passed: i32,
    pub failed: i32,
    pub skipped: i32,
}

impl RollupCounters {
    /// Count one spec outcome.
    pub fn record(&mut self, status: SpecStatus) {
        self.total += 1;
        match status {
            SpecStatus::Passed => self.passed += 1,
            SpecStatus::Failed => self.failed += 1,
            SpecStatus::Skipped | SpecStatus::Pending => self.skipped += 1,
        }
    }

    /// Fold a child's counters into this one.
    pub fn absorb(&mut self, child: &RollupCounters) {
        self.total += child.total;
        self.passed += child.passed;
        self.failed += child.failed;
        self.skipped += child.skipped;
    }

    pub fn from_statuses<I: IntoIterator<Item = SpecStatus>>(statuses: I) -> Self {
        let mut counters = Self::default();
        for status in statuses {
            counters.record(status);
        }
        counters
    }
}

/// Pagination parameters.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl PaginationParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(default_page()).max(1)
    }

    /// Calculate the offset for database queries.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.clamped_limit())
    }

    /// Clamp limit to maximum allowed value.
    pub fn clamped_limit(&self) -> u32 {
        self.limit.unwrap_or(default_limit()).clamp(1, 100)
    }
}

/// Pagination metadata for responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Create pagination metadata.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            ((total as f64) / (limit as f64)).ceil() as u32
        };

        Pagination {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

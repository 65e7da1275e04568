//! Run ingestion and run lifecycle operations.

use std::sync::Arc;

use tracing::{Instrument, Span, error, field, info, info_span, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::{ExecutionStore, NewRun, NewSpec, NewSuite, RunQuery};
use crate::error::{AppError, AppResult};
use crate::models::{
    FlakyKey, IngestRunRequest, IngestionWarning, ListRunsQuery, Pagination, PaginationParams,
    Run, RunDetailResponse, RunListResponse, RunSummary, SpecListResponse, SpecPayload,
    SpecStatus, Suite, SuitePayload, SuiteSummary, UpdateRunStatusRequest,
};

use super::flaky::FlakyClassifier;
use super::hierarchy::{
    derive_duration, name_or_placeholder, resolve_run_window, resolve_suite_window,
    validate_payload, validate_spec,
};
use super::rollup::RollupAggregator;

/// How far an ingestion got. Recorded on the tracing span and in error logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Received,
    RunCreated,
    SuitesCreated,
    SpecsCreated,
    RolledUp,
    Done,
}

impl IngestionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::RunCreated => "run_created",
            Self::SuitesCreated => "suites_created",
            Self::SpecsCreated => "specs_created",
            Self::RolledUp => "rolled_up",
            Self::Done => "done",
        }
    }
}

/// A failed spec counts as flaky when it was retried before the reported outcome.
pub fn is_flaky_execution(status: SpecStatus, retry_count: i32) -> bool {
    status == SpecStatus::Failed && retry_count > 0
}

/// Per-request bookkeeping for one ingestion.
struct IngestionProgress {
    stage: IngestionStage,
    skipped_specs: usize,
    warnings: Vec<IngestionWarning>,
    suites: Vec<SuiteSummary>,
}

impl IngestionProgress {
    fn new() -> Self {
        Self {
            stage: IngestionStage::Received,
            skipped_specs: 0,
            warnings: Vec::new(),
            suites: Vec::new(),
        }
    }

    fn advance(&mut self, stage: IngestionStage) {
        self.stage = stage;
        Span::current().record("stage", stage.as_str());
    }
}

/// Turns run payloads into persisted Run / Suite / Spec rows.
#[derive(Clone)]
pub struct IngestionOrchestrator {
    store: Arc<dyn ExecutionStore>,
    rollup: RollupAggregator,
    classifier: Arc<FlakyClassifier>,
    clock: Arc<dyn Clock>,
}

impl IngestionOrchestrator {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        classifier: Arc<FlakyClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rollup: RollupAggregator::new(store.clone()),
            store,
            classifier,
            clock,
        }
    }

    /// Verify the execution store is reachable.
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }

    /// Ingest a complete run payload.
    ///
    /// Fails with `DuplicateRun` if the run identifier was ever used. Invalid
    /// or unwritable specs are skipped and reported as warnings.
    pub async fn ingest(&self, request: IngestRunRequest) -> AppResult<RunSummary> {
        let span = info_span!(
            "ingest_run",
            run_id = %request.run_id,
            project = %request.project_id,
            stage = field::Empty,
        );

        async move {
            let mut progress = IngestionProgress::new();
            progress.advance(IngestionStage::Received);

            match self.ingest_inner(&request, &mut progress).await {
                Ok(summary) => Ok(summary),
                Err(e) => {
                    match &e {
                        AppError::Validation(_) | AppError::DuplicateRun(_) => warn!(
                            "Ingestion rejected at stage {}: {}",
                            progress.stage.as_str(),
                            e
                        ),
                        _ => error!(
                            "Ingestion failed at stage {}: {}",
                            progress.stage.as_str(),
                            e
                        ),
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn ingest_inner(
        &self,
        request: &IngestRunRequest,
        progress: &mut IngestionProgress,
    ) -> AppResult<RunSummary> {
        validate_payload(request)?;
        let project_id = request.project_id.trim();
        let run_id = request.run_id.trim();

        if self.store.find_run_by_run_id(run_id).await?.is_some() {
            return Err(AppError::DuplicateRun(run_id.to_string()));
        }

        let window = resolve_run_window(request, self.clock.now())?;
        let run = self
            .store
            .insert_run(NewRun {
                project_id: project_id.to_string(),
                run_id: run_id.to_string(),
                branch: request.branch.clone(),
                commit_sha: request.commit_sha.clone(),
                environment: request.environment.clone(),
                start_time: window.start_time,
                end_time: window.end_time,
                duration_ms: window.duration_ms,
                metadata: request.metadata.clone(),
            })
            .await?;
        progress.advance(IngestionStage::RunCreated);

        for (sequence, suite_payload) in request.suites.iter().enumerate() {
            let Some(suite) = self
                .create_suite(&run, suite_payload, sequence, progress)
                .await
            else {
                continue;
            };
            progress.advance(IngestionStage::SuitesCreated);

            for (index, spec_payload) in suite_payload.specs.iter().enumerate() {
                self.ingest_spec(&run, &suite, spec_payload, index, progress)
                    .await;
            }

            let suite = self.rollup.recompute_suite_stats(suite.id).await?;
            progress.suites.push(SuiteSummary {
                id: suite.id,
                name: suite.name,
                status: suite.status,
                counters: suite.counters,
            });
        }
        progress.advance(IngestionStage::SpecsCreated);

        let run = self.rollup.recompute_run_stats(run.id).await?;
        progress.advance(IngestionStage::RolledUp);

        info!(
            "Ingested run {} ({} suites, {} specs, {} skipped)",
            run.run_id,
            progress.suites.len(),
            run.counters.total,
            progress.skipped_specs
        );
        progress.advance(IngestionStage::Done);

        Ok(RunSummary {
            id: run.id,
            run_id: run.run_id,
            project_id: run.project_id,
            status: run.status,
            counters: run.counters,
            suites: std::mem::take(&mut progress.suites),
            skipped_specs: progress.skipped_specs,
            warnings: std::mem::take(&mut progress.warnings),
        })
    }

    /// Create one suite row. On failure the suite and its specs are skipped.
    async fn create_suite(
        &self,
        run: &Run,
        payload: &SuitePayload,
        sequence: usize,
        progress: &mut IngestionProgress,
    ) -> Option<Suite> {
        let result = match resolve_suite_window(payload, run.start_time) {
            Ok(window) => {
                self.store
                    .insert_suite(NewSuite {
                        run_id: run.id,
                        name: payload.name.trim().to_string(),
                        sequence: sequence as i32,
                        start_time: window.start_time,
                        end_time: window.end_time,
                        duration_ms: window.duration_ms,
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(suite) => Some(suite),
            Err(e) => {
                warn!(
                    "Skipping suite '{}' and its {} specs: {}",
                    payload.name,
                    payload.specs.len(),
                    e
                );
                progress.skipped_specs += payload.specs.len();
                progress.warnings.push(IngestionWarning::SuiteFailed {
                    suite: payload.name.clone(),
                    specs: payload.specs.len(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Validate, persist and classify one spec. Problems become warnings.
    async fn ingest_spec(
        &self,
        run: &Run,
        suite: &Suite,
        payload: &SpecPayload,
        index: usize,
        progress: &mut IngestionProgress,
    ) {
        let validated = validate_spec(payload).and_then(|spec| {
            derive_duration(spec.start_time, spec.end_time).map(|duration| (spec, duration))
        });
        let (spec, duration_ms) = match validated {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "Skipping spec {} in suite '{}': {}",
                    index, suite.name, e
                );
                progress.skipped_specs += 1;
                progress.warnings.push(IngestionWarning::SpecSkipped {
                    suite: suite.name.clone(),
                    index,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let name = name_or_placeholder(payload.description.as_deref(), &suite.name);
        let is_flaky = is_flaky_execution(spec.status, spec.retry_count);

        let insert = self
            .store
            .insert_spec(NewSpec {
                suite_id: suite.id,
                run_id: run.id,
                name: name.clone(),
                status: spec.status,
                sequence: index as i32,
                start_time: spec.start_time,
                end_time: spec.end_time,
                duration_ms,
                error_message: payload.error_message.clone(),
                stack_trace: payload.stack_trace.clone(),
                retry_count: spec.retry_count,
                is_flaky,
            })
            .await;

        if let Err(e) = insert {
            warn!(
                "Failed to store spec '{}' in suite '{}': {}",
                name, suite.name, e
            );
            progress.skipped_specs += 1;
            progress.warnings.push(IngestionWarning::SpecFailed {
                suite: suite.name.clone(),
                index,
                reason: e.to_string(),
            });
            return;
        }

        let key = FlakyKey::new(&run.project_id, &name, &suite.name);
        if let Err(e) = self
            .classifier
            .record_execution(&key, is_flaky, payload.error_message.as_deref())
            .await
        {
            warn!(
                "Flaky tracking failed for '{}' in suite '{}': {}",
                name, suite.name, e
            );
        }
    }

    /// An active run with its suites in payload order.
    pub async fn get_run(&self, id: Uuid) -> AppResult<RunDetailResponse> {
        let run = self.active_run(id).await?;
        let suites = self.store.get_suites_by_run_id(run.id).await?;
        Ok(RunDetailResponse { run, suites })
    }

    /// Active runs, newest first.
    pub async fn list_runs(&self, query: &ListRunsQuery) -> AppResult<RunListResponse> {
        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };

        let (runs, total) = self
            .store
            .query_runs(&RunQuery {
                project_id: query.project_id.clone(),
                branch: query.branch.clone(),
                status: query.status,
                limit: u64::from(params.clamped_limit()),
                offset: params.offset(),
            })
            .await?;

        Ok(RunListResponse {
            runs,
            pagination: Pagination::new(params.page(), params.clamped_limit(), total),
        })
    }

    /// Specs of a suite that belongs to an active run.
    pub async fn list_specs(
        &self,
        suite_id: Uuid,
        status: Option<SpecStatus>,
    ) -> AppResult<SpecListResponse> {
        let suite = self
            .store
            .get_suite(suite_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Suite {}", suite_id)))?;

        // Suites of a deleted run are hidden along with it
        if self.store.get_run(suite.run_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Suite {}", suite_id)));
        }

        let mut specs = self.store.get_specs_by_suite_id(suite_id).await?;
        if let Some(status) = status {
            specs.retain(|s| s.status == status);
        }

        Ok(SpecListResponse { suite_id, specs })
    }

    /// Move a run forward to a terminal status.
    ///
    /// Re-applying the current status is a no-op. Terminal statuses are final.
    pub async fn update_run_status(
        &self,
        id: Uuid,
        request: &UpdateRunStatusRequest,
    ) -> AppResult<Run> {
        let run = self.active_run(id).await?;

        if run.status == request.status {
            return Ok(run);
        }
        if !run.status.can_transition_to(request.status) {
            return Err(AppError::Conflict(format!(
                "Run {} cannot move from {} to {}",
                run.run_id, run.status, request.status
            )));
        }

        // Only running -> terminal gets here; keep bounds recorded at ingestion
        let end_time = run
            .end_time
            .or(request.end_time)
            .unwrap_or_else(|| self.clock.now());
        let duration_ms = match run.duration_ms {
            Some(d) => d,
            None => derive_duration(run.start_time, end_time)?,
        };

        self.store
            .update_run_lifecycle(
                run.id,
                run.status,
                request.status,
                Some(end_time),
                Some(duration_ms),
            )
            .await?;
        info!(
            "Run {} moved from {} to {}",
            run.run_id, run.status, request.status
        );

        self.rollup.recompute_run_stats(run.id).await
    }

    /// Soft delete a run. Its identifier stays reserved.
    pub async fn delete_run(&self, id: Uuid) -> AppResult<()> {
        if !self.store.soft_delete_run(id).await? {
            return Err(AppError::NotFound(format!("Run {}", id)));
        }
        info!("Run {} deleted", id);
        Ok(())
    }

    async fn active_run(&self, id: Uuid) -> AppResult<Run> {
        self.store
            .get_run(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Run {}", id)))
    }
}

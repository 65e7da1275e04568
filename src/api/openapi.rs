//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flakewatch Server",
        version = "0.1.0",
        description = "API server for ingesting test runs, rolling up results and tracking flaky specs"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Run endpoints
        api::runs::ingest_run,
        api::runs::list_runs,
        api::runs::get_run,
        api::runs::update_run_status,
        api::runs::delete_run,
        api::runs::list_suite_specs,
        // Flaky test endpoints
        api::flaky_tests::list_flaky_tests,
        api::flaky_tests::get_flaky_test,
        api::flaky_tests::resolve_flaky_test,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            models::RollupCounters,
            models::Pagination,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Ingestion
            models::IngestRunRequest,
            models::SuitePayload,
            models::SpecPayload,
            models::IngestionWarning,
            models::RunSummary,
            models::SuiteSummary,
            // Runs
            models::RunStatus,
            models::EntityState,
            models::RunMetadata,
            models::Run,
            models::RunDetailResponse,
            models::RunListResponse,
            models::UpdateRunStatusRequest,
            models::Suite,
            models::SuiteStatus,
            models::Spec,
            models::SpecStatus,
            models::SpecListResponse,
            // Flaky tests
            models::FlakySeverity,
            models::FlakyStatus,
            models::FlakyTest,
            models::FlakyTestListResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Runs", description = "Run ingestion and lifecycle"),
        (name = "Flaky Tests", description = "Flaky spec tracking")
    )
)]
pub struct ApiDoc;

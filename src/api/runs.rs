//! Run API handlers.

use actix_web::{HttpResponse, web};
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    IngestRunRequest, ListRunsQuery, ListSpecsQuery, Run, RunDetailResponse, RunListResponse,
    RunSummary, SpecListResponse, UpdateRunStatusRequest,
};
use crate::services::IngestionOrchestrator;

/// Ingest a complete run.
///
/// Persists the run with its suites and specs, rolls up counters and updates
/// flaky tracking. Invalid specs are skipped and listed in `warnings`.
#[utoipa::path(
    post,
    path = "/api/v1/runs",
    tag = "Runs",
    request_body = IngestRunRequest,
    responses(
        (status = 201, description = "Run ingested", body = RunSummary),
        (status = 400, description = "Invalid payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Run identifier already used", body = crate::error::ErrorResponse),
    )
)]
pub async fn ingest_run(
    ingestion: web::Data<IngestionOrchestrator>,
    body: web::Json<IngestRunRequest>,
) -> AppResult<HttpResponse> {
    let summary = ingestion.ingest(body.into_inner()).await?;

    info!(
        "Run {} ingested as {} ({} specs, {} warnings)",
        summary.run_id,
        summary.id,
        summary.counters.total,
        summary.warnings.len()
    );

    Ok(HttpResponse::Created().json(summary))
}

/// List active runs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/runs",
    tag = "Runs",
    params(
        ("project_id" = Option<String>, Query, description = "Filter by project"),
        ("branch" = Option<String>, Query, description = "Filter by branch"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("page" = Option<u32>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u32>, Query, description = "Results per page (default 20, max 100)")
    ),
    responses(
        (status = 200, description = "List of runs", body = RunListResponse),
    )
)]
pub async fn list_runs(
    ingestion: web::Data<IngestionOrchestrator>,
    query: web::Query<ListRunsQuery>,
) -> AppResult<HttpResponse> {
    let response = ingestion.list_runs(&query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Get a run with its suites.
#[utoipa::path(
    get,
    path = "/api/v1/runs/{run_id}",
    tag = "Runs",
    params(
        ("run_id" = Uuid, Path, description = "Run UUID")
    ),
    responses(
        (status = 200, description = "Run details", body = RunDetailResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_run(
    ingestion: web::Data<IngestionOrchestrator>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let response = ingestion.get_run(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Move a running run to a terminal status.
#[utoipa::path(
    patch,
    path = "/api/v1/runs/{run_id}/status",
    tag = "Runs",
    params(
        ("run_id" = Uuid, Path, description = "Run UUID")
    ),
    request_body = UpdateRunStatusRequest,
    responses(
        (status = 200, description = "Run updated", body = Run),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorResponse),
    )
)]
pub async fn update_run_status(
    ingestion: web::Data<IngestionOrchestrator>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRunStatusRequest>,
) -> AppResult<HttpResponse> {
    let run = ingestion
        .update_run_status(path.into_inner(), &body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(run))
}

/// Soft delete a run.
#[utoipa::path(
    delete,
    path = "/api/v1/runs/{run_id}",
    tag = "Runs",
    params(
        ("run_id" = Uuid, Path, description = "Run UUID")
    ),
    responses(
        (status = 204, description = "Run deleted"),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_run(
    ingestion: web::Data<IngestionOrchestrator>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ingestion.delete_run(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// List the specs of a suite in payload order.
#[utoipa::path(
    get,
    path = "/api/v1/suites/{suite_id}/specs",
    tag = "Runs",
    params(
        ("suite_id" = Uuid, Path, description = "Suite UUID"),
        ("status" = Option<String>, Query, description = "Filter by spec status")
    ),
    responses(
        (status = 200, description = "Specs of the suite", body = SpecListResponse),
        (status = 404, description = "Suite not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_suite_specs(
    ingestion: web::Data<IngestionOrchestrator>,
    path: web::Path<Uuid>,
    query: web::Query<ListSpecsQuery>,
) -> AppResult<HttpResponse> {
    let response = ingestion
        .list_specs(path.into_inner(), query.into_inner().status)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Configure run routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/runs")
            .route(web::get().to(list_runs))
            .route(web::post().to(ingest_run)),
    )
    .service(
        web::resource("/runs/{run_id}")
            .route(web::get().to(get_run))
            .route(web::delete().to(delete_run)),
    )
    .service(web::resource("/runs/{run_id}/status").route(web::patch().to(update_run_status)))
    .service(web::resource("/suites/{suite_id}/specs").route(web::get().to(list_suite_specs)));
}

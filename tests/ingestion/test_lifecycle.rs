//! Run status transitions, deletion and read paths.

use chrono::Duration;

use flakewatch_lib::error::AppError;
use flakewatch_lib::models::{ListRunsQuery, RunStatus, SpecStatus, UpdateRunStatusRequest};

use super::support::*;

fn status(status: RunStatus) -> UpdateRunStatusRequest {
    UpdateRunStatusRequest {
        status,
        end_time: None,
    }
}

#[actix_rt::test]
async fn test_terminal_transition_sets_end_and_duration() {
    let h = Harness::new();
    let summary = h
        .ingestion
        .ingest(run_payload("run-1", vec![suite("unit", vec![spec("a", "passed")])]))
        .await
        .unwrap();

    let run = h
        .ingestion
        .update_run_status(summary.id, &status(RunStatus::Passed))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.end_time, Some(t0() + Duration::hours(1)));
    assert_eq!(run.duration_ms, Some(3_600_000));
    assert_eq!(run.counters.total, 1);
}

#[actix_rt::test]
async fn test_supplied_end_time_is_used() {
    let h = Harness::new();
    let summary = h
        .ingestion
        .ingest(run_payload("run-1", vec![]))
        .await
        .unwrap();

    let run = h
        .ingestion
        .update_run_status(
            summary.id,
            &UpdateRunStatusRequest {
                status: RunStatus::Failed,
                end_time: Some(t0() + Duration::seconds(30)),
            },
        )
        .await
        .unwrap();

    assert_eq!(run.duration_ms, Some(30_000));
}

#[actix_rt::test]
async fn test_status_never_moves_backward() {
    let h = Harness::new();
    let summary = h
        .ingestion
        .ingest(run_payload("run-1", vec![]))
        .await
        .unwrap();

    // Re-applying the current status is a no-op
    let run = h
        .ingestion
        .update_run_status(summary.id, &status(RunStatus::Running))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.end_time, None);

    h.ingestion
        .update_run_status(summary.id, &status(RunStatus::Completed))
        .await
        .unwrap();
    h.ingestion
        .update_run_status(summary.id, &status(RunStatus::Completed))
        .await
        .unwrap();

    for next in [RunStatus::Running, RunStatus::Failed] {
        let err = h
            .ingestion
            .update_run_status(summary.id, &status(next))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}

#[actix_rt::test]
async fn test_deleted_run_is_hidden() {
    let h = Harness::new();
    let summary = h
        .ingestion
        .ingest(run_payload("run-1", vec![suite("unit", vec![spec("a", "passed")])]))
        .await
        .unwrap();
    let suite_id = summary.suites[0].id;

    h.ingestion.delete_run(summary.id).await.unwrap();

    assert!(matches!(
        h.ingestion.get_run(summary.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.ingestion.list_specs(suite_id, None).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.ingestion.delete_run(summary.id).await,
        Err(AppError::NotFound(_))
    ));

    let listed = h
        .ingestion
        .list_runs(&ListRunsQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.pagination.total, 0);
}

#[actix_rt::test]
async fn test_list_runs_filters_and_paginates() {
    let h = Harness::new();
    for i in 0..5 {
        let mut payload = run_payload(&format!("run-{}", i), vec![]);
        if i % 2 == 1 {
            payload.branch = Some("release".to_string());
        }
        h.ingestion.ingest(payload).await.unwrap();
    }

    let page = h
        .ingestion
        .list_runs(&ListRunsQuery {
            branch: Some("main".to_string()),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 3);
    assert_eq!(page.pagination.total_pages, 2);
    assert_eq!(page.runs.len(), 2);
    assert_eq!(page.runs[0].run_id, "run-4");

    let other_project = h
        .ingestion
        .list_runs(&ListRunsQuery {
            project_id: Some("web-app".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(other_project.runs.is_empty());

    let far_page = h
        .ingestion
        .list_runs(&ListRunsQuery {
            page: Some(u32::MAX),
            limit: Some(100),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(far_page.runs.is_empty());
    assert_eq!(far_page.pagination.total, 5);
}

#[actix_rt::test]
async fn test_get_run_and_list_specs() {
    let h = Harness::new();
    let summary = h
        .ingestion
        .ingest(run_payload(
            "run-1",
            vec![
                suite("unit", vec![spec("a", "passed"), spec("b", "failed")]),
                suite("e2e", vec![spec("c", "skipped")]),
            ],
        ))
        .await
        .unwrap();

    let detail = h.ingestion.get_run(summary.id).await.unwrap();
    assert_eq!(detail.run.run_id, "run-1");
    assert_eq!(detail.suites.len(), 2);
    assert_eq!(detail.suites[0].name, "unit");

    let failed = h
        .ingestion
        .list_specs(detail.suites[0].id, Some(SpecStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failed.specs.len(), 1);
    assert_eq!(failed.specs[0].name, "b");

    let all = h
        .ingestion
        .list_specs(detail.suites[0].id, None)
        .await
        .unwrap();
    assert_eq!(all.specs.len(), 2);
}

#[actix_rt::test]
async fn test_racing_status_update_loses() {
    let h = faulty_harness(Faults {
        stale_status_reads: true,
        ..Default::default()
    });
    let summary = h
        .ingestion
        .ingest(run_payload("run-1", vec![]))
        .await
        .unwrap();

    let err = h
        .ingestion
        .update_run_status(summary.id, &status(RunStatus::Failed))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The competing transition stays; ours never overwrote it
    let run = h.ingestion.get_run(summary.id).await.unwrap().run;
    assert_eq!(run.status, RunStatus::Completed);
}

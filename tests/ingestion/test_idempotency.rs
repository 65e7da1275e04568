//! Run identifier uniqueness.

use flakewatch_lib::db::{ExecutionStore, RunQuery};
use flakewatch_lib::error::AppError;

use super::support::*;

#[actix_rt::test]
async fn test_duplicate_run_rejected_and_first_unchanged() {
    let h = Harness::new();

    let first = h
        .ingestion
        .ingest(run_payload(
            "run-dup",
            vec![suite("unit", vec![spec("a", "passed"), spec("b", "failed")])],
        ))
        .await
        .unwrap();

    let err = h
        .ingestion
        .ingest(run_payload(
            "run-dup",
            vec![suite("other", vec![spec("c", "passed")])],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateRun(ref id) if id == "run-dup"));

    let (runs, total) = h
        .store
        .query_runs(&RunQuery {
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(runs[0].id, first.id);
    assert_eq!(runs[0].counters, first.counters);

    let suites = h.store.get_suites_by_run_id(first.id).await.unwrap();
    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0].name, "unit");
    assert_eq!(h.store.spec_count(first.id).unwrap(), 2);
}

#[actix_rt::test]
async fn test_concurrent_duplicate_mapped_from_store() {
    // The lookup misses the other request's run, so the store's uniqueness
    // check is what rejects the insert
    let h = faulty_harness(Faults {
        hide_existing_runs: true,
        ..Default::default()
    });

    h.ingestion
        .ingest(run_payload("run-race", vec![]))
        .await
        .unwrap();
    let err = h
        .ingestion
        .ingest(run_payload("run-race", vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DuplicateRun(_)));
}

#[actix_rt::test]
async fn test_deleted_run_still_reserves_identifier() {
    let h = Harness::new();

    let summary = h
        .ingestion
        .ingest(run_payload("run-gone", vec![]))
        .await
        .unwrap();
    h.ingestion.delete_run(summary.id).await.unwrap();

    let err = h
        .ingestion
        .ingest(run_payload("run-gone", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateRun(_)));
}

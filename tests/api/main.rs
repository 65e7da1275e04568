//! HTTP tests for the API surface, served from an in-memory store.

use std::sync::Arc;

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use flakewatch_lib::api;
use flakewatch_lib::clock::FixedClock;
use flakewatch_lib::db::MemoryStore;
use flakewatch_lib::services::{FlakyClassifier, IngestionOrchestrator};

async fn app() -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap(),
    ));
    let classifier = Arc::new(FlakyClassifier::new(store.clone(), clock.clone(), 5));
    let ingestion = IngestionOrchestrator::new(store, classifier.clone(), clock);

    test::init_service(
        App::new()
            .app_data(web::Data::new(ingestion))
            .app_data(web::Data::from(classifier))
            .app_data(api::json_config(1024 * 1024))
            .app_data(api::query_config())
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_run_routes)
                    .configure(api::configure_flaky_test_routes),
            ),
    )
    .await
}

fn payload(run_id: &str) -> Value {
    json!({
        "project_id": "mobile-app",
        "run_id": run_id,
        "branch": "main",
        "start_time": "2026-03-01T12:00:00Z",
        "suites": [{
            "name": "sync",
            "specs": [
                {
                    "description": "uploads photo",
                    "status": "failed",
                    "start_time": "2026-03-01T12:00:00Z",
                    "end_time": "2026-03-01T12:00:01Z",
                    "message": "timeout",
                    "retry_count": 1
                },
                {
                    "description": "downloads photo",
                    "status": "passed",
                    "start_time": "2026-03-01T12:00:01Z",
                    "duration_ms": 250
                },
                {
                    "description": "bad spec",
                    "status": "exploded",
                    "start_time": "2026-03-01T12:00:02Z",
                    "end_time": "2026-03-01T12:00:03Z"
                }
            ]
        }]
    })
}

async fn ingest<S>(app: &S, run_id: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/runs")
        .set_json(payload(run_id))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    test::read_body_json(resp).await
}

#[actix_rt::test]
async fn test_health_and_ready() {
    let app = app().await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/ready").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"], "reachable");
}

#[actix_rt::test]
async fn test_ingest_then_duplicate() {
    let app = app().await;

    let summary = ingest(&app, "run-1").await;
    assert_eq!(summary["run_id"], "run-1");
    assert_eq!(summary["counters"]["total"], 2);
    assert_eq!(summary["counters"]["failed"], 1);
    assert_eq!(summary["skipped_specs"], 1);
    assert_eq!(summary["warnings"][0]["kind"], "spec_skipped");

    let req = test::TestRequest::post()
        .uri("/api/v1/runs")
        .set_json(payload("run-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "DUPLICATE_RUN");
}

#[actix_rt::test]
async fn test_malformed_body_is_validation_error() {
    let app = app().await;

    let req = test::TestRequest::post()
        .uri("/api/v1/runs")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"project_id\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let req = test::TestRequest::post()
        .uri("/api/v1/runs")
        .set_json(json!({"project_id": "", "run_id": "run-1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_out_of_range_values_are_bad_requests() {
    let app = app().await;

    let mut body = payload("run-far");
    body["start_time"] = Value::Null;
    body["end_time"] = json!("2026-03-01T12:00:00Z");
    body["duration_ms"] = json!(9_000_000_000_000_000i64);
    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/api/v1/runs").set_json(body).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/runs?page=4294967295&limit=100")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: Value = test::read_body_json(resp).await;
    assert_eq!(listed["runs"].as_array().unwrap().len(), 0);
}

#[actix_rt::test]
async fn test_run_lifecycle_over_http() {
    let app = app().await;
    let summary = ingest(&app, "run-1").await;
    let id = summary["id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri(&format!("/api/v1/runs/{}", id)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let detail: Value = test::read_body_json(resp).await;
    assert_eq!(detail["run"]["status"], "running");
    let suite_id = detail["suites"][0]["id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/suites/{}/specs?status=failed", suite_id))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let specs: Value = test::read_body_json(resp).await;
    assert_eq!(specs["specs"].as_array().unwrap().len(), 1);
    assert_eq!(specs["specs"][0]["is_flaky"], true);

    let resp = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/api/v1/runs/{}/status", id))
            .set_json(json!({"status": "failed"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let run: Value = test::read_body_json(resp).await;
    assert_eq!(run["status"], "failed");
    assert_eq!(run["duration_ms"], 3_600_000);

    let resp = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/api/v1/runs/{}/status", id))
            .set_json(json!({"status": "running"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete().uri(&format!("/api/v1/runs/{}", id)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri(&format!("/api/v1/runs/{}", id)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_list_runs_with_filters() {
    let app = app().await;
    ingest(&app, "run-1").await;
    ingest(&app, "run-2").await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/runs?project_id=mobile-app&limit=1")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["runs"][0]["run_id"], "run-2");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/v1/runs?status=aborted").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_flaky_tests_endpoints() {
    let app = app().await;
    ingest(&app, "run-1").await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/flaky-tests").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/flaky-tests?project_id=mobile-app")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["pagination"]["total"], 2);
    let top = &body["flaky_tests"][0];
    assert_eq!(top["spec_name"], "uploads photo");
    assert_eq!(top["severity"], "low");
    let flaky_id = top["id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/flaky-tests/{}/resolve", flaky_id))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resolved: Value = test::read_body_json(resp).await;
    assert_eq!(resolved["status"], "resolved");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/flaky-tests/{}", uuid::Uuid::now_v7()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

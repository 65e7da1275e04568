//! Flakewatch server - main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use flakewatch_lib::api::{self, ApiDoc};
use flakewatch_lib::clock::{Clock, SystemClock};
use flakewatch_lib::config::Config;
use flakewatch_lib::db::DbPool;
use flakewatch_lib::middleware::RequestLogger;
use flakewatch_lib::services::{FlakyClassifier, IngestionOrchestrator};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Docker HEALTHCHECK: only verifies the configuration loads
    if std::env::args().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if Config::from_env().is_ok() { 0 } else { 1 });
    }

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, FW_DATABASE_URL and FW_HOST must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Flakewatch Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for FW_DATABASE_URL");
    }

    let pool = match DbPool::new(&config).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Database connection established");

    if let Err(e) = pool.run_migrations().await {
        error!("{}", e);
        std::process::exit(1);
    }

    // Wire services
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let classifier = Arc::new(FlakyClassifier::new(
        pool.clone(),
        clock.clone(),
        config.flaky_update_attempts,
    ));
    let ingestion = web::Data::new(IngestionOrchestrator::new(
        pool.clone(),
        classifier.clone(),
        clock,
    ));
    let classifier = web::Data::from(classifier);

    let bind_address = config.bind_address();
    let max_payload_size = config.max_payload_size;
    let is_development = config.is_development();

    info!(
        "Ingestion limits: {}MB max payload, {} flaky update attempts",
        max_payload_size / 1024 / 1024,
        config.flaky_update_attempts
    );

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    // Start HTTP server
    HttpServer::new(move || {
        let cors = if is_development {
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        } else {
            // Same-origin only
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        };

        App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(RequestLogger)
            .app_data(ingestion.clone())
            .app_data(classifier.clone())
            .app_data(api::json_config(max_payload_size))
            .app_data(api::query_config())
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_run_routes)
                    .configure(api::configure_flaky_test_routes),
            )
            .service(
                SwaggerUi::new("/api/docs/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .workers(worker_count)
    .bind(&bind_address)?
    .run()
    .await
}

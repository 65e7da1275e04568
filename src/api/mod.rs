//! API endpoint modules.

pub mod health;
pub mod openapi;
pub mod runs;

pub use flaky_tests::configure_routes as configure_flaky_test_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use runs::configure_routes as configure_run_routes;

use actix_web::web;

use crate::error::AppError;

/// JSON body extractor config: size limit plus error bodies in the API's shape.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

/// Query string extractor config with the same error shape.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

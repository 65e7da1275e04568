//! Business logic services.

pub mod flaky;
pub mod hierarchy;
pub mod ingestion;
pub mod rollup;

pub use flaky::FlakyClassifier;
pub use ingestion::IngestionOrchestrator;
pub use rollup::RollupAggregator;

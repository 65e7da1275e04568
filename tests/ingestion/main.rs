//! Ingestion test suite.
//!
//! Drives the ingestion service end to end against the in-memory store,
//! with wrapper stores injecting failures and races where needed.
//!
//! Run with: cargo test --test ingestion

mod support;

mod test_idempotency;
mod test_lifecycle;

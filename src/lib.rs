//! Flakewatch server library.
//!
//! Ingests test runs into a Run → Suite → Spec hierarchy, rolls up counters
//! and tracks flaky specs per project.

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;

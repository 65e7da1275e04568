//! SeaORM entity definitions for PostgreSQL database.

pub mod run;
pub mod spec;
pub mod suite;

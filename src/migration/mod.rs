//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_runs;
mod m20260301_000002_create_suites;
mod m20260301_000003_create_specs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_runs::Migration),
            Box::new(m20260301_000002_create_suites::Migration),
            Box::new(m20260301_000003_create_specs::Migration),
            Box::new(m20260301_000004_create_flaky_tests::Migration),
        ]
    }
}

//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20260301_000001_create_election_table;
mod m20260301_000002_create_voter_table;
mod m20260301_000003_create_voting_history_table;
mod m20260301_000004_create_voter_credential_table;
mod m20260301_000005_unify_voter_schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_election_table::Migration),
            Box::new(m20260301_000002_create_voter_table::Migration),
            Box::new(m20260301_000003_create_voting_history_table::Migration),
            Box::new(m20260301_000004_create_voter_credential_table::Migration),
            Box::new(m20260301_000005_unify_voter_schema::Migration),
        ]
    }
}

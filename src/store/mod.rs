//! PostgreSQL storage
//!
//! Connection bootstrap, schema, country lookups and the loaders that
//! reconcile scraped and imported records with what is already stored.
//! Every loader call runs in its own transaction.

pub mod copy;
pub mod meetings;
pub mod organizations;
pub mod roster;
pub mod schema;

pub use copy::CopyEncoder;
pub use meetings::MeetingLoader;
pub use organizations::{BatchOutcome, OrganizationLoader};
pub use roster::{RosterCounts, RosterLoader};
pub use schema::apply_schema;

use crate::config::DatabaseConfig;
use crate::roster::RosterError;
use crate::types::{CountryId, CountryTables};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

/// Errors from the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Open a connection pool and verify it with one connection
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_url())
        .await?;

    info!("Connected to {}", config.redacted_url());
    Ok(pool)
}

/// Snapshot both country lookup tables
pub async fn load_countries(pool: &PgPool) -> Result<CountryTables, StoreError> {
    let by_code: Vec<(String, CountryId)> =
        sqlx::query_as("SELECT country_code, country_id FROM countries")
            .fetch_all(pool)
            .await?;

    let by_name: Vec<(String, CountryId)> = sqlx::query_as(
        r#"SELECT country_names.country_name, countries.country_id
           FROM countries
           INNER JOIN country_names ON countries.country_code = country_names.country_code"#,
    )
    .fetch_all(pool)
    .await?;

    info!(
        "Loaded {} country codes and {} country names",
        by_code.len(),
        by_name.len()
    );
    Ok(CountryTables::new(
        by_code.into_iter().collect::<HashMap<_, _>>(),
        by_name.into_iter().collect::<HashMap<_, _>>(),
    ))
}

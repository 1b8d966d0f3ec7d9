pub mod backup;
pub mod download;
pub mod init;
pub mod meetings;
pub mod organizations;
pub mod roster;
pub mod run;
pub mod schema;

use anyhow::{Context, Result};
use sqlx::PgPool;
use transparency::{config::Config, store};

/// Overlay `DB_*` credentials from the configured environment file
pub fn with_credentials(mut config: Config) -> Result<Config> {
    config
        .database
        .apply_env_file()
        .context("Failed to load database credentials")?;
    Ok(config)
}

/// Connect with credentials applied and make sure the schema exists
pub async fn open_store(config: &Config) -> Result<PgPool> {
    let pool = store::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    store::apply_schema(&pool)
        .await
        .context("Failed to apply schema")?;
    Ok(pool)
}

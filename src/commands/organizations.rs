use super::{open_store, with_credentials};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use transparency::{config::Config, pipeline::run_organizations, store::load_countries};

pub async fn import_organizations(
    mut config: Config,
    path: Option<PathBuf>,
    batch_size: Option<usize>,
    max_records: Option<usize>,
    quiet: bool,
) -> Result<()> {
    if let Some(batch_size) = batch_size {
        config.import.batch_size = batch_size;
    }
    if max_records.is_some() {
        config.import.max_records = max_records;
    }
    let path = path.unwrap_or_else(|| config.import.download_path.clone());

    // Check file exists
    if !path.exists() {
        anyhow::bail!("Export file not found: {}", path.display());
    }

    let config = with_credentials(config)?;
    let pool = open_store(&config).await?;
    let countries = load_countries(&pool)
        .await
        .context("Failed to load country tables")?;

    run_organizations(&pool, &config, Arc::new(countries), path, quiet).await?;
    Ok(())
}

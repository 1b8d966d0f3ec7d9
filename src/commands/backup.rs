use super::with_credentials;
use anyhow::{Context, Result};
use transparency::{backup::run_backup, config::Config};

pub async fn backup_database(config: Config) -> Result<()> {
    let config = with_credentials(config)?;
    let path = run_backup(&config.database, &config.backup)
        .await
        .context("Backup failed")?;
    println!("Backup written to {}", path.display());
    Ok(())
}

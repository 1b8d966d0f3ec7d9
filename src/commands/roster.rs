use super::{open_store, with_credentials};
use anyhow::{Context, Result};
use std::path::PathBuf;
use transparency::{config::Config, pipeline::run_roster, store::load_countries};

pub async fn load_roster(mut config: Config, dir: Option<PathBuf>) -> Result<()> {
    if let Some(dir) = dir {
        config.roster.dir = dir;
    }
    let config = with_credentials(config)?;

    let pool = open_store(&config).await?;
    let countries = load_countries(&pool)
        .await
        .context("Failed to load country tables")?;
    let counts = run_roster(&pool, &config, &countries).await?;

    println!("\nRoster Loaded");
    println!("=============");
    println!("Leaders: {}", counts.leaders);
    println!("Members: {}", counts.members);
    println!("Roles:   {}", counts.roles);
    Ok(())
}

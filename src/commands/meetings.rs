use super::{open_store, with_credentials};
use anyhow::Result;
use std::path::PathBuf;
use transparency::{config::Config, pipeline::run_meetings};

pub async fn load_meetings(
    mut config: Config,
    dir: Option<PathBuf>,
    max_pages: Option<usize>,
    delay_ms: Option<u64>,
) -> Result<()> {
    if let Some(dir) = dir {
        config.roster.dir = dir;
    }
    if let Some(max_pages) = max_pages {
        config.scraping.max_pages = max_pages;
    }
    if let Some(delay_ms) = delay_ms {
        config.scraping.page_delay_ms = delay_ms;
    }
    config.validate()?;
    let config = with_credentials(config)?;

    let pool = open_store(&config).await?;
    let summary = run_meetings(&pool, &config).await?;

    println!("\nMeetings Loaded");
    println!("===============");
    println!("Listings crawled: {}", summary.listings);
    println!("Pages fetched:    {}", summary.pages);
    println!("Meetings loaded:  {}", summary.meetings);

    if !summary.failed.is_empty() {
        println!("\nFailed listings:");
        for (host, error) in &summary.failed {
            println!("  {}: {}", host, error);
        }
        anyhow::bail!("{} listings could not be crawled", summary.failed.len());
    }
    Ok(())
}

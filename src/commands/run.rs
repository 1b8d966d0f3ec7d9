use super::with_credentials;
use anyhow::Result;
use tracing::info;
use transparency::{
    config::Config,
    pipeline::{Pipeline, Stage},
    util::human_bytes,
};

pub async fn run_pipeline(config: Config, skip: Vec<Stage>, quiet: bool) -> Result<()> {
    let needs_database = Stage::ALL
        .iter()
        .filter(|s| !skip.contains(s))
        .any(|s| s.uses_store() || *s == Stage::Backup);

    let config = if needs_database {
        with_credentials(config)?
    } else {
        info!("No database stage selected, skipping credentials");
        config
    };

    let report = Pipeline::new(config)
        .with_skip(skip)
        .with_quiet(quiet)
        .run()
        .await?;

    println!("\nRun Complete");
    println!("============");
    if let Some(path) = &report.backup {
        println!("Backup:        {}", path.display());
    }
    if let Some(counts) = &report.roster {
        println!(
            "Roster:        {} leaders, {} members, {} roles",
            counts.leaders, counts.members, counts.roles
        );
    }
    if let Some(meetings) = &report.meetings {
        println!(
            "Meetings:      {} from {} listings ({} failed)",
            meetings.meetings,
            meetings.listings,
            meetings.failed.len()
        );
        for (host, error) in &meetings.failed {
            println!("  {}: {}", host, error);
        }
    }
    if let Some(download) = &report.download {
        println!("Download:      {}", human_bytes(download.bytes));
    }
    if let Some(stats) = &report.organizations {
        println!(
            "Organizations: {} in {} batches",
            stats.records_loaded, stats.batches_loaded
        );
    }

    if let Some(meetings) = &report.meetings {
        if !meetings.failed.is_empty() {
            anyhow::bail!("{} listings could not be crawled", meetings.failed.len());
        }
    }
    Ok(())
}

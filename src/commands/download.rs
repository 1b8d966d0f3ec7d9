use anyhow::Result;
use std::path::PathBuf;
use transparency::{config::Config, pipeline::run_download, util::human_bytes};

pub async fn download_export(mut config: Config, output: Option<PathBuf>, quiet: bool) -> Result<()> {
    if let Some(output) = output {
        config.import.download_path = output;
    }

    let stats = run_download(&config, quiet).await?;
    if !quiet {
        println!(
            "Downloaded {} to {} in {:.1}s",
            human_bytes(stats.bytes),
            config.import.download_path.display(),
            stats.elapsed.as_secs_f64()
        );
    }
    Ok(())
}

use anyhow::Result;
use std::path::PathBuf;
use transparency::config::Config;

pub async fn init_config(path: PathBuf) -> Result<()> {
    let config = Config::default();
    let config_path = path.join("transparency.toml");

    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    // Credentials (DB_USER, DB_PASS, DB_HOST, DB_PORT) come from the env file
    let toml_content = format!(
        r#"# Transparency Configuration

[database]
name = "{}"
user = "{}"
host = "{}"
port = {}
ssl_mode = "{}"
max_connections = {}
env_file = ".env"

[scraping]
base_url = "{}"
listing_path = "{}"
page_delay_ms = {}
max_pages = {}
match_threshold = {}
user_agent = "{}"
# request_timeout_secs = 60

[import]
source_url = "{}"
download_path = "{}"
batch_size = {}

[roster]
dir = "{}"

[backup]
dir = "{}"
command = "{}"
compression = {}

[logging]
format = "text"
level = "info"
"#,
        config.database.name,
        config.database.user,
        config.database.host,
        config.database.port,
        config.database.ssl_mode,
        config.database.max_connections,
        config.scraping.base_url,
        config.scraping.listing_path,
        config.scraping.page_delay_ms,
        config.scraping.max_pages,
        config.scraping.match_threshold,
        config.scraping.user_agent,
        config.import.source_url,
        config.import.download_path.display(),
        config.import.batch_size,
        config.roster.dir.display(),
        config.backup.dir.display(),
        config.backup.command,
        config.backup.compression,
    );

    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    // Create roster and backup directories
    for dir in [&config.roster.dir, &config.backup.dir] {
        let dir = path.join(dir);
        std::fs::create_dir_all(&dir)?;
        println!("Created directory: {}", dir.display());
    }

    Ok(())
}

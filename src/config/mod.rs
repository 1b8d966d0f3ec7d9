//! Configuration for the transparency loader

mod database;
mod logging;
mod scraping;

pub use database::{
    read_env_file, BackupConfig, CredentialsError, DatabaseConfig, CREDENTIAL_KEYS,
    DATABASE_NAME_KEY,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use scraping::{ImportConfig, RosterConfig, ScrapingConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default user agent for all HTTP requests (listing pages, export download)
pub const DEFAULT_USER_AGENT: &str = concat!("transparency/", env!("CARGO_PKG_VERSION"));

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database connection
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Meeting listing scraping
    #[serde(default)]
    pub scraping: ScrapingConfig,
    /// Organization export import
    #[serde(default)]
    pub import: ImportConfig,
    /// Roster files
    #[serde(default)]
    pub roster: RosterConfig,
    /// Database backups
    #[serde(default)]
    pub backup: BackupConfig,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// URL of the first listing page for a host ID
    pub fn listing_url(&self, host_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.scraping.base_url)?.join(&self.scraping.listing_path)?;
        url.query_pairs_mut().append_pair("host", host_id);
        Ok(url)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Database
        if self.database.host.is_empty() {
            errors.push("database host must not be empty".to_string());
        }
        if self.database.port == 0 {
            errors.push("database port must be positive".to_string());
        }
        if self.database.name.is_empty() {
            errors.push("database name must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            errors.push("database max_connections must be positive".to_string());
        }

        // Scraping
        if Url::parse(&self.scraping.base_url).is_err() {
            errors.push(format!(
                "scraping base_url is not a valid URL: {}",
                self.scraping.base_url
            ));
        }
        if !self.scraping.listing_path.starts_with('/') {
            errors.push("scraping listing_path must start with '/'".to_string());
        }
        if self.scraping.max_pages == 0 {
            errors.push("scraping max_pages must be positive".to_string());
        }
        if self.scraping.match_threshold <= 0.0 || self.scraping.match_threshold > 1.0 {
            errors.push("match_threshold must be between 0.0 (exclusive) and 1.0".to_string());
        }
        if self.scraping.request_timeout_secs == Some(0) {
            errors.push("request_timeout_secs must be positive when set".to_string());
        }

        // Import
        if self.import.batch_size == 0 {
            errors.push("import batch_size must be positive".to_string());
        }
        if Url::parse(&self.import.source_url).is_err() {
            errors.push(format!(
                "import source_url is not a valid URL: {}",
                self.import.source_url
            ));
        }
        if self.import.download_path.as_os_str().is_empty() {
            errors.push("import download_path must not be empty".to_string());
        }

        // Roster / backup
        if self.roster.dir.as_os_str().is_empty() {
            errors.push("roster dir must not be empty".to_string());
        }
        if self.backup.compression > 9 {
            errors.push("backup compression must be between 0 and 9".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

//! Meeting listing scraping and organization export import configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::DEFAULT_USER_AGENT;

/// Meeting listing scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Scheme and host of the listing site
    pub base_url: String,
    /// Listing endpoint path; the host ID is passed as `?host=`
    pub listing_path: String,
    /// Delay between successive page fetches (milliseconds)
    pub page_delay_ms: u64,
    /// Hard stop for a single listing crawl
    pub max_pages: usize,
    /// Minimum Dice score for a participant name to resolve to a roster member
    pub match_threshold: f64,
    /// User agent string
    pub user_agent: String,
    /// Request timeout (seconds). Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://ec.europa.eu".to_string(),
            listing_path: "/transparencyinitiative/meetings/meeting.do".to_string(),
            page_delay_ms: 250,
            max_pages: 500,
            match_threshold: 0.75,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Organization export download and import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Where the register's XML export is downloaded from
    pub source_url: String,
    /// Local path of the downloaded export (`.xml` or `.xml.bz2`)
    pub download_path: PathBuf,
    /// Records per load transaction
    pub batch_size: usize,
    /// Stop after this many records (None = whole export)
    #[serde(default)]
    pub max_records: Option<usize>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            source_url: "http://ec.europa.eu/transparencyregister/public/consultation/statistics.do?action=getLobbyistsXml&fileType=NEW".to_string(),
            download_path: PathBuf::from("database/organizations.xml"),
            batch_size: 1000,
            max_records: None,
        }
    }
}

/// Roster file location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Directory holding one JSON file per department
    pub dir: PathBuf,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("database/departments"),
        }
    }
}

//! Transparency: lobbying-transparency ingestion loader
//!
//! Loads public lobbying-transparency records into PostgreSQL:
//! - Department rosters (leaders, members, roles) from JSON files
//! - Meetings scraped from paginated HTML listings, with participant names
//!   fuzzy-matched onto the roster
//! - Registered organizations streamed from the register's bulk XML export
//!   and merged so that only newer records replace stored ones

pub mod backup;
pub mod config;
pub mod download;
pub mod import;
pub mod pipeline;
pub mod roster;
pub mod scraping;
pub mod store;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;

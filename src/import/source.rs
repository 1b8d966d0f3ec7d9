//! Core types and traits for the organization import

use crate::types::Organization;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Destination for decoded organization batches
#[async_trait]
pub trait OrganizationSink: Send {
    /// Load one batch. A batch is either loaded completely or not at all.
    async fn load_batch(&mut self, batch: &[Organization]) -> Result<(), ImportError>;
}

/// Import statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    /// Organizations decoded from the export
    pub records_decoded: usize,
    /// Organizations handed to the sink
    pub records_loaded: usize,
    /// Batches committed
    pub batches_loaded: usize,
    /// Organizations whose country name had no match
    pub unmatched_countries: usize,
    /// Processing time in seconds
    pub elapsed_seconds: f64,
    /// Records per second
    pub records_per_second: f64,
}

impl ImportStats {
    /// Calculate records per second
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.records_per_second = self.records_decoded as f64 / self.elapsed_seconds;
        }
    }
}

/// Errors that can occur during import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("invalid organization record: {0}")]
    InvalidRecord(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<quick_xml::Error> for ImportError {
    fn from(e: quick_xml::Error) -> Self {
        ImportError::XmlParse(e.to_string())
    }
}

impl From<crate::store::StoreError> for ImportError {
    fn from(e: crate::store::StoreError) -> Self {
        ImportError::Store(e.to_string())
    }
}

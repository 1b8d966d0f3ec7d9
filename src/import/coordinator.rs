//! Import coordinator that batches decoded organizations into the store

use super::organizations::OrganizationSource;
use super::progress::ImportProgress;
use super::source::{ImportError, ImportStats, OrganizationSink};
use crate::types::Organization;
use std::io::BufRead;
use tracing::{debug, info};

/// Default records per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Drives a decoder into a sink in fixed-size batches.
///
/// Batches are loaded in document order. The first error aborts the import;
/// batches committed before it stay committed.
pub struct ImportCoordinator {
    batch_size: usize,
    max_records: Option<usize>,
    quiet: bool,
}

impl ImportCoordinator {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run the import from `source` into `sink`
    pub async fn import<R, S>(
        &self,
        mut source: OrganizationSource<R>,
        sink: &mut S,
    ) -> Result<ImportStats, ImportError>
    where
        R: BufRead,
        S: OrganizationSink + ?Sized,
    {
        let source_name = source.source_name().to_string();
        info!("Starting import from: {}", source_name);

        let progress = ImportProgress::new(&source_name, self.quiet);
        let result = self.run(&mut source, sink, &progress).await;
        progress.set_unmatched_countries(source.unmatched_countries());

        if let Err(e) = result {
            progress.abandon(&e.to_string());
            return Err(e);
        }

        progress.finish();
        if !self.quiet {
            progress.print_summary();
        }

        let stats = progress.get_stats();
        info!(
            "Imported {} organizations from {} in {} batches ({} without country match)",
            stats.records_loaded, source_name, stats.batches_loaded, stats.unmatched_countries
        );
        Ok(stats)
    }

    async fn run<R, S>(
        &self,
        source: &mut OrganizationSource<R>,
        sink: &mut S,
        progress: &ImportProgress,
    ) -> Result<(), ImportError>
    where
        R: BufRead,
        S: OrganizationSink + ?Sized,
    {
        let mut batch: Vec<Organization> = Vec::with_capacity(self.batch_size);
        let mut counter = 0usize;

        for record in source.by_ref() {
            if let Some(max) = self.max_records {
                if counter >= max {
                    info!("Reached max records limit: {}", max);
                    break;
                }
            }

            let org = record?;
            progress.record_decoded(&org.identification_code);
            batch.push(org);
            counter += 1;

            if counter % self.batch_size == 0 {
                self.flush(&mut batch, sink, progress).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, sink, progress).await?;
        }

        Ok(())
    }

    async fn flush<S>(
        &self,
        batch: &mut Vec<Organization>,
        sink: &mut S,
        progress: &ImportProgress,
    ) -> Result<(), ImportError>
    where
        S: OrganizationSink + ?Sized,
    {
        sink.load_batch(batch.as_slice()).await?;
        debug!("Loaded batch of {} organizations", batch.len());
        progress.batch_loaded(batch.len());
        batch.clear();
        Ok(())
    }
}

/// Builder for ImportCoordinator with sensible defaults
pub struct ImportCoordinatorBuilder {
    batch_size: usize,
    max_records: Option<usize>,
    quiet: bool,
}

impl Default for ImportCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportCoordinatorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_records: None,
            quiet: false,
        }
    }

    /// Take batch size and record limit from configuration
    pub fn with_config(mut self, config: &crate::config::ImportConfig) -> Self {
        self.batch_size = config.batch_size;
        self.max_records = config.max_records;
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set maximum records to import
    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    /// Set quiet mode
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build the coordinator
    pub fn build(self) -> Result<ImportCoordinator, ImportError> {
        if self.batch_size == 0 {
            return Err(ImportError::Config("batch size must be positive".into()));
        }
        Ok(ImportCoordinator {
            batch_size: self.batch_size,
            max_records: self.max_records,
            quiet: self.quiet,
        })
    }
}

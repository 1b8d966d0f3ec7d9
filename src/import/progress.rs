//! Progress tracking for organization imports

use super::source::ImportStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Progress tracker for an import run
pub struct ImportProgress {
    /// Spinner (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    /// Start time
    start_time: Instant,
    /// Records decoded
    records_decoded: AtomicUsize,
    /// Records handed to the sink
    records_loaded: AtomicUsize,
    /// Batches committed
    batches_loaded: AtomicUsize,
    /// Records without a country match
    unmatched_countries: AtomicUsize,
}

impl ImportProgress {
    /// Create a new progress tracker
    pub fn new(source_name: &str, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {prefix} [{elapsed_precise}] {pos} organizations {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_prefix(source_name.to_string());
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            records_decoded: AtomicUsize::new(0),
            records_loaded: AtomicUsize::new(0),
            batches_loaded: AtomicUsize::new(0),
            unmatched_countries: AtomicUsize::new(0),
        }
    }

    /// Update progress after decoding a record
    pub fn record_decoded(&self, code: &str) {
        let decoded = self.records_decoded.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(decoded as u64);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                decoded as f64 / elapsed
            } else {
                0.0
            };
            pb.set_message(format!("{:.1} records/s | {}", rate, code));
        }
    }

    /// Record a committed batch
    pub fn batch_loaded(&self, size: usize) {
        self.records_loaded.fetch_add(size, Ordering::Relaxed);
        self.batches_loaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the unmatched country count reported by the source
    pub fn set_unmatched_countries(&self, count: usize) {
        self.unmatched_countries.store(count, Ordering::Relaxed);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> ImportStats {
        let mut stats = ImportStats {
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            records_loaded: self.records_loaded.load(Ordering::Relaxed),
            batches_loaded: self.batches_loaded.load(Ordering::Relaxed),
            unmatched_countries: self.unmatched_countries.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
            records_per_second: 0.0,
        };
        stats.update_rate();
        stats
    }

    /// Abandon the spinner after an error
    pub fn abandon(&self, reason: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message(format!("Failed: {}", reason));
        }
    }

    /// Finish the spinner
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} loaded in {} batches, {:.1} records/s",
                stats.records_loaded, stats.batches_loaded, stats.records_per_second
            ));
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        let stats = self.get_stats();

        println!("\nImport Summary");
        println!("==============");
        println!("Records decoded:     {}", stats.records_decoded);
        println!("Records loaded:      {}", stats.records_loaded);
        println!("Batches committed:   {}", stats.batches_loaded);
        println!("Unmatched countries: {}", stats.unmatched_countries);
        println!("Elapsed time:        {:.1}s", stats.elapsed_seconds);
        println!("Processing rate:     {:.1} records/s", stats.records_per_second);
    }
}

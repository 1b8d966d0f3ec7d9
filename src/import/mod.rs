//! Bulk import of the organization export
//!
//! The register publishes every organization in one large XML document. It
//! is decoded as a stream and loaded in fixed-size batches so memory stays
//! bounded regardless of export size.
//!
//! # Example Usage
//!
//! ```no_run
//! use transparency::import::{ImportCoordinatorBuilder, OrganizationSource};
//! use transparency::store::{connect, load_countries, OrganizationLoader};
//! use transparency::config::DatabaseConfig;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pool = connect(&DatabaseConfig::default()).await?;
//! let countries = Arc::new(load_countries(&pool).await?);
//!
//! let source = OrganizationSource::open("database/organizations.xml")?
//!     .with_countries(countries);
//! let mut loader = OrganizationLoader::new(pool);
//!
//! let coordinator = ImportCoordinatorBuilder::new()
//!     .with_batch_size(1000)
//!     .build()?;
//! let stats = coordinator.import(source, &mut loader).await?;
//! println!("Loaded {} organizations", stats.records_loaded);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   Organization   ┌───────────────────┐   &[Organization]   ┌────────────────────┐
//! │  OrganizationSource  │ ───────────────▶ │ ImportCoordinator │ ──────────────────▶ │ OrganizationSink   │
//! │ quick-xml + bz2      │                  │ batching, progress│                     │ (OrganizationLoader│
//! │ country enrichment   │                  │                   │                     │  in the store)     │
//! └──────────────────────┘                  └───────────────────┘                     └────────────────────┘
//! ```

pub mod coordinator;
pub mod organizations;
pub mod progress;
pub mod source;

// Re-export main types
pub use coordinator::{ImportCoordinator, ImportCoordinatorBuilder, DEFAULT_BATCH_SIZE};
pub use organizations::{parse_timestamp, OrganizationSource};
pub use progress::ImportProgress;
pub use source::{ImportError, ImportStats, OrganizationSink};

//! Meeting listing scraping
//!
//! Meetings are published per leader on two paginated listings: one for
//! meetings the leader attended and one for meetings attended by the
//! leader's cabinet members. Both share the same table markup.
//!
//! Key components:
//! - `FetchEngine`: HTTP fetching with status classification
//! - `Crawler`: follows "Next" links page by page
//! - `extractor`: per-row, per-column field extraction
//! - `EntityResolver`: fuzzy matching of participant names onto the roster

pub mod crawler;
pub mod extractor;
pub mod fetcher;
pub mod resolver;

pub use crawler::{CrawlConfig, CrawlError, CrawlReport, CrawlStop, Crawler};
pub use extractor::ListingKind;
pub use fetcher::{FetchConfig, FetchEngine, FetchError, PageFetcher};
pub use resolver::{EntityResolver, DEFAULT_MATCH_THRESHOLD};

use crate::types::Meeting;
use url::Url;

/// Crawl a by-leader listing; every meeting is attributed to `leader_id`.
pub async fn scrape_leader_listing<F: PageFetcher>(
    crawler: &Crawler<F>,
    url: &Url,
    leader_id: &str,
) -> Result<CrawlReport<Meeting>, CrawlError> {
    crawler
        .crawl(url, |row| extractor::leader_meeting(row, leader_id))
        .await
}

/// Crawl a by-member listing, resolving participants with `resolver`.
pub async fn scrape_member_listing<F: PageFetcher>(
    crawler: &Crawler<F>,
    url: &Url,
    resolver: &EntityResolver,
) -> Result<CrawlReport<Meeting>, CrawlError> {
    crawler
        .crawl(url, |row| extractor::member_meeting(row, resolver))
        .await
}

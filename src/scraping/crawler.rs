//! Paginated listing crawler
//!
//! Fetches a listing page, runs a row extractor over every row of the
//! meetings table, then follows the "Next" pagination link until there is
//! none. Pages are fetched strictly one after another with a fixed delay
//! between them.

use super::fetcher::{FetchError, PageFetcher};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Rows of the listing table
pub const ROW_SELECTOR: &str = "#listMeetingsTable tbody tr";
/// Anchors in the pagination bar
pub const PAGE_LINK_SELECTOR: &str = ".pagelinks a";
/// Image marking the "Next" anchor
pub const NEXT_IMAGE_SELECTOR: &str = "img[alt='Next']";

/// Errors that abort a crawl
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid next link {href:?} on {page}: {source}")]
    InvalidLink {
        page: String,
        href: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid selector {0:?}")]
    Selector(String),
}

impl CrawlError {
    /// True if the upstream asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            CrawlError::Fetch {
                source: FetchError::RateLimited,
                ..
            }
        )
    }
}

/// Crawl pacing and limits
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Pause before every fetch after the first
    pub page_delay: Duration,
    /// Pages fetched before the crawl is cut short
    pub max_pages: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(250),
            max_pages: 500,
        }
    }
}

impl From<&crate::config::ScrapingConfig> for CrawlConfig {
    fn from(config: &crate::config::ScrapingConfig) -> Self {
        Self {
            page_delay: Duration::from_millis(config.page_delay_ms),
            max_pages: config.max_pages,
        }
    }
}

/// Why a crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStop {
    /// The last page had no "Next" link
    LastPage,
    /// A "Next" link pointed at a page already fetched
    Cycle,
    /// `max_pages` was reached
    PageLimit,
}

/// Records collected by one crawl
#[derive(Debug, Clone)]
pub struct CrawlReport<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub stop: CrawlStop,
}

/// Sequential crawler over a paginated listing
pub struct Crawler<F> {
    fetcher: F,
    config: CrawlConfig,
    rows: Selector,
    page_links: Selector,
    next_image: Selector,
}

fn selector(css: &str) -> Result<Selector, CrawlError> {
    Selector::parse(css).map_err(|_| CrawlError::Selector(css.to_string()))
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(fetcher: F, config: CrawlConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            fetcher,
            config,
            rows: selector(ROW_SELECTOR)?,
            page_links: selector(PAGE_LINK_SELECTOR)?,
            next_image: selector(NEXT_IMAGE_SELECTOR)?,
        })
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Crawl from `start`, collecting whatever `extract` returns for each row.
    ///
    /// Any fetch failure aborts the crawl; nothing is retried.
    pub async fn crawl<T, E>(&self, start: &Url, extract: E) -> Result<CrawlReport<T>, CrawlError>
    where
        E: Fn(ElementRef<'_>) -> Option<T>,
    {
        let mut visited: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        let mut pages = 0usize;
        let mut current = start.clone();
        current.set_fragment(None);

        let stop = loop {
            if pages >= self.config.max_pages {
                warn!(
                    "Stopping crawl of {} after {} pages (page limit)",
                    start, pages
                );
                break CrawlStop::PageLimit;
            }
            if !visited.insert(current.as_str().to_string()) {
                warn!("Next link cycles back to {}, stopping crawl", current);
                break CrawlStop::Cycle;
            }

            if pages > 0 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }

            let body = self
                .fetcher
                .fetch_page(&current)
                .await
                .map_err(|source| CrawlError::Fetch {
                    url: current.to_string(),
                    source,
                })?;
            pages += 1;

            let (rows, next) = self.parse_page(&body, &current, &extract)?;
            debug!("Page {} of {}: {} rows", pages, start, rows.len());
            items.extend(rows);

            match next {
                Some(url) => current = url,
                None => break CrawlStop::LastPage,
            }
        };

        info!(
            "Crawled {}: {} pages, {} records",
            start,
            pages,
            items.len()
        );
        Ok(CrawlReport { items, pages, stop })
    }

    /// Extract rows and the resolved "Next" URL from one page
    fn parse_page<T, E>(
        &self,
        body: &str,
        page_url: &Url,
        extract: &E,
    ) -> Result<(Vec<T>, Option<Url>), CrawlError>
    where
        E: Fn(ElementRef<'_>) -> Option<T>,
    {
        let document = Html::parse_document(body);

        let rows = document.select(&self.rows).filter_map(extract).collect();

        let href = document
            .select(&self.page_links)
            .find(|a| a.select(&self.next_image).next().is_some())
            .and_then(|a| a.value().attr("href"));

        let next = match href {
            Some(href) => {
                let mut url = page_url.join(href).map_err(|source| CrawlError::InvalidLink {
                    page: page_url.to_string(),
                    href: href.to_string(),
                    source,
                })?;
                // Fragments never name a different page
                url.set_fragment(None);
                Some(url)
            }
            None => None,
        };

        Ok((rows, next))
    }
}

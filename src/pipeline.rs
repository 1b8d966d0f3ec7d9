//! Stage orchestration
//!
//! A full run executes the stages in a fixed order:
//!
//! 1. `Backup`: dump the database before anything is written
//! 2. `Roster`: upsert departments, leaders, members and roles
//! 3. `Meetings`: crawl every leader's listings and load the meetings
//! 4. `Download`: fetch the register's organization export
//! 5. `Organizations`: stream the export into the store in batches
//!
//! Stages run one after the other. The schema is applied and the country
//! tables are read once, before the first stage that touches the store.

use crate::backup::run_backup;
use crate::config::Config;
use crate::download::{download_file, DownloadStats};
use crate::import::{ImportCoordinatorBuilder, ImportStats, OrganizationSource};
use crate::roster::{load_departments, validate_department};
use crate::scraping::{
    scrape_leader_listing, scrape_member_listing, CrawlConfig, CrawlError, CrawlReport,
    CrawlStop, Crawler, EntityResolver, FetchConfig, FetchEngine, ListingKind, PageFetcher,
};
use crate::store::{
    apply_schema, connect, load_countries, MeetingLoader, OrganizationLoader, RosterCounts,
    RosterLoader,
};
use crate::types::{CountryTables, Department, Meeting};
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One step of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Backup,
    Roster,
    Meetings,
    Download,
    Organizations,
}

impl Stage {
    /// Every stage in execution order
    pub const ALL: [Stage; 5] = [
        Stage::Backup,
        Stage::Roster,
        Stage::Meetings,
        Stage::Download,
        Stage::Organizations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Backup => "backup",
            Stage::Roster => "roster",
            Stage::Meetings => "meetings",
            Stage::Download => "download",
            Stage::Organizations => "organizations",
        }
    }

    /// Whether the stage reads or writes the store
    pub fn uses_store(&self) -> bool {
        matches!(self, Stage::Roster | Stage::Meetings | Stage::Organizations)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage: {}", s))
    }
}

// ============================================================================
// Meetings
// ============================================================================

/// Result of crawling one listing
#[derive(Debug)]
pub struct ListingScrape {
    pub leader: String,
    pub host: String,
    pub kind: ListingKind,
    pub result: Result<CrawlReport<Meeting>, CrawlError>,
}

/// Crawl both listings of every leader in `dep`.
///
/// A failed listing is recorded and the remaining listings are still crawled.
/// Empty host IDs mean the leader has no such listing. By-member listings
/// are skipped when the department has no members to resolve names onto.
pub async fn scrape_department<F: PageFetcher>(
    crawler: &Crawler<F>,
    config: &Config,
    dep: &Department,
) -> Result<Vec<ListingScrape>> {
    validate_department(dep)?;
    let resolver = EntityResolver::new(&dep.members, config.scraping.match_threshold);
    let mut listings = Vec::new();

    for leader in &dep.leaders {
        let leader_id = leader.id.as_deref().map(str::trim).unwrap_or_default();

        for (kind, host) in [
            (ListingKind::ByLeader, leader.leader_host_id.trim()),
            (ListingKind::ByMember, leader.member_host_id.trim()),
        ] {
            if host.is_empty() {
                continue;
            }
            if kind == ListingKind::ByMember && dep.members.is_empty() {
                debug!("Skipping member listing {}: department has no members", host);
                continue;
            }
            let url = config
                .listing_url(host)
                .with_context(|| format!("Invalid listing URL for host {}", host))?;

            info!(
                "Crawling {} listing of {} ({})",
                kind.as_str(),
                leader.name,
                host
            );
            let result = match kind {
                ListingKind::ByLeader => scrape_leader_listing(crawler, &url, leader_id).await,
                ListingKind::ByMember => scrape_member_listing(crawler, &url, &resolver).await,
            };

            match &result {
                Ok(report) if report.stop != CrawlStop::LastPage => warn!(
                    "Listing {} ended early ({:?}) after {} pages",
                    host, report.stop, report.pages
                ),
                Ok(_) => {}
                Err(e) if e.is_rate_limited() => {
                    error!("Listing {}: requests are rate limited", host)
                }
                Err(e) => error!("Listing {}: {}", host, e),
            }

            listings.push(ListingScrape {
                leader: leader.name.clone(),
                host: host.to_string(),
                kind,
                result,
            });
        }
    }

    Ok(listings)
}

/// Meeting stage totals
#[derive(Debug, Clone, Default)]
pub struct MeetingSummary {
    pub listings: usize,
    pub pages: usize,
    pub meetings: usize,
    /// `(host, error)` for every listing that could not be crawled
    pub failed: Vec<(String, String)>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// What a run did, per stage
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub backup: Option<PathBuf>,
    pub roster: Option<RosterCounts>,
    pub meetings: Option<MeetingSummary>,
    pub download: Option<DownloadStats>,
    pub organizations: Option<ImportStats>,
}

/// Runs the stages of a full load
pub struct Pipeline {
    config: Config,
    skip: HashSet<Stage>,
    quiet: bool,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            skip: HashSet::new(),
            quiet: false,
        }
    }

    /// Stages to leave out of the run
    pub fn with_skip(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.skip.extend(stages);
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Stages that will run, in order
    pub fn stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| !self.skip.contains(s))
            .collect()
    }

    /// Connect, apply the schema and snapshot the country tables on first use
    async fn store(
        &self,
        opened: &mut Option<(PgPool, Arc<CountryTables>)>,
    ) -> Result<(PgPool, Arc<CountryTables>)> {
        if let Some(store) = opened {
            return Ok(store.clone());
        }

        let pool = connect(&self.config.database)
            .await
            .context("Failed to connect to database")?;
        apply_schema(&pool).await.context("Failed to apply schema")?;
        let countries = load_countries(&pool)
            .await
            .context("Failed to load country tables")?;

        let store = (pool, Arc::new(countries));
        *opened = Some(store.clone());
        Ok(store)
    }

    /// Run every stage not skipped. The first failing stage ends the run.
    pub async fn run(&self) -> Result<PipelineReport> {
        let stages = self.stages();
        let mut report = PipelineReport::default();
        info!(
            "Running stages: {}",
            stages
                .iter()
                .map(Stage::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut store = None;

        for stage in stages {
            info!("Stage {} started", stage);

            match stage {
                Stage::Backup => {
                    let path = run_backup(&self.config.database, &self.config.backup)
                        .await
                        .context("Backup failed")?;
                    report.backup = Some(path);
                }
                Stage::Roster => {
                    let (pool, countries) = self.store(&mut store).await?;
                    let counts = run_roster(&pool, &self.config, &countries).await?;
                    report.roster = Some(counts);
                }
                Stage::Meetings => {
                    let (pool, _) = self.store(&mut store).await?;
                    let summary = run_meetings(&pool, &self.config).await?;
                    report.meetings = Some(summary);
                }
                Stage::Download => {
                    let stats = run_download(&self.config, self.quiet).await?;
                    report.download = Some(stats);
                }
                Stage::Organizations => {
                    let (pool, countries) = self.store(&mut store).await?;
                    let stats = run_organizations(
                        &pool,
                        &self.config,
                        countries,
                        self.config.import.download_path.clone(),
                        self.quiet,
                    )
                    .await?;
                    report.organizations = Some(stats);
                }
            }

            info!("Stage {} finished", stage);
        }

        Ok(report)
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Upsert every roster department; returns the summed row counts
pub async fn run_roster(
    pool: &PgPool,
    config: &Config,
    countries: &CountryTables,
) -> Result<RosterCounts> {
    let departments = load_departments(&config.roster.dir)
        .with_context(|| format!("Failed to read roster from {}", config.roster.dir.display()))?;
    let loader = RosterLoader::new(pool.clone());
    let mut total = RosterCounts::default();

    for dep in &departments {
        let counts = loader
            .upsert_department(dep, countries)
            .await
            .with_context(|| format!("Failed to load department {}", dep.abbreviation))?;
        total.leaders += counts.leaders;
        total.members += counts.members;
        total.roles += counts.roles;
    }

    info!(
        "Roster: {} departments, {} leaders, {} members, {} roles",
        departments.len(),
        total.leaders,
        total.members,
        total.roles
    );
    Ok(total)
}

/// Crawl every leader listing and load the meetings.
///
/// Crawl failures are collected in the summary; store failures end the stage.
pub async fn run_meetings(pool: &PgPool, config: &Config) -> Result<MeetingSummary> {
    let departments = load_departments(&config.roster.dir)
        .with_context(|| format!("Failed to read roster from {}", config.roster.dir.display()))?;

    let engine = FetchEngine::new(FetchConfig::from(&config.scraping))
        .context("Failed to build HTTP client")?;
    let crawler = Crawler::new(engine, CrawlConfig::from(&config.scraping))?;
    let loader = MeetingLoader::new(pool.clone());
    let mut summary = MeetingSummary::default();

    for dep in &departments {
        for listing in scrape_department(&crawler, config, dep).await? {
            summary.listings += 1;
            match listing.result {
                Ok(report) => {
                    loader
                        .load(&listing.host, &report.items)
                        .await
                        .with_context(|| {
                            format!(
                                "Failed to load {} meetings of {}",
                                listing.kind.as_str(),
                                listing.leader
                            )
                        })?;
                    summary.pages += report.pages;
                    summary.meetings += report.items.len();
                }
                Err(e) => summary.failed.push((listing.host, e.to_string())),
            }
        }
    }

    info!(
        "Meetings: {} loaded from {} pages across {} listings ({} failed)",
        summary.meetings,
        summary.pages,
        summary.listings,
        summary.failed.len()
    );
    Ok(summary)
}

/// Download the organization export to `import.download_path`
pub async fn run_download(config: &Config, quiet: bool) -> Result<DownloadStats> {
    let engine = FetchEngine::new(FetchConfig::from(&config.scraping))
        .context("Failed to build HTTP client")?;
    download_file(
        engine.client(),
        &config.import.source_url,
        &config.import.download_path,
        quiet,
    )
    .await
    .with_context(|| format!("Failed to download {}", config.import.source_url))
}

/// Stream an export file into the store
pub async fn run_organizations(
    pool: &PgPool,
    config: &Config,
    countries: Arc<CountryTables>,
    path: PathBuf,
    quiet: bool,
) -> Result<ImportStats> {
    if !path.exists() {
        anyhow::bail!("Export file not found: {}", path.display());
    }

    let source = OrganizationSource::open(&path)
        .with_context(|| format!("Failed to open export {}", path.display()))?
        .with_countries(countries);

    let coordinator = ImportCoordinatorBuilder::new()
        .with_config(&config.import)
        .with_quiet(quiet)
        .build()?;

    let mut loader = OrganizationLoader::new(pool.clone());
    let stats = coordinator
        .import(source, &mut loader)
        .await
        .context("Organization import failed")?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::crawler::tests::{listing_page, MemoryFetcher};
    use crate::types::{Leader, Member, Participants};
    use std::time::Duration;

    fn leader(id: &str, leader_host: &str, member_host: &str) -> Leader {
        Leader {
            id: Some(id.to_string()),
            name: format!("Leader {}", id),
            role: "Commissioner".to_string(),
            country: "FR".to_string(),
            leader_host_id: leader_host.to_string(),
            member_host_id: member_host.to_string(),
        }
    }

    fn department(leaders: Vec<Leader>) -> Department {
        Department {
            name: "Trade".to_string(),
            abbreviation: "TRADE".to_string(),
            description: String::new(),
            leaders,
            members: vec![Member {
                id: Some("M1".to_string()),
                name: "Jane Doe".to_string(),
                roles: vec![],
            }],
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.scraping.base_url = "http://listing.test".to_string();
        config.scraping.listing_path = "/meeting.do".to_string();
        config
    }

    fn crawler(fetcher: MemoryFetcher) -> Crawler<MemoryFetcher> {
        Crawler::new(
            fetcher,
            CrawlConfig {
                page_delay: Duration::ZERO,
                max_pages: 10,
            },
        )
        .unwrap()
    }

    // ========================================================================
    // Stage
    // ========================================================================

    #[test]
    fn test_stage_order_and_parsing() {
        assert_eq!(
            Stage::ALL.map(|s| s.as_str()),
            ["backup", "roster", "meetings", "download", "organizations"]
        );
        assert_eq!("Meetings".parse::<Stage>(), Ok(Stage::Meetings));
        assert!("index".parse::<Stage>().is_err());
        assert!(!Stage::Download.uses_store());
        assert!(!Stage::Backup.uses_store());
    }

    #[test]
    fn test_skip_keeps_order() {
        let pipeline = Pipeline::new(Config::default())
            .with_skip([Stage::Download, Stage::Backup]);
        assert_eq!(
            pipeline.stages(),
            vec![Stage::Roster, Stage::Meetings, Stage::Organizations]
        );
    }

    #[tokio::test]
    async fn test_download_only_run_needs_no_database() {
        let mut config = Config::default();
        config.import.source_url = "http://127.0.0.1:9/export.xml".to_string();
        let pipeline = Pipeline::new(config)
            .with_quiet(true)
            .with_skip([Stage::Backup, Stage::Roster, Stage::Meetings, Stage::Organizations]);

        // Port 9 refuses the connection, so the stage fails on HTTP, not on the store
        let err = pipeline.run().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to download"));
    }

    // ========================================================================
    // scrape_department
    // ========================================================================

    #[tokio::test]
    async fn test_scrape_department_crawls_both_listings() {
        let fetcher = MemoryFetcher::default()
            .page(
                "http://listing.test/meeting.do?host=lh1",
                listing_page(&["Trade talks"], None),
            )
            .page(
                "http://listing.test/meeting.do?host=mh1",
                listing_page(&["Energy"], None),
            );
        let crawler = crawler(fetcher);
        let dep = department(vec![leader("L1", "lh1", "mh1"), leader("L2", "", "")]);

        let listings = scrape_department(&crawler, &test_config(), &dep)
            .await
            .unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].kind, ListingKind::ByLeader);
        assert_eq!(listings[0].host, "lh1");
        let leader_report = listings[0].result.as_ref().unwrap();
        assert_eq!(
            leader_report.items[0].participants,
            Participants::Leader("L1".to_string())
        );

        assert_eq!(listings[1].kind, ListingKind::ByMember);
        assert!(listings[1].result.is_ok());
        assert_eq!(crawler.fetcher().request_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_listing_does_not_stop_department() {
        let fetcher = MemoryFetcher::default()
            .status("http://listing.test/meeting.do?host=lh1", 429)
            .page(
                "http://listing.test/meeting.do?host=lh2",
                listing_page(&["Climate"], None),
            );
        let crawler = crawler(fetcher);
        let dep = department(vec![leader("L1", "lh1", ""), leader("L2", "lh2", "")]);

        let listings = scrape_department(&crawler, &test_config(), &dep)
            .await
            .unwrap();

        assert_eq!(listings.len(), 2);
        assert!(listings[0].result.as_ref().unwrap_err().is_rate_limited());
        assert_eq!(listings[1].result.as_ref().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_leader_without_id_is_rejected_before_crawling() {
        let mut missing = leader("L1", "lh1", "");
        missing.id = None;
        let crawler = crawler(MemoryFetcher::default());

        let err = scrape_department(&crawler, &test_config(), &department(vec![missing]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("leader"));
        assert_eq!(crawler.fetcher().request_count(), 0);
    }

    #[tokio::test]
    async fn test_member_listing_skipped_without_members() {
        let crawler = crawler(MemoryFetcher::default());
        let mut dep = department(vec![leader("L1", "", "mh1")]);
        dep.members.clear();

        let listings = scrape_department(&crawler, &test_config(), &dep)
            .await
            .unwrap();

        assert!(listings.is_empty());
        assert_eq!(crawler.fetcher().request_count(), 0);
    }
}

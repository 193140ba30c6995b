//! Crawl engine
//!
//! Drives one adapter per site through a per-novel state machine:
//!
//! ```text
//! INIT -> INDEX_FETCHED -> CHAPTERS_LISTED -> (FETCHING_CHAPTER)*
//!      -> VALIDATING -> PERSISTED | QUARANTINED | ABORTED
//! ```
//!
//! Independent sites crawl concurrently on a bounded worker pool; within a
//! site every request goes through one serialized fetcher with an enforced
//! minimum delay. Progress is checkpointed after each committed chapter so
//! an interrupted batch resumes without re-requesting anything, and a
//! detected block page aborts the novel and pauses the whole site.

pub mod antibot;
pub mod checkpoint;
pub mod fetch;

pub use antibot::{BlockDetector, HistoricalLengths, SiteCooldowns};
pub use checkpoint::CrawlCheckpoint;
pub use fetch::{Fetcher, GlobalLimiter};

use crate::adapters::SiteAdapter;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Chapter, CompletionStatus, Novel, NovelSummary};
use crate::registry::Site;
use crate::store;
use crate::validate;
use futures::stream::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Per-novel crawl state, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrawlState {
    Init,
    IndexFetched,
    ChaptersListed,
    FetchingChapter(u32),
    Validating,
}

impl std::fmt::Display for CrawlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlState::Init => write!(f, "INIT"),
            CrawlState::IndexFetched => write!(f, "INDEX_FETCHED"),
            CrawlState::ChaptersListed => write!(f, "CHAPTERS_LISTED"),
            CrawlState::FetchingChapter(n) => write!(f, "FETCHING_CHAPTER({})", n),
            CrawlState::Validating => write!(f, "VALIDATING"),
        }
    }
}

/// Why a novel was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    NetworkError,
    ParseError,
    AntiBotDetected,
    EmptyContent,
}

/// Terminal outcome of one novel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Persisted,
    Quarantined,
    Aborted,
    Skipped,
}

/// Report for one novel in a batch
#[derive(Debug, Clone, Serialize)]
pub struct NovelReport {
    pub title: String,
    pub url: String,
    pub site_id: String,
    pub category: String,
    pub outcome: Outcome,
    pub abort: Option<AbortReason>,
    pub reasons: Vec<String>,
    pub chapters: usize,
    pub chars: usize,
}

impl NovelReport {
    fn skipped(summary: &NovelSummary, reason: &str) -> Self {
        Self {
            title: summary.title.clone(),
            url: summary.url.clone(),
            site_id: summary.site_id.clone(),
            category: summary.category.clone(),
            outcome: Outcome::Skipped,
            abort: None,
            reasons: vec![reason.to_string()],
            chapters: 0,
            chars: 0,
        }
    }

    fn aborted(summary: &NovelSummary, abort: AbortReason, reason: String) -> Self {
        warn!("Aborted {} ({:?}): {}", summary.title, abort, reason);
        Self {
            title: summary.title.clone(),
            url: summary.url.clone(),
            site_id: summary.site_id.clone(),
            category: summary.category.clone(),
            outcome: Outcome::Aborted,
            abort: Some(abort),
            reasons: vec![reason],
            chapters: 0,
            chars: 0,
        }
    }
}

/// Per-site counters in a batch summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteStats {
    pub persisted: usize,
    pub quarantined: usize,
    pub aborted: usize,
    pub skipped: usize,
}

/// Summary of a whole crawl batch
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub persisted: usize,
    pub quarantined: usize,
    pub aborted: usize,
    pub skipped: usize,
    pub total_chapters: usize,
    pub total_chars: usize,
    pub sites: BTreeMap<String, SiteStats>,
    pub novels: Vec<NovelReport>,
}

impl BatchSummary {
    fn from_reports(novels: Vec<NovelReport>) -> Self {
        let mut summary = BatchSummary {
            total: novels.len(),
            persisted: 0,
            quarantined: 0,
            aborted: 0,
            skipped: 0,
            total_chapters: 0,
            total_chars: 0,
            sites: BTreeMap::new(),
            novels: Vec::new(),
        };
        for report in &novels {
            let site = summary.sites.entry(report.site_id.clone()).or_default();
            match report.outcome {
                Outcome::Persisted => {
                    summary.persisted += 1;
                    summary.total_chapters += report.chapters;
                    summary.total_chars += report.chars;
                    site.persisted += 1;
                }
                Outcome::Quarantined => {
                    summary.quarantined += 1;
                    site.quarantined += 1;
                }
                Outcome::Aborted => {
                    summary.aborted += 1;
                    site.aborted += 1;
                }
                Outcome::Skipped => {
                    summary.skipped += 1;
                    site.skipped += 1;
                }
            }
        }
        summary.novels = novels;
        summary
    }
}

/// One unit of batch work: a category listing on one site
#[derive(Debug, Clone)]
pub struct SiteJob {
    pub site: Site,
    pub category: String,
    pub count: usize,
}

/// The crawl engine
pub struct CrawlEngine {
    config: Config,
    detector: BlockDetector,
    cooldowns: SiteCooldowns,
    lengths: HistoricalLengths,
    global: Arc<GlobalLimiter>,
}

impl CrawlEngine {
    pub fn new(config: Config) -> Self {
        let detector = BlockDetector::new(&config.antibot);
        let cooldowns = SiteCooldowns::new(Duration::from_secs(config.crawl.cooldown_secs));
        let global = Arc::new(GlobalLimiter::new(config.crawl.global_requests_per_second));
        Self {
            config,
            detector,
            cooldowns,
            lengths: HistoricalLengths::new(),
            global,
        }
    }

    /// Crawl a batch of site/category jobs.
    ///
    /// Sites run concurrently on a bounded pool; per-novel failures are
    /// isolated, so one bad novel (or one blocked site) never sinks the
    /// batch. Only filesystem failures are fatal.
    pub async fn crawl_batch(&self, jobs: Vec<SiteJob>) -> Result<BatchSummary> {
        let concurrency = self.config.crawl.max_concurrent_sites;

        let results: Vec<Result<Vec<NovelReport>>> =
            futures::stream::iter(jobs.into_iter().map(|job| self.crawl_site(job)))
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut reports = Vec::new();
        for result in results {
            reports.extend(result?);
        }

        let summary = BatchSummary::from_reports(reports);

        std::fs::create_dir_all(&self.config.paths.novels_dir)?;
        std::fs::write(
            self.config.paths.crawl_summary_file(),
            serde_json::to_string_pretty(&summary)?,
        )?;

        info!(
            "Batch done: {} persisted, {} quarantined, {} aborted, {} skipped",
            summary.persisted, summary.quarantined, summary.aborted, summary.skipped
        );
        Ok(summary)
    }

    /// Crawl up to `job.count` novels from one site category.
    ///
    /// All requests for the site flow through one fetcher, which serializes
    /// them and enforces the politeness delay.
    async fn crawl_site(&self, job: SiteJob) -> Result<Vec<NovelReport>> {
        let adapter = match job.site.adapter(self.config.crawl.min_content_chars) {
            Ok(a) => a,
            Err(e) => {
                error!("Site {}: {}", job.site.id, e);
                return Ok(Vec::new());
            }
        };
        let mut fetcher = match Fetcher::new(
            &self.config.crawl,
            job.site.politeness_delay_ms,
            job.site.max_retries,
            Arc::clone(&self.global),
        ) {
            Ok(f) => f,
            Err(e) => {
                error!("Site {}: {}", job.site.id, e);
                return Ok(Vec::new());
            }
        };

        let listing_url = adapter.category_url(&job.category);
        info!("Listing {} novels from {}", job.category, listing_url);

        let listing_body = match fetcher.fetch(&listing_url).await {
            Ok(body) => body,
            Err(e) => {
                error!("Site {}: category listing failed: {}", job.site.id, e);
                return Ok(Vec::new());
            }
        };

        let mut summaries = match adapter.list_novels(&listing_body, &job.category) {
            Ok(s) => s,
            Err(e) => {
                // Structural mismatch: the site changed, retrying won't help
                error!(
                    "Site {}: listing did not parse, operator attention needed: {}",
                    job.site.id, e
                );
                return Ok(Vec::new());
            }
        };

        if self.config.crawl.filter_completed {
            summaries.retain(|s| s.completed);
        }
        summaries.truncate(job.count);

        info!(
            "Site {}: crawling {} novel(s) in {}",
            job.site.id,
            summaries.len(),
            job.category
        );

        let mut reports = Vec::new();
        let mut cooled_down = false;

        for summary in &summaries {
            if cooled_down || self.cooldowns.active(&job.site.id).is_some() {
                cooled_down = true;
                reports.push(NovelReport::skipped(summary, "site in anti-bot cooldown"));
                continue;
            }

            let report = self
                .crawl_novel(&job.site, adapter.as_ref(), &mut fetcher, summary)
                .await?;
            reports.push(report);
        }

        Ok(reports)
    }

    /// Run one novel through the state machine.
    ///
    /// Returns `Err` only for filesystem failures; every crawl-level
    /// failure is folded into the report so the batch continues.
    async fn crawl_novel(
        &self,
        site: &Site,
        adapter: &dyn SiteAdapter,
        fetcher: &mut Fetcher,
        summary: &NovelSummary,
    ) -> Result<NovelReport> {
        let mut state = CrawlState::Init;
        debug!("{}: state {}", summary.title, state);

        // INIT -> INDEX_FETCHED
        let index_body = match fetcher.fetch(&summary.url).await {
            Ok(body) => body,
            Err(e) => {
                return Ok(NovelReport::aborted(
                    summary,
                    AbortReason::NetworkError,
                    e.to_string(),
                ))
            }
        };
        state = CrawlState::IndexFetched;
        debug!("{}: state {}", summary.title, state);

        let mut metadata = match adapter.parse_novel_metadata(&index_body) {
            Ok(m) => m,
            Err(e) => {
                return Ok(NovelReport::aborted(
                    summary,
                    AbortReason::ParseError,
                    e.to_string(),
                ))
            }
        };
        metadata.url = summary.url.clone();
        metadata.category = summary.category.clone();
        if metadata.completion_status == CompletionStatus::Unknown && summary.completed {
            metadata.completion_status = CompletionStatus::Completed;
        }

        if store::is_persisted(
            &self.config.paths,
            &site.id,
            &metadata.category,
            &metadata.title,
        ) {
            debug!("{}: already persisted, skipping", metadata.title);
            return Ok(NovelReport::skipped(summary, "already persisted"));
        }

        // INDEX_FETCHED -> CHAPTERS_LISTED
        let chapter_refs = match adapter.list_chapters(&index_body) {
            Ok(refs) => refs,
            Err(e) => {
                return Ok(NovelReport::aborted(
                    summary,
                    AbortReason::ParseError,
                    e.to_string(),
                ))
            }
        };
        if chapter_refs.is_empty() {
            return Ok(NovelReport::aborted(
                summary,
                AbortReason::ParseError,
                "no chapters listed on index page".to_string(),
            ));
        }
        state = CrawlState::ChaptersListed;
        debug!(
            "{}: state {} ({} chapters)",
            summary.title,
            state,
            chapter_refs.len()
        );

        // Resume from a live checkpoint: completed orders are never
        // re-requested
        let cp_dir = &self.config.paths.checkpoints_dir;
        let mut cp = match checkpoint::load(cp_dir, &summary.url) {
            Ok(Some(cp)) => cp,
            Ok(None) => CrawlCheckpoint::new(&summary.url),
            Err(e) => {
                warn!("{}: unreadable checkpoint, restarting: {}", summary.title, e);
                CrawlCheckpoint::new(&summary.url)
            }
        };

        let mut novel = Novel::new(metadata);
        for chapter in
            checkpoint::journaled_chapters(cp_dir, &summary.url, cp.last_completed_order)?
        {
            self.lengths.record(&site.id, chapter.char_count);
            novel.push_chapter(chapter);
        }

        let bar = crate::progress::chapter_bar(chapter_refs.len() as u64, &novel.metadata.title);
        bar.set_position(cp.last_completed_order as u64);

        for chapter_ref in &chapter_refs {
            if chapter_ref.order <= cp.last_completed_order {
                continue;
            }
            state = CrawlState::FetchingChapter(chapter_ref.order);
            debug!("{}: state {}", novel.metadata.title, state);

            cp.attempt_count_for_current += 1;

            let body = match fetcher.fetch(&chapter_ref.url).await {
                Ok(body) => body,
                Err(e) => {
                    bar.finish_and_clear();
                    // Checkpoint stays live so a re-run resumes here
                    checkpoint::store(cp_dir, &cp)?;
                    return Ok(NovelReport::aborted(
                        summary,
                        AbortReason::NetworkError,
                        format!("chapter {}: {}", chapter_ref.order, e),
                    ));
                }
            };

            if self.detector.looks_blocked(&body) {
                bar.finish_and_clear();
                checkpoint::store(cp_dir, &cp)?;
                self.cooldowns.trigger(&site.id);
                return Ok(NovelReport::aborted(
                    summary,
                    AbortReason::AntiBotDetected,
                    format!("chapter {} matched a block-page fingerprint", chapter_ref.order),
                ));
            }

            let content = match adapter.extract_chapter_content(&body) {
                Ok(content) => content,
                Err(Error::EmptyContent { length, min, .. }) => {
                    bar.finish_and_clear();
                    checkpoint::store(cp_dir, &cp)?;
                    self.cooldowns.trigger(&site.id);
                    return Ok(NovelReport::aborted(
                        summary,
                        AbortReason::EmptyContent,
                        format!(
                            "chapter {}: extracted {} chars, minimum {}",
                            chapter_ref.order, length, min
                        ),
                    ));
                }
                Err(e) => {
                    bar.finish_and_clear();
                    checkpoint::store(cp_dir, &cp)?;
                    return Ok(NovelReport::aborted(
                        summary,
                        AbortReason::ParseError,
                        format!("chapter {}: {}", chapter_ref.order, e),
                    ));
                }
            };

            let content_chars = content.chars().count();
            if self
                .detector
                .length_collapsed(content_chars, self.lengths.average(&site.id))
            {
                bar.finish_and_clear();
                checkpoint::store(cp_dir, &cp)?;
                self.cooldowns.trigger(&site.id);
                return Ok(NovelReport::aborted(
                    summary,
                    AbortReason::AntiBotDetected,
                    format!(
                        "chapter {}: content collapsed to {} chars against site average",
                        chapter_ref.order, content_chars
                    ),
                ));
            }

            let chapter = Chapter::new(chapter_ref.order, chapter_ref.title.clone(), content);

            // Journal first, then advance the checkpoint atomically; a
            // crash between the two re-fetches at most this chapter
            checkpoint::journal_chapter(cp_dir, &summary.url, &chapter)?;
            self.lengths.record(&site.id, chapter.char_count);
            novel.push_chapter(chapter);
            cp.advance(chapter_ref.order);
            checkpoint::store(cp_dir, &cp)?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        state = CrawlState::Validating;
        debug!("{}: state {}", novel.metadata.title, state);

        let verdict = validate::validate(&novel, &self.config.validate);
        let report = if verdict.passed {
            store::persist_novel(&self.config.paths, &novel)?;
            checkpoint::remove(cp_dir, &summary.url)?;
            NovelReport {
                title: novel.metadata.title.clone(),
                url: summary.url.clone(),
                site_id: site.id.clone(),
                category: summary.category.clone(),
                outcome: Outcome::Persisted,
                abort: None,
                reasons: Vec::new(),
                chapters: novel.chapters.len(),
                chars: novel.total_chars(),
            }
        } else {
            store::quarantine_novel(&self.config.paths, &novel, &verdict)?;
            checkpoint::remove(cp_dir, &summary.url)?;
            NovelReport {
                title: novel.metadata.title.clone(),
                url: summary.url.clone(),
                site_id: site.id.clone(),
                category: summary.category.clone(),
                outcome: Outcome::Quarantined,
                abort: None,
                reasons: verdict.reasons.clone(),
                chapters: novel.chapters.len(),
                chars: novel.total_chars(),
            }
        };

        Ok(report)
    }
}

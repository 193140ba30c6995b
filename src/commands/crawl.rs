//! Crawl command implementation

use crate::config::Config;
use crate::crawl::{BatchSummary, CrawlEngine, SiteJob};
use crate::error::Result;
use crate::registry::SiteRegistry;

/// Options for a batch crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub site_id: String,
    pub category: String,
    pub count: usize,
    /// Crawl ongoing novels too, not only completed ones
    pub include_ongoing: bool,
}

/// Crawl a batch of novels from one site category
pub async fn cmd_crawl(config: &Config, options: &CrawlOptions) -> Result<BatchSummary> {
    let mut registry = SiteRegistry::open(&config.paths.registry_file)?;
    let site = registry.lookup(&options.site_id)?.clone();

    let mut config = config.clone();
    if options.include_ongoing {
        config.crawl.filter_completed = false;
    }

    let engine = CrawlEngine::new(config.clone());
    let summary = engine
        .crawl_batch(vec![SiteJob {
            site,
            category: options.category.clone(),
            count: options.count,
        }])
        .await?;

    // Remember the category for later runs against this site
    registry.add_categories(&options.site_id, [options.category.clone()])?;

    Ok(summary)
}

/// Human-readable batch summary
pub fn print_batch_summary(summary: &BatchSummary) {
    println!("\nCrawl summary:");
    println!("  Total: {}", summary.total);
    println!("  Persisted: {}", summary.persisted);
    println!("  Quarantined: {}", summary.quarantined);
    println!("  Aborted: {}", summary.aborted);
    println!("  Skipped: {}", summary.skipped);
    println!("  Chapters: {}", summary.total_chapters);
    println!("  Characters: {}", summary.total_chars);

    if !summary.sites.is_empty() {
        println!("\n  Per site:");
        for (site, stats) in &summary.sites {
            println!(
                "    {}: {} persisted, {} quarantined, {} aborted, {} skipped",
                site, stats.persisted, stats.quarantined, stats.aborted, stats.skipped
            );
        }
    }

    for novel in &summary.novels {
        if !novel.reasons.is_empty() {
            println!("\n  {} [{:?}]:", novel.title, novel.outcome);
            for reason in &novel.reasons {
                println!("    - {}", reason);
            }
        }
    }
}

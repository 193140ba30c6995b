//! Durable per-novel crawl progress
//!
//! One checkpoint record per in-progress novel, replaced atomically
//! (write-temp-then-rename) after every committed chapter, plus an
//! append-only journal of the fetched chapters themselves so a resumed
//! crawl never re-requests completed orders. A crash loses at most the
//! in-flight chapter: a torn journal line is ignored because its order is
//! beyond the last checkpointed one.

use crate::error::{Error, Result};
use crate::models::Chapter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Crawl progress for one novel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlCheckpoint {
    pub novel_url: String,
    /// Highest chapter order whose content is durably journaled.
    /// Monotonically non-decreasing for the lifetime of the novel.
    pub last_completed_order: u32,
    pub attempt_count_for_current: u32,
    pub updated_at: DateTime<Utc>,
}

impl CrawlCheckpoint {
    pub fn new(novel_url: &str) -> Self {
        Self {
            novel_url: novel_url.to_string(),
            last_completed_order: 0,
            attempt_count_for_current: 0,
            updated_at: Utc::now(),
        }
    }

    /// Record a committed chapter. Orders never move backwards; a stale
    /// advance is ignored rather than rewinding progress.
    pub fn advance(&mut self, order: u32) {
        if order <= self.last_completed_order {
            warn!(
                "Ignoring checkpoint rewind: {} <= {}",
                order, self.last_completed_order
            );
            return;
        }
        self.last_completed_order = order;
        self.attempt_count_for_current = 0;
        self.updated_at = Utc::now();
    }
}

/// Filesystem slug for a novel URL
fn slug(novel_url: &str) -> String {
    novel_url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

fn checkpoint_path(dir: &Path, novel_url: &str) -> PathBuf {
    dir.join(format!("{}.json", slug(novel_url)))
}

fn journal_path(dir: &Path, novel_url: &str) -> PathBuf {
    dir.join(format!("{}.chapters.jsonl", slug(novel_url)))
}

/// Load the checkpoint for a novel, if one is live
pub fn load(dir: &Path, novel_url: &str) -> Result<Option<CrawlCheckpoint>> {
    let path = checkpoint_path(dir, novel_url);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let checkpoint: CrawlCheckpoint = serde_json::from_str(&content)?;
    debug!(
        "Resuming {} from chapter {}",
        novel_url, checkpoint.last_completed_order
    );
    Ok(Some(checkpoint))
}

/// Persist the checkpoint atomically: write a temp file, then rename over
/// the live record
pub fn store(dir: &Path, checkpoint: &CrawlCheckpoint) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = checkpoint_path(dir, &checkpoint.novel_url);
    let tmp = path.with_extension("json.tmp");

    let content = serde_json::to_string_pretty(checkpoint)?;
    fs::write(&tmp, content)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

/// Append a committed chapter to the journal. Call before advancing the
/// checkpoint so the checkpointed order always has durable content.
pub fn journal_chapter(dir: &Path, novel_url: &str, chapter: &Chapter) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(journal_path(dir, novel_url))?;
    let line = serde_json::to_string(chapter)?;
    writeln!(file, "{}", line)?;
    file.flush()?;
    Ok(())
}

/// Read back the journaled chapters up to the checkpointed order.
///
/// Lines beyond `last_completed_order` (an in-flight chapter lost to a
/// crash) and unparseable torn lines are dropped.
pub fn journaled_chapters(
    dir: &Path,
    novel_url: &str,
    last_completed_order: u32,
) -> Result<Vec<Chapter>> {
    let path = journal_path(dir, novel_url);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)?;

    let mut chapters: Vec<Chapter> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Chapter>(line) {
            Ok(ch) if ch.order <= last_completed_order => {
                // Re-runs can journal an order twice if the process died
                // between journal append and checkpoint store
                if chapters.last().map_or(true, |prev| prev.order < ch.order) {
                    chapters.push(ch);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Dropping torn journal line for {}: {}", novel_url, e),
        }
    }
    chapters.sort_by_key(|c| c.order);
    Ok(chapters)
}

/// Remove the checkpoint and journal on a terminal state
pub fn remove(dir: &Path, novel_url: &str) -> Result<()> {
    for path in [checkpoint_path(dir, novel_url), journal_path(dir, novel_url)] {
        if path.exists() {
            fs::remove_file(&path).map_err(Error::Io)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://m.shuhaige.net/350415/";

    #[test]
    fn test_store_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut cp = CrawlCheckpoint::new(URL);
        cp.advance(3);

        store(tmp.path(), &cp).unwrap();
        let loaded = load(tmp.path(), URL).unwrap().unwrap();
        assert_eq!(loaded.last_completed_order, 3);
        assert_eq!(loaded.novel_url, URL);

        // No temp files left behind by the atomic write
        let stray: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |x| x == "tmp"))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn test_load_absent_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load(tmp.path(), URL).unwrap().is_none());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut cp = CrawlCheckpoint::new(URL);
        cp.advance(5);
        cp.advance(3);
        assert_eq!(cp.last_completed_order, 5);
        cp.advance(6);
        assert_eq!(cp.last_completed_order, 6);
    }

    #[test]
    fn test_journal_roundtrip_and_truncation() {
        let tmp = TempDir::new().unwrap();

        for order in 1..=3u32 {
            let ch = Chapter::new(order, format!("第{}章", order), "内容".repeat(50));
            journal_chapter(tmp.path(), URL, &ch).unwrap();
        }

        // Only orders covered by the checkpoint come back
        let chapters = journaled_chapters(tmp.path(), URL, 2).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].order, 1);
        assert_eq!(chapters[1].order, 2);
    }

    #[test]
    fn test_journal_ignores_torn_line() {
        let tmp = TempDir::new().unwrap();
        let ch = Chapter::new(1, "第1章".to_string(), "内容".repeat(50));
        journal_chapter(tmp.path(), URL, &ch).unwrap();

        // Simulate a crash mid-append
        let path = journal_path(tmp.path(), URL);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"order\":2,\"title\":\"第2").unwrap();

        let chapters = journaled_chapters(tmp.path(), URL, 1).unwrap();
        assert_eq!(chapters.len(), 1);
    }

    #[test]
    fn test_remove_clears_both_files() {
        let tmp = TempDir::new().unwrap();
        let cp = CrawlCheckpoint::new(URL);
        store(tmp.path(), &cp).unwrap();
        let ch = Chapter::new(1, "t".into(), "c".repeat(10));
        journal_chapter(tmp.path(), URL, &ch).unwrap();

        remove(tmp.path(), URL).unwrap();
        assert!(load(tmp.path(), URL).unwrap().is_none());
        assert!(journaled_chapters(tmp.path(), URL, 10).unwrap().is_empty());
    }
}

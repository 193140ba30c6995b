//! On-disk persistence for crawled novels
//!
//! A persisted novel is a text file of concatenated chapters with
//! order-preserving headers plus a sidecar JSON record. Validated novels
//! land in the training tree (`novels/site/category/title/`); novels that
//! fail validation land in the quarantine tree with their verdict recorded
//! for inspection, never mixed into the training data and never deleted.

use crate::config::PathsConfig;
use crate::error::Result;
use crate::models::{Novel, NovelMetadata};
use crate::validate::ValidationVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sidecar record persisted next to the novel text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelRecord {
    #[serde(flatten)]
    pub metadata: NovelMetadata,
    pub chapters: usize,
    pub total_chars: usize,
    pub scraped_at: DateTime<Utc>,
}

/// Strip characters that are illegal in file names
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Directory a persisted novel lives in
pub fn novel_dir(novels_dir: &Path, site_id: &str, category: &str, title: &str) -> PathBuf {
    novels_dir
        .join(site_id)
        .join(category)
        .join(safe_title(title))
}

/// Whether a novel already reached its terminal persisted state
pub fn is_persisted(paths: &PathsConfig, site_id: &str, category: &str, title: &str) -> bool {
    let dir = novel_dir(&paths.novels_dir, site_id, category, title);
    dir.join(format!("{}.json", safe_title(title))).exists()
}

/// Render the novel as its on-disk text format: an info block followed by
/// each chapter under a numbered header
pub fn novel_text(novel: &Novel) -> String {
    let mut out = String::new();
    out.push_str(&format!("标题: {}\n", novel.metadata.title));
    out.push_str(&format!("作者: {}\n", novel.metadata.author));
    out.push_str(&format!("\n简介:\n{}\n", novel.metadata.description));
    out.push_str(&format!("\n{}\n\n", "=".repeat(50)));

    for chapter in &novel.chapters {
        out.push_str(&format!("\n第 {} 章: {}\n", chapter.order, chapter.title));
        out.push_str(&format!("{}\n\n", "=".repeat(50)));
        out.push_str(&chapter.content);
        out.push_str("\n\n");
    }
    out
}

fn write_novel(dir: &Path, novel: &Novel) -> Result<()> {
    fs::create_dir_all(dir)?;
    let stem = safe_title(&novel.metadata.title);

    fs::write(dir.join(format!("{}.txt", stem)), novel_text(novel))?;

    let record = NovelRecord {
        metadata: novel.metadata.clone(),
        chapters: novel.chapters.len(),
        total_chars: novel.total_chars(),
        scraped_at: Utc::now(),
    };
    fs::write(
        dir.join(format!("{}.json", stem)),
        serde_json::to_string_pretty(&record)?,
    )?;
    Ok(())
}

/// Persist a validated novel into the training tree
pub fn persist_novel(paths: &PathsConfig, novel: &Novel) -> Result<PathBuf> {
    let dir = novel_dir(
        &paths.novels_dir,
        &novel.metadata.site_id,
        &novel.metadata.category,
        &novel.metadata.title,
    );
    write_novel(&dir, novel)?;
    info!(
        "Persisted {} ({} chapters, {} chars) to {:?}",
        novel.metadata.title,
        novel.chapters.len(),
        novel.total_chars(),
        dir
    );
    Ok(dir)
}

/// Move a validation-failed novel into the quarantine tree, recording the
/// verdict for operator review
pub fn quarantine_novel(
    paths: &PathsConfig,
    novel: &Novel,
    verdict: &ValidationVerdict,
) -> Result<PathBuf> {
    let dir = novel_dir(
        &paths.quarantine_dir,
        &novel.metadata.site_id,
        &novel.metadata.category,
        &novel.metadata.title,
    );
    write_novel(&dir, novel)?;

    let mut reasons = String::new();
    for reason in &verdict.reasons {
        reasons.push_str(reason);
        reasons.push('\n');
    }
    fs::write(dir.join("reasons.txt"), reasons)?;
    fs::write(
        dir.join("verdict.json"),
        serde_json::to_string_pretty(verdict)?,
    )?;

    info!(
        "Quarantined {} ({} reasons) to {:?}",
        novel.metadata.title,
        verdict.reasons.len(),
        dir
    );
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidateConfig;
    use crate::models::{Chapter, CompletionStatus};
    use crate::validate::validate;
    use tempfile::TempDir;

    fn paths(tmp: &TempDir) -> PathsConfig {
        let mut cfg = crate::config::Config::default();
        cfg.paths.novels_dir = tmp.path().join("novels");
        cfg.paths.quarantine_dir = tmp.path().join("quarantine");
        cfg.paths
    }

    fn sample_novel() -> Novel {
        let meta = NovelMetadata {
            title: "都市之最强战神".to_string(),
            author: "老街".to_string(),
            description: "一代战神回归都市。".to_string(),
            url: "https://m.shuhaige.net/350415/".to_string(),
            site_id: "m.shuhaige.net".to_string(),
            category: "都市".to_string(),
            total_chapters_expected: Some(2),
            completion_status: CompletionStatus::Completed,
        };
        let mut novel = Novel::new(meta);
        novel.push_chapter(Chapter::new(1, "归来".into(), "他回来了。".repeat(100)));
        novel.push_chapter(Chapter::new(2, "风云".into(), "风云突变。".repeat(100)));
        novel
    }

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("书名: 第一部?"), "书名 第一部");
        assert_eq!(safe_title("正常标题"), "正常标题");
    }

    #[test]
    fn test_persist_novel_writes_text_and_sidecar() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        let novel = sample_novel();

        let dir = persist_novel(&paths, &novel).unwrap();
        assert!(dir.starts_with(&paths.novels_dir));

        let text = std::fs::read_to_string(dir.join("都市之最强战神.txt")).unwrap();
        assert!(text.starts_with("标题: 都市之最强战神"));
        assert!(text.contains("第 1 章: 归来"));
        assert!(text.contains("第 2 章: 风云"));

        let sidecar = std::fs::read_to_string(dir.join("都市之最强战神.json")).unwrap();
        let record: NovelRecord = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(record.chapters, 2);
        assert_eq!(record.metadata.author, "老街");

        assert!(is_persisted(&paths, "m.shuhaige.net", "都市", "都市之最强战神"));
    }

    #[test]
    fn test_quarantine_records_reasons() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);

        let mut novel = sample_novel();
        novel.chapters.truncate(0);
        novel.push_chapter(Chapter::new(1, "空".into(), "x".into()));
        let verdict = validate(&novel, &ValidateConfig::default());
        assert!(!verdict.passed);

        let dir = quarantine_novel(&paths, &novel, &verdict).unwrap();
        assert!(dir.starts_with(&paths.quarantine_dir));
        let reasons = std::fs::read_to_string(dir.join("reasons.txt")).unwrap();
        assert!(!reasons.is_empty());

        // Quarantined content never lands in the training tree
        assert!(!is_persisted(&paths, "m.shuhaige.net", "都市", "都市之最强战神"));
    }

    #[test]
    fn test_chapter_headers_roundtrip_with_generator_regex() {
        let novel = sample_novel();
        let text = novel_text(&novel);
        let re = regex::Regex::new(r"第\s*(\d+)\s*章").unwrap();
        let found: Vec<u32> = re
            .captures_iter(&text)
            .map(|c| c[1].parse().unwrap())
            .collect();
        assert_eq!(found, vec![1, 2]);
    }
}

//! Core data types shared across the crawl engine, validator, and generator.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Serialization status of a novel as advertised by the source site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Ongoing,
    Completed,
    Unknown,
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionStatus::Ongoing => write!(f, "ongoing"),
            CompletionStatus::Completed => write!(f, "completed"),
            CompletionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ongoing" => Ok(CompletionStatus::Ongoing),
            "completed" => Ok(CompletionStatus::Completed),
            "unknown" => Ok(CompletionStatus::Unknown),
            _ => Err(Error::Config(format!("Unknown completion status: {}", s))),
        }
    }
}

/// Lightweight listing entry from a category page.
///
/// Not persisted beyond a crawl batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelSummary {
    pub title: String,
    pub url: String,
    pub category: String,
    pub site_id: String,
    pub author: Option<String>,
    pub completed: bool,
}

/// Novel metadata parsed from an index page, persisted as a sidecar record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelMetadata {
    pub title: String,
    pub author: String,
    pub description: String,
    pub url: String,
    pub site_id: String,
    pub category: String,
    pub total_chapters_expected: Option<u32>,
    pub completion_status: CompletionStatus,
}

/// Reference to a chapter produced by listing; 1-based, strictly increasing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRef {
    pub order: u32,
    pub title: String,
    pub url: String,
}

/// A fetched chapter; immutable once extracted and accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub order: u32,
    pub title: String,
    pub content: String,
    pub char_count: usize,
}

impl Chapter {
    pub fn new(order: u32, title: String, content: String) -> Self {
        let char_count = content.chars().count();
        Self {
            order,
            title,
            content,
            char_count,
        }
    }
}

/// An assembled novel awaiting validation and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Novel {
    pub metadata: NovelMetadata,
    pub chapters: Vec<Chapter>,
}

impl Novel {
    pub fn new(metadata: NovelMetadata) -> Self {
        Self {
            metadata,
            chapters: Vec::new(),
        }
    }

    /// Append a chapter; orders are expected to arrive strictly increasing
    pub fn push_chapter(&mut self, chapter: Chapter) {
        debug_assert!(
            self.chapters
                .last()
                .map_or(true, |c| c.order < chapter.order),
            "chapter orders must be strictly increasing"
        );
        self.chapters.push(chapter);
    }

    /// Total characters across all chapters
    pub fn total_chars(&self) -> usize {
        self.chapters.iter().map(|c| c.char_count).sum()
    }
}

/// One row of the generated training corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub original_text: String,
    pub rewritten_text: String,
    pub style_id: u32,
    pub context: Option<String>,
    pub source: String,
    pub site: String,
    pub category: String,
}

/// Map a novel category to the trainer's style id.
///
/// Unknown categories fall back to the urban-fiction style, matching the
/// upstream corpus conventions.
pub fn style_id_for_category(category: &str) -> u32 {
    match category {
        "历史" => 1,
        "悬疑" => 4,
        "言情" => 5,
        "军事" => 7,
        "玄幻" | "科幻" => 8,
        "武侠" => 9,
        "仙侠" => 10,
        "都市" => 11,
        "游戏" => 12,
        "竞技" => 13,
        _ => 11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_char_count() {
        let ch = Chapter::new(1, "第1章".to_string(), "你好世界".to_string());
        assert_eq!(ch.char_count, 4);
    }

    #[test]
    fn test_novel_total_chars() {
        let meta = NovelMetadata {
            title: "测试".to_string(),
            author: "无名".to_string(),
            description: String::new(),
            url: "https://example.com/1/".to_string(),
            site_id: "example.com".to_string(),
            category: "都市".to_string(),
            total_chapters_expected: None,
            completion_status: CompletionStatus::Unknown,
        };
        let mut novel = Novel::new(meta);
        novel.push_chapter(Chapter::new(1, "a".into(), "一二三".into()));
        novel.push_chapter(Chapter::new(2, "b".into(), "四五".into()));
        assert_eq!(novel.total_chars(), 5);
    }

    #[test]
    fn test_completion_status_roundtrip() {
        for s in ["ongoing", "completed", "unknown"] {
            let parsed: CompletionStatus = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("finished".parse::<CompletionStatus>().is_err());
    }

    #[test]
    fn test_style_id_mapping() {
        assert_eq!(style_id_for_category("都市"), 11);
        assert_eq!(style_id_for_category("玄幻"), 8);
        assert_eq!(style_id_for_category("未知类型"), 11);
    }
}

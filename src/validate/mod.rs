//! Content quality gate applied before a crawled novel is persisted
//!
//! `validate` is a pure function of the assembled novel and the configured
//! thresholds: total length, the ratio of CJK characters to all characters
//! (mostly-markup or garbled extractions fail this), and the ratio of
//! chapters individually meeting the per-chapter length floor. All three
//! must pass. Raising any threshold can only turn a pass into a fail, and
//! every failed threshold is reported, not just the first.

use crate::config::ValidateConfig;
use crate::models::Novel;
use serde::{Deserialize, Serialize};

/// Metrics computed over a novel during validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub total_length: usize,
    pub cjk_ratio: f64,
    pub valid_chapter_ratio: f64,
}

/// Outcome of validating one novel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub passed: bool,
    pub reasons: Vec<String>,
    pub metrics: ValidationMetrics,
}

/// Count CJK ideographs in a string
pub fn cjk_count(text: &str) -> usize {
    text.chars()
        .filter(|c| ('\u{4e00}'..='\u{9fa5}').contains(c))
        .count()
}

/// Validate an assembled novel against the configured thresholds
pub fn validate(novel: &Novel, cfg: &ValidateConfig) -> ValidationVerdict {
    let total_length = novel.total_chars();
    let total_cjk: usize = novel.chapters.iter().map(|c| cjk_count(&c.content)).sum();

    let cjk_ratio = if total_length > 0 {
        total_cjk as f64 / total_length as f64
    } else {
        0.0
    };

    let valid_chapters = novel
        .chapters
        .iter()
        .filter(|c| c.char_count >= cfg.min_chapter_chars)
        .count();
    let valid_chapter_ratio = if novel.chapters.is_empty() {
        0.0
    } else {
        valid_chapters as f64 / novel.chapters.len() as f64
    };

    let mut reasons = Vec::new();

    if total_length < cfg.min_total_chars {
        reasons.push(format!(
            "total length {} below minimum {}",
            total_length, cfg.min_total_chars
        ));
    }
    if cjk_ratio < cfg.min_cjk_ratio {
        reasons.push(format!(
            "CJK ratio {:.2} below minimum {:.2}",
            cjk_ratio, cfg.min_cjk_ratio
        ));
    }
    if valid_chapter_ratio < cfg.min_valid_chapter_ratio {
        reasons.push(format!(
            "valid chapter ratio {:.2} below minimum {:.2} ({}/{} chapters >= {} chars)",
            valid_chapter_ratio,
            cfg.min_valid_chapter_ratio,
            valid_chapters,
            novel.chapters.len(),
            cfg.min_chapter_chars
        ));
    }

    ValidationVerdict {
        passed: reasons.is_empty(),
        reasons,
        metrics: ValidationMetrics {
            total_length,
            cjk_ratio,
            valid_chapter_ratio,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chapter, CompletionStatus, NovelMetadata};

    fn novel_with_chapters(chapters: Vec<Chapter>) -> Novel {
        let meta = NovelMetadata {
            title: "测试小说".to_string(),
            author: "作者".to_string(),
            description: String::new(),
            url: "https://example.com/1/".to_string(),
            site_id: "example.com".to_string(),
            category: "都市".to_string(),
            total_chapters_expected: None,
            completion_status: CompletionStatus::Completed,
        };
        let mut novel = Novel::new(meta);
        for ch in chapters {
            novel.push_chapter(ch);
        }
        novel
    }

    fn good_novel() -> Novel {
        let chapters = (1..=10)
            .map(|i| Chapter::new(i, format!("第{}章", i), "他转身离开了。".repeat(50)))
            .collect();
        novel_with_chapters(chapters)
    }

    #[test]
    fn test_good_novel_passes() {
        let verdict = validate(&good_novel(), &ValidateConfig::default());
        assert!(verdict.passed, "reasons: {:?}", verdict.reasons);
        assert!(verdict.metrics.cjk_ratio > 0.8);
        assert_eq!(verdict.metrics.valid_chapter_ratio, 1.0);
    }

    #[test]
    fn test_short_novel_fails_with_reason() {
        let novel = novel_with_chapters(vec![Chapter::new(1, "第1章".into(), "太短".into())]);
        let verdict = validate(&novel, &ValidateConfig::default());
        assert!(!verdict.passed);
        assert!(verdict.reasons.iter().any(|r| r.contains("total length")));
    }

    #[test]
    fn test_markup_heavy_novel_fails_cjk_ratio() {
        let markup = "<div class=\"x\">stray markup</div>".repeat(100);
        let novel = novel_with_chapters(vec![Chapter::new(1, "第1章".into(), markup)]);
        let verdict = validate(&novel, &ValidateConfig::default());
        assert!(!verdict.passed);
        assert!(verdict.reasons.iter().any(|r| r.contains("CJK ratio")));
    }

    #[test]
    fn test_reasons_are_additive() {
        // Empty-ish novel trips every threshold at once
        let novel = novel_with_chapters(vec![Chapter::new(1, "第1章".into(), "ab".into())]);
        let verdict = validate(&novel, &ValidateConfig::default());
        assert!(!verdict.passed);
        assert_eq!(verdict.reasons.len(), 3);
    }

    #[test]
    fn test_threshold_monotonicity() {
        // If a novel passes at thresholds T, it also passes at any T' <= T
        let novel = good_novel();
        let base = ValidateConfig::default();
        assert!(validate(&novel, &base).passed);

        let mut lower = base.clone();
        lower.min_total_chars /= 2;
        lower.min_cjk_ratio /= 2.0;
        lower.min_valid_chapter_ratio /= 2.0;
        lower.min_chapter_chars /= 2;
        assert!(validate(&novel, &lower).passed);

        // And raising a threshold far enough flips it to fail
        let mut higher = base;
        higher.min_total_chars = usize::MAX;
        assert!(!validate(&novel, &higher).passed);
    }

    #[test]
    fn test_empty_novel_fails_everything() {
        let novel = novel_with_chapters(Vec::new());
        let verdict = validate(&novel, &ValidateConfig::default());
        assert!(!verdict.passed);
        assert_eq!(verdict.metrics.total_length, 0);
        assert_eq!(verdict.metrics.valid_chapter_ratio, 0.0);
    }
}

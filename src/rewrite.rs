//! Rewriter boundary
//!
//! The trained model that rewrites text into a target style is an external
//! collaborator; sample generation must never block on it. The default is
//! a deterministic keyword substitution per style, and the identity
//! rewriter is always a valid fallback.

use crate::error::Result;

/// Produces the `rewritten_text` column of a training sample
pub trait Rewriter: Send + Sync {
    fn rewrite(&self, text: &str, style_id: u32, context: Option<&str>) -> Result<String>;
}

/// `rewritten_text = original_text`
pub struct IdentityRewriter;

impl Rewriter for IdentityRewriter {
    fn rewrite(&self, text: &str, _style_id: u32, _context: Option<&str>) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Deterministic keyword substitution per style.
///
/// A bounded number of replacements per rule keeps the rewrite from
/// degrading long passages into keyword soup.
pub struct KeywordRewriter;

impl KeywordRewriter {
    fn rules(style_id: u32) -> &'static [(&'static str, &'static str)] {
        match style_id {
            // 都市
            11 => &[("城市", "都市"), ("地方", "都市")],
            // 幽默
            6 => &[("很", "超级"), ("非常", "超级"), ("好", "棒极了")],
            // 都市幽默
            18 => &[("城市", "都市"), ("很", "超级"), ("非常", "超级")],
            _ => &[],
        }
    }
}

impl Rewriter for KeywordRewriter {
    fn rewrite(&self, text: &str, style_id: u32, _context: Option<&str>) -> Result<String> {
        let mut result = text.to_string();
        for (from, to) in Self::rules(style_id) {
            let occurrences = text.matches(from).count();
            let budget = (occurrences / 3).min(3);
            if budget == 0 {
                continue;
            }
            result = result.replacen(from, to, budget);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let out = IdentityRewriter.rewrite("他走了。", 11, None).unwrap();
        assert_eq!(out, "他走了。");
    }

    #[test]
    fn test_keyword_rewrite_is_deterministic() {
        let text = "这座城市很大。城市的夜晚，城市的白天，城市永不眠。";
        let a = KeywordRewriter.rewrite(text, 11, None).unwrap();
        let b = KeywordRewriter.rewrite(text, 11, None).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("都市"));
    }

    #[test]
    fn test_keyword_rewrite_is_bounded() {
        let text = "城市。".repeat(30);
        let out = KeywordRewriter.rewrite(&text, 11, None).unwrap();
        // At most 3 replacements regardless of occurrence count
        assert_eq!(out.matches("都市").count(), 3);
    }

    #[test]
    fn test_unknown_style_is_identity() {
        let text = "这座城市很大。";
        let out = KeywordRewriter.rewrite(text, 999, None).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn test_few_occurrences_left_alone() {
        // Fewer than 3 occurrences: budget rounds to zero, text unchanged
        let text = "城市的夜晚。";
        let out = KeywordRewriter.rewrite(text, 11, None).unwrap();
        assert_eq!(out, text);
    }
}

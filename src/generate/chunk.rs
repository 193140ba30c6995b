//! Sliding-window chunking over concatenated chapter text
//!
//! Windows are cut at raw character offsets, deliberately not
//! sentence-aware. Every chunk except possibly the last has length in
//! `[min, max]`; consecutive chunks share exactly `overlap` characters;
//! the final partial window is emitted only when it clears a hard floor,
//! and is dropped (never padded) otherwise.

use crate::config::GenerateConfig;

/// One window over the source text
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Character offset of the window start in the source text
    pub start: usize,
    pub text: String,
}

/// Cut `text` into overlapping windows according to the configured bounds.
///
/// Deterministic: the same text and config always produce the same windows.
pub fn chunk(text: &str, cfg: &GenerateConfig) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let max = cfg.max_chunk_chars;
    let overlap = cfg.overlap_chars;
    debug_assert!(overlap < max);
    let step = max - overlap;

    let mut chunks = Vec::new();
    let mut pos = 0usize;

    while pos < chars.len() {
        let end = (pos + max).min(chars.len());
        let len = end - pos;

        if end < chars.len() || len >= cfg.min_chunk_chars {
            chunks.push(Chunk {
                start: pos,
                text: chars[pos..end].iter().collect(),
            });
        } else if len >= cfg.chunk_floor_chars {
            // Trailing window shorter than min but above the floor
            chunks.push(Chunk {
                start: pos,
                text: chars[pos..end].iter().collect(),
            });
        }

        if end == chars.len() {
            break;
        }
        pos += step;
    }

    chunks
}

/// Build the bounded context attached to a chunk from its neighbors.
///
/// Half the window goes to the preceding text, half to the following; when
/// a side has less text than that, the context simply comes out shorter.
/// Never exceeds `cfg.context_window` characters, never fails.
pub fn build_context(text: &str, chunk_start: usize, chunk_len: usize, cfg: &GenerateConfig) -> Option<String> {
    if cfg.context_window == 0 {
        return None;
    }
    let chars: Vec<char> = text.chars().collect();
    let half = cfg.context_window / 2;

    let before_start = chunk_start.saturating_sub(half);
    let before: String = chars[before_start..chunk_start].iter().collect();

    let chunk_end = (chunk_start + chunk_len).min(chars.len());
    let after_end = (chunk_end + half).min(chars.len());
    let after: String = chars[chunk_end..after_end].iter().collect();

    let mut parts = Vec::new();
    if !before.trim().is_empty() {
        parts.push(format!("前文: {}", before.trim()));
    }
    if !after.trim().is_empty() {
        parts.push(format!("后文: {}", after.trim()));
    }
    if parts.is_empty() {
        return None;
    }

    let joined = parts.join(" | ");
    let truncated: String = joined.chars().take(cfg.context_window).collect();
    Some(truncated)
}

/// Deterministic even-spaced selection of `cap` indices out of `total`.
///
/// Used when a novel produces more chunks than its sample cap; picking
/// evenly by index keeps repeated runs reproducible and spreads samples
/// across the whole novel instead of front-loading them.
pub fn evenly_spaced_indices(total: usize, cap: usize) -> Vec<usize> {
    if total <= cap {
        return (0..total).collect();
    }
    (0..cap).map(|i| i * total / cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(min: usize, max: usize, overlap: usize, floor: usize) -> GenerateConfig {
        let mut cfg = GenerateConfig::default();
        cfg.min_chunk_chars = min;
        cfg.max_chunk_chars = max;
        cfg.overlap_chars = overlap;
        cfg.chunk_floor_chars = floor;
        cfg
    }

    fn text_of_len(n: usize) -> String {
        // Distinct characters so overlap can be verified positionally
        (0..n)
            .map(|i| char::from_u32(0x4e00 + (i % 20000) as u32).unwrap())
            .collect()
    }

    #[test]
    fn test_chunk_bounds_and_overlap() {
        let cfg = cfg(300, 3000, 200, 100);
        let text = text_of_len(10_000);
        let chunks = chunk(&text, &cfg);

        assert!(!chunks.is_empty());
        for (i, c) in chunks.iter().enumerate() {
            let len = c.text.chars().count();
            if i + 1 < chunks.len() {
                assert!(len >= 300 && len <= 3000, "chunk {} length {}", i, len);
            } else {
                assert!(len <= 3000);
                assert!(len >= 100);
            }
        }

        // Adjacent chunks share exactly `overlap` characters
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            let shared = prev.len() - (pair[1].start - pair[0].start);
            assert_eq!(shared, 200);
            assert_eq!(prev[prev.len() - shared..], next[..shared]);
        }
    }

    #[test]
    fn test_chunk_union_covers_input() {
        let cfg = cfg(300, 3000, 200, 100);
        let text = text_of_len(10_000);
        let chunks = chunk(&text, &cfg);

        let mut covered = 0usize;
        for c in &chunks {
            assert!(c.start <= covered, "gap before offset {}", c.start);
            covered = covered.max(c.start + c.text.chars().count());
        }
        assert_eq!(covered, 10_000);
    }

    #[test]
    fn test_chunk_deterministic() {
        let cfg = cfg(300, 3000, 200, 100);
        let text = text_of_len(10_000);
        let a = chunk(&text, &cfg);
        let b = chunk(&text, &cfg);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.start, y.start);
            assert_eq!(x.text, y.text);
        }
    }

    #[test]
    fn test_trailing_chunk_below_floor_dropped() {
        // 3050 chars: window 1 covers 0..3000, next starts at 2800 and
        // covers 250 chars (>= floor 100, < min 300) -> kept
        let cfg_keep = cfg(300, 3000, 200, 100);
        let chunks = chunk(&text_of_len(3050), &cfg_keep);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text.chars().count(), 250);

        // Raise the floor above the trailing length -> dropped, not padded
        let cfg_drop = cfg(300, 3000, 200, 260);
        let chunks = chunk(&text_of_len(3050), &cfg_drop);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let cfg = cfg(300, 3000, 200, 100);
        assert_eq!(chunk(&text_of_len(500), &cfg).len(), 1);
        // Below the floor entirely: nothing is emitted
        assert!(chunk(&text_of_len(50), &cfg).is_empty());
    }

    #[test]
    fn test_context_is_bounded_and_best_effort() {
        let cfg = cfg(300, 3000, 200, 100);
        let text = text_of_len(10_000);

        // Middle chunk has context on both sides
        let ctx = build_context(&text, 5000, 1000, &cfg).unwrap();
        assert!(ctx.chars().count() <= cfg.context_window);
        assert!(ctx.contains("前文:"));
        assert!(ctx.contains("后文:"));

        // First chunk: nothing before, still no error
        let ctx = build_context(&text, 0, 1000, &cfg).unwrap();
        assert!(!ctx.contains("前文:"));
        assert!(ctx.contains("后文:"));

        // Whole-text chunk: no context at all
        assert!(build_context(&text, 0, 10_000, &cfg).is_none());
    }

    #[test]
    fn test_evenly_spaced_indices() {
        assert_eq!(evenly_spaced_indices(3, 5), vec![0, 1, 2]);

        let picked = evenly_spaced_indices(100, 10);
        assert_eq!(picked.len(), 10);
        assert_eq!(picked[0], 0);
        assert!(picked.windows(2).all(|w| w[1] > w[0]));
        assert!(*picked.last().unwrap() < 100);

        // Deterministic
        assert_eq!(evenly_spaced_indices(1234, 77), evenly_spaced_indices(1234, 77));
    }
}

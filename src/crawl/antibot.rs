//! Anti-bot interstitial detection and site cooldowns
//!
//! Detection is a heuristic predicate, not a contract: a response is
//! treated as blocked when its body carries a known block-page fingerprint
//! or when the extracted content collapses far below the site's running
//! average chapter length. Either way the novel aborts and the site enters
//! a cooldown so the rest of the batch stops burning retries against it.

use crate::config::AntiBotConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Fingerprint- and length-based block-page detector
pub struct BlockDetector {
    fingerprints: Vec<String>,
    min_length_ratio: f64,
}

impl BlockDetector {
    pub fn new(cfg: &AntiBotConfig) -> Self {
        Self {
            fingerprints: cfg.fingerprints.clone(),
            min_length_ratio: cfg.min_length_ratio,
        }
    }

    /// Whether the raw response body matches a known block-page fingerprint
    pub fn looks_blocked(&self, body: &str) -> bool {
        // Block pages are small; scanning a bounded prefix keeps this cheap
        // on real chapter pages
        let head: String = body.chars().take(4000).collect();
        let head_lower = head.to_lowercase();
        self.fingerprints
            .iter()
            .any(|fp| head.contains(fp.as_str()) || head_lower.contains(&fp.to_lowercase()))
    }

    /// Whether extracted content is suspiciously short against the site's
    /// historical average (a swapped-in interstitial rather than a chapter)
    pub fn length_collapsed(&self, content_chars: usize, historical_avg: Option<f64>) -> bool {
        match historical_avg {
            Some(avg) if avg > 0.0 => (content_chars as f64) < avg * self.min_length_ratio,
            _ => false,
        }
    }
}

/// Running average of accepted chapter lengths, per site.
///
/// The average only becomes meaningful after a few observations; until
/// then `average` returns `None` and the length heuristic stays inactive.
pub struct HistoricalLengths {
    samples: Mutex<HashMap<String, (u64, u64)>>,
    min_samples: u64,
}

impl HistoricalLengths {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            min_samples: 3,
        }
    }

    pub fn record(&self, site_id: &str, content_chars: usize) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let entry = samples.entry(site_id.to_string()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += content_chars as u64;
    }

    pub fn average(&self, site_id: &str) -> Option<f64> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.get(site_id).and_then(|(count, total)| {
            if *count >= self.min_samples {
                Some(*total as f64 / *count as f64)
            } else {
                None
            }
        })
    }
}

impl Default for HistoricalLengths {
    fn default() -> Self {
        Self::new()
    }
}

/// Site-level pause on starting new novels after a block was detected
pub struct SiteCooldowns {
    until: Mutex<HashMap<String, Instant>>,
    duration: Duration,
}

impl SiteCooldowns {
    pub fn new(duration: Duration) -> Self {
        Self {
            until: Mutex::new(HashMap::new()),
            duration,
        }
    }

    /// Put a site into cooldown
    pub fn trigger(&self, site_id: &str) {
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = Instant::now() + self.duration;
        until.insert(site_id.to_string(), deadline);
        warn!(
            "Site {} entering cooldown for {:?} after block detection",
            site_id, self.duration
        );
    }

    /// Remaining cooldown for a site, if any
    pub fn active(&self, site_id: &str) -> Option<Duration> {
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        match until.get(site_id) {
            Some(deadline) => {
                let now = Instant::now();
                if *deadline > now {
                    Some(*deadline - now)
                } else {
                    until.remove(site_id);
                    info!("Site {} cooldown elapsed", site_id);
                    None
                }
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> BlockDetector {
        BlockDetector::new(&AntiBotConfig::default())
    }

    #[test]
    fn test_fingerprint_detection() {
        let d = detector();
        assert!(d.looks_blocked("<html><title>安全验证</title></html>"));
        assert!(d.looks_blocked("<html>正在验证浏览器，请稍候</html>"));
        assert!(d.looks_blocked("<script src=\"/cdn-cgi/challenge-platform/x.js\"></script>"));
        assert!(!d.looks_blocked("<html><body>他走进了大厅。</body></html>"));
    }

    #[test]
    fn test_length_collapse_needs_history() {
        let d = detector();
        // No history yet: heuristic stays inactive
        assert!(!d.length_collapsed(10, None));
        // 10 chars against a 3000-char average collapses
        assert!(d.length_collapsed(10, Some(3000.0)));
        assert!(!d.length_collapsed(2500, Some(3000.0)));
    }

    #[test]
    fn test_historical_average_threshold() {
        let lengths = HistoricalLengths::new();
        lengths.record("a.example", 3000);
        lengths.record("a.example", 3200);
        assert!(lengths.average("a.example").is_none());

        lengths.record("a.example", 2800);
        let avg = lengths.average("a.example").unwrap();
        assert!((avg - 3000.0).abs() < 1.0);
        assert!(lengths.average("b.example").is_none());
    }

    #[test]
    fn test_cooldown_lifecycle() {
        let cooldowns = SiteCooldowns::new(Duration::from_secs(60));
        assert!(cooldowns.active("a.example").is_none());

        cooldowns.trigger("a.example");
        assert!(cooldowns.active("a.example").is_some());
        assert!(cooldowns.active("b.example").is_none());
    }

    #[test]
    fn test_cooldown_expires() {
        let cooldowns = SiteCooldowns::new(Duration::from_millis(0));
        cooldowns.trigger("a.example");
        std::thread::sleep(Duration::from_millis(5));
        assert!(cooldowns.active("a.example").is_none());
    }
}

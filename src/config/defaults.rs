//! Default values for configuration

/// Default politeness delay between requests to the same site (ms)
pub fn default_politeness_delay_ms() -> u64 {
    1000
}

/// Default maximum fetch retries per request
pub fn default_max_retries() -> u32 {
    5
}

/// Default request timeout in seconds
pub fn default_request_timeout_secs() -> u64 {
    20
}

/// Default base wait before a retry (seconds); doubles per attempt
pub fn default_retry_base_secs() -> u64 {
    2
}

/// Default cap on the retry wait (seconds)
pub fn default_retry_max_secs() -> u64 {
    30
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("bookforge/{} (Novel Corpus Crawler)", env!("CARGO_PKG_VERSION"))
}

/// Default number of sites crawled concurrently
pub fn default_max_concurrent_sites() -> usize {
    4
}

/// Default global request ceiling (requests per second across all sites)
pub fn default_global_requests_per_second() -> u32 {
    8
}

/// Default site cooldown after anti-bot detection (seconds)
pub fn default_cooldown_secs() -> u64 {
    900
}

/// Default: raise the per-site delay after repeated server errors
pub fn default_adaptive_delay() -> bool {
    true
}

/// Default delay increment on repeated server errors (ms)
pub fn default_delay_increment_ms() -> u64 {
    500
}

/// Default ceiling for the adaptive per-site delay (ms)
pub fn default_max_delay_ms() -> u64 {
    5000
}

/// Default consecutive-error count that triggers a delay increase
pub fn default_error_threshold() -> u32 {
    3
}

/// Default: restrict batch crawls to completed novels
pub fn default_filter_completed() -> bool {
    true
}

/// Default minimum characters for an extracted chapter to count as content
pub fn default_min_content_chars() -> usize {
    200
}

/// Default minimum total characters for a novel to pass validation
pub fn default_min_total_chars() -> usize {
    1000
}

/// Default minimum ratio of CJK characters across a novel
pub fn default_min_cjk_ratio() -> f64 {
    0.3
}

/// Default minimum ratio of chapters individually meeting the length floor
pub fn default_min_valid_chapter_ratio() -> f64 {
    0.5
}

/// Default minimum chunk length (chars)
pub fn default_min_chunk_chars() -> usize {
    300
}

/// Default maximum chunk length (chars)
pub fn default_max_chunk_chars() -> usize {
    3000
}

/// Default overlap between consecutive chunks (chars)
pub fn default_chunk_overlap() -> usize {
    200
}

/// Default hard floor below which a trailing chunk is dropped (chars)
pub fn default_chunk_floor_chars() -> usize {
    100
}

/// Default context window attached to a chunk (chars)
pub fn default_context_window() -> usize {
    500
}

/// Default per-novel sample cap
pub fn default_per_novel_cap() -> usize {
    200
}

/// Default global sample cap
pub fn default_global_cap() -> usize {
    500_000
}

/// Default fraction of the site's average chapter length below which
/// extracted content is treated as a block page
pub fn default_min_length_ratio() -> f64 {
    0.2
}

/// Default anti-bot block-page fingerprints
pub fn default_fingerprints() -> Vec<String> {
    [
        "正在验证浏览器",
        "安全验证",
        "请稍等",
        "challenge-platform",
        "cf-browser-verification",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

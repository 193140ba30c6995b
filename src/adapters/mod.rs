//! Per-site page parsing
//!
//! Each supported site gets one adapter: a pure, stateless transformer from
//! fetched page bodies into structured data. Adapters never perform network
//! I/O; the crawl engine owns fetching, retries, and timeouts. Unregistered
//! domains fall back to the generic probe adapter.

mod generic;
mod ixdzs;
mod shuhaige;

pub use generic::{probe_site, GenericAdapter, ProbeResult};
pub use ixdzs::IxdzsAdapter;
pub use shuhaige::ShuhaigeAdapter;

use crate::error::{Error, Result};
use crate::models::{ChapterRef, NovelMetadata, NovelSummary};
use scraper::{Html, Selector};
use std::str::FromStr;

/// Adapter id assigned to sites registered without a known adapter
pub const GENERIC_PROBE: &str = "generic-probe";

/// Page parsing contract implemented once per supported site
pub trait SiteAdapter: Send + Sync {
    /// Build the listing URL for a category
    fn category_url(&self, category: &str) -> String;

    /// Parse a category listing page into novel summaries.
    ///
    /// Fails with a parse error when the page does not match the expected
    /// structure; that signals site drift, not a transient fault.
    fn list_novels(&self, body: &str, category: &str) -> Result<Vec<NovelSummary>>;

    /// Parse a novel index page into metadata
    fn parse_novel_metadata(&self, body: &str) -> Result<NovelMetadata>;

    /// Parse a novel index page into an ordered chapter list
    fn list_chapters(&self, body: &str) -> Result<Vec<ChapterRef>>;

    /// Extract chapter text from a chapter page.
    ///
    /// Fails with `EmptyContent` when the extracted text is below the
    /// configured minimum, which usually means an interstitial page was
    /// served instead of the chapter.
    fn extract_chapter_content(&self, body: &str) -> Result<String>;

    /// Whether the page advertises the novel as completed
    fn is_completed(&self, body: &str) -> bool;
}

/// The closed set of adapters, keyed by domain in a static table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Shuhaige,
    Ixdzs,
    GenericProbe,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Shuhaige => write!(f, "shuhaige"),
            AdapterKind::Ixdzs => write!(f, "ixdzs"),
            AdapterKind::GenericProbe => write!(f, "{}", GENERIC_PROBE),
        }
    }
}

impl FromStr for AdapterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shuhaige" => Ok(AdapterKind::Shuhaige),
            "ixdzs" => Ok(AdapterKind::Ixdzs),
            GENERIC_PROBE => Ok(AdapterKind::GenericProbe),
            _ => Err(Error::Config(format!("Unknown adapter id: {}", s))),
        }
    }
}

impl AdapterKind {
    /// Look up the statically known adapter for a domain
    pub fn for_domain(domain: &str) -> Option<AdapterKind> {
        match domain {
            "m.shuhaige.net" | "shuhaige.net" | "www.shuhaige.net" => Some(AdapterKind::Shuhaige),
            "ixdzs8.com" | "www.ixdzs8.com" | "ixdzs.com" => Some(AdapterKind::Ixdzs),
            _ => None,
        }
    }

    /// Instantiate the adapter for this kind
    pub fn build(self, base_url: &str, min_content_chars: usize) -> Box<dyn SiteAdapter> {
        match self {
            AdapterKind::Shuhaige => Box::new(ShuhaigeAdapter::new(base_url, min_content_chars)),
            AdapterKind::Ixdzs => Box::new(IxdzsAdapter::new(base_url, min_content_chars)),
            AdapterKind::GenericProbe => Box::new(GenericAdapter::new(base_url, min_content_chars)),
        }
    }
}

/// Parse a CSS selector, mapping failures to a parse error
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("bad selector '{}': {}", css, e)))
}

/// Full visible text of a page
pub(crate) fn page_text(body: &str) -> String {
    let doc = Html::parse_document(body);
    doc.root_element().text().collect::<Vec<_>>().join("\n")
}

/// Resolve a possibly-relative href against the site base URL
pub(crate) fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        // Root-relative: resolve against the origin, keeping any port
        if let Ok(parsed) = url::Url::parse(base) {
            return format!("{}{}", parsed.origin().ascii_serialization(), href);
        }
        format!("{}{}", base, href)
    } else {
        format!("{}/{}", base, href)
    }
}

/// Domain portion of a URL, without a leading `www.`
pub fn domain_of(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Parse(format!("URL has no host: {}", url)))?;
    Ok(host.trim_start_matches("www.").to_string())
}

const ONGOING_MARKERS: &[&str] = &["连载中", "更新中", "未完结", "未完", "持续更新"];
const COMPLETED_MARKERS: &[&str] = &[
    "已完结", "已完本", "完结", "完本", "全本", "大结局", "全文完", "全书完",
];

/// Completion check over free text; ongoing markers take precedence over
/// completed markers since listing pages often carry both vocabularies
pub(crate) fn check_completed(text: &str) -> bool {
    if ONGOING_MARKERS.iter().any(|m| text.contains(m)) {
        return false;
    }
    COMPLETED_MARKERS.iter().any(|m| text.contains(m))
}

/// Extract `第N章` or `N.` style chapter numbers from a title
pub(crate) fn chapter_number(title: &str) -> Option<u32> {
    let re = regex::Regex::new(r"第\s*(\d+)\s*章").ok()?;
    if let Some(cap) = re.captures(title) {
        return cap[1].parse().ok();
    }
    let re = regex::Regex::new(r"^(\d+)[\.、]").ok()?;
    re.captures(title).and_then(|cap| cap[1].parse().ok())
}

/// Navigation and call-to-action vocabulary shared by the supported sites
const NAV_MARKERS: &[&str] = &[
    "点击", "收藏", "推荐", "订阅", "加入书架", "上一章", "下一章", "上一页", "下一页",
    "目录", "返回", "首页",
];

/// Drop navigation/boilerplate lines from extracted chapter text.
///
/// A line is dropped when it is short and carries a navigation marker or a
/// site-specific marker; long lines are kept since prose can mention the
/// same words. Repeated chapter headings and runs of blank lines are also
/// collapsed.
pub(crate) fn strip_nav_lines(text: &str, site_markers: &[&str]) -> String {
    let heading_re = regex::Regex::new(r"^\s*第\d+章").ok();

    let mut kept: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if kept.last().map_or(false, |l| !l.is_empty()) {
                kept.push("");
            }
            continue;
        }
        if line.chars().count() < 30
            && (NAV_MARKERS.iter().any(|m| line.contains(m))
                || site_markers.iter().any(|m| line.contains(m)))
        {
            continue;
        }
        if heading_re.as_ref().map_or(false, |re| re.is_match(line)) {
            continue;
        }
        kept.push(line);
    }
    while kept.last() == Some(&"") {
        kept.pop();
    }
    kept.join("\n")
}

/// Build metadata with the adapter's conventional fallbacks applied
pub(crate) fn metadata_with_defaults(
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    url: String,
    site_id: String,
    completed: bool,
) -> Result<NovelMetadata> {
    let title = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Parse("index page has no recognizable title".to_string()))?;
    Ok(NovelMetadata {
        title,
        author: author.unwrap_or_else(|| "未知".to_string()),
        description: description.unwrap_or_default(),
        url,
        site_id,
        // The category is only known from the listing context; the engine
        // fills it in after parsing.
        category: String::new(),
        total_chapters_expected: None,
        completion_status: if completed {
            crate::models::CompletionStatus::Completed
        } else {
            crate::models::CompletionStatus::Unknown
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("https://m.shuhaige.net", "/350415/"),
            "https://m.shuhaige.net/350415/"
        );
        assert_eq!(
            absolute_url("https://m.shuhaige.net/base/", "350415/"),
            "https://m.shuhaige.net/base/350415/"
        );
        assert_eq!(
            absolute_url("https://m.shuhaige.net", "https://other.com/x"),
            "https://other.com/x"
        );
        // Non-default ports survive root-relative resolution
        assert_eq!(
            absolute_url("http://127.0.0.1:3000", "/novel/"),
            "http://127.0.0.1:3000/novel/"
        );
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.ixdzs8.com/read/1/").unwrap(), "ixdzs8.com");
        assert_eq!(domain_of("https://m.shuhaige.net/DuShi/").unwrap(), "m.shuhaige.net");
        assert!(domain_of("not a url").is_err());
    }

    #[test]
    fn test_check_completed_precedence() {
        assert!(check_completed("本书已完结"));
        assert!(!check_completed("连载中"));
        // Ongoing wins when both appear
        assert!(!check_completed("完结 连载中"));
        assert!(!check_completed("没有任何标记"));
    }

    #[test]
    fn test_chapter_number() {
        assert_eq!(chapter_number("第12章 风起"), Some(12));
        assert_eq!(chapter_number("第 3 章：开端"), Some(3));
        assert_eq!(chapter_number("7. 序幕"), Some(7));
        assert_eq!(chapter_number("番外"), None);
    }

    #[test]
    fn test_adapter_kind_roundtrip() {
        for kind in [AdapterKind::Shuhaige, AdapterKind::Ixdzs, AdapterKind::GenericProbe] {
            let parsed: AdapterKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_static_domain_table() {
        assert_eq!(
            AdapterKind::for_domain("m.shuhaige.net"),
            Some(AdapterKind::Shuhaige)
        );
        assert_eq!(AdapterKind::for_domain("ixdzs8.com"), Some(AdapterKind::Ixdzs));
        assert_eq!(AdapterKind::for_domain("example.com"), None);
    }
}

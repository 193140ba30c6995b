//! Best-effort adapter for sites without a dedicated implementation.
//!
//! Registration runs `probe_site` over the homepage to decide whether the
//! site looks crawlable at all (a repeating list-item pattern resembling a
//! chapter or novel index). Probing registers a best guess; it does not
//! guarantee the selectors below actually fit the site.

use super::{
    absolute_url, check_completed, domain_of, metadata_with_defaults, page_text, selector,
    strip_nav_lines, SiteAdapter,
};
use crate::error::{Error, Result};
use crate::models::{ChapterRef, NovelMetadata, NovelSummary};
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;

/// Category names recognized when probing an unknown site
const KNOWN_CATEGORIES: &[&str] = &[
    "都市", "玄幻", "言情", "武侠", "科幻", "悬疑", "历史", "军事", "仙侠", "游戏", "竞技",
];

/// Minimum repeated list-item links for a page to look like an index
const MIN_LIST_LINKS: usize = 10;

/// Outcome of the structural probe over an unregistered site's homepage
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Whether the page shows a repeating list-item link pattern
    pub crawlable: bool,
    /// Category names discovered from link text
    pub categories: Vec<String>,
    /// Number of list-item links counted
    pub list_links: usize,
}

/// Inspect a homepage body for crawlability and category hints
pub fn probe_site(body: &str) -> Result<ProbeResult> {
    let doc = Html::parse_document(body);

    let mut list_links = 0usize;
    for css in ["li a[href]", "dd a[href]"] {
        list_links += doc.select(&selector(css)?).count();
    }

    let mut categories: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for link in doc.select(&selector("a[href]")?) {
        let text: String = link.text().collect::<String>().trim().to_string();
        let href = link.value().attr("href").unwrap_or_default();
        for cat in KNOWN_CATEGORIES {
            if (text.contains(cat) || href.contains(cat)) && seen.insert(cat) {
                categories.push(cat.to_string());
            }
        }
    }

    Ok(ProbeResult {
        crawlable: list_links >= MIN_LIST_LINKS,
        categories,
        list_links,
    })
}

pub struct GenericAdapter {
    base_url: String,
    site_id: String,
    min_content_chars: usize,
}

impl GenericAdapter {
    pub fn new(base_url: &str, min_content_chars: usize) -> Self {
        let site_id = domain_of(base_url).unwrap_or_else(|_| base_url.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_id,
            min_content_chars,
        }
    }
}

impl SiteAdapter for GenericAdapter {
    fn category_url(&self, category: &str) -> String {
        format!("{}/{}/", self.base_url, category)
    }

    fn list_novels(&self, body: &str, category: &str) -> Result<Vec<NovelSummary>> {
        let doc = Html::parse_document(body);
        let id_re = Regex::new(r"/(\d{4,})/").map_err(|e| Error::Parse(e.to_string()))?;

        let mut novels = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for css in ["li a[href]", "dd a[href]", "a[href]"] {
            for link in doc.select(&selector(css)?) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let looks_like_novel = id_re.is_match(href)
                    || href.to_lowercase().contains("novel")
                    || href.to_lowercase().contains("book");
                if !looks_like_novel {
                    continue;
                }
                let title: String = link.text().collect::<String>().trim().to_string();
                if title.chars().count() < 2 {
                    continue;
                }
                let url = absolute_url(&self.base_url, href);
                if !seen.insert(url.clone()) {
                    continue;
                }
                novels.push(NovelSummary {
                    title,
                    url,
                    category: category.to_string(),
                    site_id: self.site_id.clone(),
                    author: None,
                    completed: false,
                });
            }
            if !novels.is_empty() {
                break;
            }
        }

        if novels.is_empty() {
            return Err(Error::Parse(format!(
                "no recognizable novel links on category page '{}'",
                category
            )));
        }
        Ok(novels)
    }

    fn parse_novel_metadata(&self, body: &str) -> Result<NovelMetadata> {
        let doc = Html::parse_document(body);
        let text = page_text(body);

        let mut title = None;
        for css in ["h1", ".book-title", "#book-title", ".novel-title", "h2.title", "title"] {
            if let Some(elem) = doc.select(&selector(css)?).next() {
                let candidate: String = elem.text().collect::<String>().trim().to_string();
                if !candidate.is_empty() {
                    title = Some(candidate);
                    break;
                }
            }
        }

        let mut author = None;
        for css in [".author", "#author", ".book-author", "span.author"] {
            if let Some(elem) = doc.select(&selector(css)?).next() {
                let candidate: String = elem.text().collect::<String>().trim().to_string();
                if !candidate.is_empty() {
                    author = Some(candidate);
                    break;
                }
            }
        }
        if author.is_none() {
            author = Regex::new(r"作者[：:]\s*(\S+)")
                .ok()
                .and_then(|re| re.captures(&text))
                .map(|cap| cap[1].to_string());
        }

        let mut description = None;
        for css in [".description", "#description", ".book-intro", ".intro", ".summary"] {
            if let Some(elem) = doc.select(&selector(css)?).next() {
                let candidate: String = elem.text().collect::<String>().trim().to_string();
                if !candidate.is_empty() {
                    description = Some(candidate);
                    break;
                }
            }
        }

        metadata_with_defaults(
            title,
            author,
            description,
            self.base_url.clone(),
            self.site_id.clone(),
            check_completed(&text),
        )
    }

    fn list_chapters(&self, body: &str) -> Result<Vec<ChapterRef>> {
        let doc = Html::parse_document(body);

        let ladders = [
            ".chapter-list a[href]",
            "#chapter-list a[href]",
            ".chapter a[href]",
            "a[href*=\"chapter\"]",
            "dd a[href]",
            "li a[href]",
        ];

        for css in ladders {
            let links: Vec<_> = doc.select(&selector(css)?).collect();
            // A real chapter index repeats; a handful of links is navigation
            if links.len() <= 5 {
                continue;
            }
            let mut chapters = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            for link in links {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let title: String = link.text().collect::<String>().trim().to_string();
                if title.is_empty() {
                    continue;
                }
                let url = absolute_url(&self.base_url, href);
                if !seen.insert(url.clone()) {
                    continue;
                }
                chapters.push((title, url));
            }
            if !chapters.is_empty() {
                return Ok(chapters
                    .into_iter()
                    .enumerate()
                    .map(|(i, (title, url))| ChapterRef {
                        order: i as u32 + 1,
                        title,
                        url,
                    })
                    .collect());
            }
        }

        Ok(Vec::new())
    }

    fn extract_chapter_content(&self, body: &str) -> Result<String> {
        let doc = Html::parse_document(body);

        let ladder = [
            "#content",
            ".content",
            ".chapter-content",
            "#chapter-content",
            ".text-content",
            ".novel-content",
        ];

        let mut text = String::new();
        for css in ladder {
            if let Some(elem) = doc.select(&selector(css)?).next() {
                let candidate: String = elem.text().collect::<Vec<_>>().join("\n");
                if candidate.trim().chars().count() > 100 {
                    text = candidate;
                    break;
                }
            }
        }
        if text.is_empty() {
            // Whole-page text as a last resort; html2text keeps block
            // structure better than raw node concatenation here
            text = html2text::from_read(body.as_bytes(), 120).unwrap_or_else(|_| page_text(body));
        }

        let cleaned = strip_nav_lines(&text, &[]);
        let length = cleaned.chars().count();
        if length < self.min_content_chars {
            return Err(Error::EmptyContent {
                url: self.base_url.clone(),
                length,
                min: self.min_content_chars,
            });
        }
        Ok(cleaned)
    }

    fn is_completed(&self, body: &str) -> bool {
        check_completed(&page_text(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_crawlable_index() {
        let items: String = (1..=12)
            .map(|i| format!("<li><a href=\"/{:04}0/\">第{}本</a></li>", i, i))
            .collect();
        let body = format!("<html><body><ul>{}</ul></body></html>", items);

        let probe = probe_site(&body).unwrap();
        assert!(probe.crawlable);
        assert_eq!(probe.list_links, 12);
    }

    #[test]
    fn test_probe_rejects_sparse_page() {
        let body = r#"<html><body><li><a href="/about">About</a></li></body></html>"#;
        let probe = probe_site(body).unwrap();
        assert!(!probe.crawlable);
    }

    #[test]
    fn test_probe_discovers_categories() {
        let body = r#"<html><body><ul>
            <li><a href="/dushi/">都市小说</a></li>
            <li><a href="/xuanhuan/">玄幻小说</a></li>
        </ul></body></html>"#;
        let probe = probe_site(body).unwrap();
        assert!(probe.categories.contains(&"都市".to_string()));
        assert!(probe.categories.contains(&"玄幻".to_string()));
    }

    #[test]
    fn test_generic_list_chapters_needs_repetition() {
        let adapter = GenericAdapter::new("https://example.com", 50);
        let body = r#"<html><body>
            <li><a href="/1/">只有一个</a></li>
        </body></html>"#;
        assert!(adapter.list_chapters(body).unwrap().is_empty());
    }

    #[test]
    fn test_generic_list_chapters() {
        let adapter = GenericAdapter::new("https://example.com", 50);
        let items: String = (1..=8)
            .map(|i| format!("<dd><a href=\"/book/{}.html\">第{}章</a></dd>", i, i))
            .collect();
        let body = format!("<html><body><dl>{}</dl></body></html>", items);

        let chapters = adapter.list_chapters(&body).unwrap();
        assert_eq!(chapters.len(), 8);
        assert_eq!(chapters[0].order, 1);
        assert_eq!(chapters[7].order, 8);
    }
}

//! Adapter for ixdzs-style ebook sites.
//!
//! Category listings use numeric sort ids
//! (`/sort/3/index-3-2-0-0.html`), novel pages live at `/read/<id>/`, and
//! chapter pages at `/read/<id>/p<n>.html`. The page `<title>` carries
//! `书名_作者:作者名_…` which is the most reliable metadata source.

use super::{
    absolute_url, check_completed, domain_of, metadata_with_defaults, page_text, selector,
    strip_nav_lines, SiteAdapter,
};
use crate::error::{Error, Result};
use crate::models::{ChapterRef, NovelMetadata, NovelSummary};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;

const LISTING_CAP: usize = 200;

pub struct IxdzsAdapter {
    base_url: String,
    site_id: String,
    min_content_chars: usize,
}

impl IxdzsAdapter {
    pub fn new(base_url: &str, min_content_chars: usize) -> Self {
        let site_id = domain_of(base_url).unwrap_or_else(|_| base_url.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_id,
            min_content_chars,
        }
    }

    fn sort_id(category: &str) -> &str {
        match category {
            "玄幻" => "1",
            "武侠" => "2",
            "都市" => "3",
            "修真" | "仙侠" => "4",
            "军事" | "历史" => "6",
            "网游" | "竞技" => "7",
            "科幻" | "灵异" => "8",
            "言情" | "穿越" => "9",
            _ => "3",
        }
    }
}

/// Pull the author and completion status from the elements wrapping a
/// listing link, climbing one ancestor at a time and stopping as soon as
/// both are known (or `<body>` is reached). Climbing further than needed
/// would pick up text from sibling rows.
fn listing_context(link: ElementRef) -> (Option<String>, bool) {
    let mut author = None;
    let mut completed = false;

    let mut current = link;
    for _ in 0..5 {
        let Some(parent) = current.parent().and_then(ElementRef::wrap) else {
            break;
        };
        if matches!(parent.value().name(), "body" | "html") {
            break;
        }
        let text = parent.text().collect::<Vec<_>>().join(" ");
        if author.is_none() {
            author = author_from_listing(&text);
        }
        if !completed {
            completed = check_completed(&text);
        }
        if author.is_some() && completed {
            break;
        }
        current = parent;
    }

    (author, completed)
}

fn author_from_listing(text: &str) -> Option<String> {
    let patterns = [
        r"作者[：:]\s*(\S+)",
        r"(\S+)\s+\d+\.\d+万字",
        r"(\S+)\s+已完结",
    ];
    for pattern in patterns {
        let Some(cap) = Regex::new(pattern).ok().and_then(|re| re.captures(text)) else {
            continue;
        };
        let candidate = cap[1].trim().to_string();
        if candidate.chars().count() < 30
            && !["万字", "完结", "更新", "章节"]
                .iter()
                .any(|m| candidate.contains(m))
        {
            return Some(candidate);
        }
    }
    None
}

impl SiteAdapter for IxdzsAdapter {
    fn category_url(&self, category: &str) -> String {
        // index-<sort>-<status>-<length>-<order>: status 2 = completed only
        let id = Self::sort_id(category);
        format!("{}/sort/{}/index-{}-2-0-0.html", self.base_url, id, id)
    }

    fn list_novels(&self, body: &str, category: &str) -> Result<Vec<NovelSummary>> {
        let doc = Html::parse_document(body);
        let link_sel = selector("a[href]")?;
        let novel_re = Regex::new(r"/read/(\d+)/$").map_err(|e| Error::Parse(e.to_string()))?;

        let mut novels = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for link in doc.select(&link_sel) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(cap) = novel_re.captures(href) else {
                continue;
            };
            let title: String = link.text().collect::<String>().trim().to_string();
            if title.chars().count() < 2 {
                continue;
            }
            if !seen_ids.insert(cap[1].to_string()) {
                continue;
            }

            let (author, completed) = listing_context(link);

            novels.push(NovelSummary {
                title,
                url: absolute_url(&self.base_url, href),
                category: category.to_string(),
                site_id: self.site_id.clone(),
                author,
                completed,
            });

            if novels.len() >= LISTING_CAP {
                break;
            }
        }

        if novels.is_empty() {
            return Err(Error::Parse(format!(
                "category page for '{}' did not match the expected listing structure",
                category
            )));
        }
        Ok(novels)
    }

    fn parse_novel_metadata(&self, body: &str) -> Result<NovelMetadata> {
        let doc = Html::parse_document(body);
        let text = page_text(body);

        // Page title format: 书名_作者:作者名_站名
        let mut title = None;
        let mut author = None;
        if let Some(title_elem) = doc.select(&selector("title")?).next() {
            let raw: String = title_elem.text().collect::<String>().trim().to_string();
            if let Some(cap) = Regex::new(r"^([^_]+)_作者[：:]?([^_]+)_")
                .ok()
                .and_then(|re| re.captures(&raw))
            {
                title = Some(cap[1].trim().to_string());
                author = Some(cap[2].trim().to_string());
            } else if let Some(cap) = Regex::new(r"^([^_]+)")
                .ok()
                .and_then(|re| re.captures(&raw))
            {
                title = Some(cap[1].trim().to_string());
            }
        }

        if title.is_none() {
            title = doc
                .select(&selector("h1")?)
                .next()
                .map(|h1| h1.text().collect::<String>().trim().to_string());
        }

        if author.is_none() {
            author = Regex::new(r"作者[：:]\s*(\S+)")
                .ok()
                .and_then(|re| re.captures(&text))
                .map(|cap| cap[1].to_string());
        }

        let mut description = Regex::new(r"(?:作品简介|内容简介|简介)[：:]\s*([^\n]+)")
            .ok()
            .and_then(|re| re.captures(&text))
            .map(|cap| cap[1].trim().to_string());

        if description.is_none() {
            for css in ["div.desc", "div.intro", "div.summary"] {
                if let Some(elem) = doc.select(&selector(css)?).next() {
                    let candidate: String = elem.text().collect::<String>().trim().to_string();
                    if candidate.chars().count() > 50 {
                        description = Some(candidate);
                        break;
                    }
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
        let link_sel = selector("a[href]")?;
        let chapter_re =
            Regex::new(r"/read/\d+/p(\d+)\.html").map_err(|e| Error::Parse(e.to_string()))?;

        let mut chapters: Vec<(u32, String, String)> = Vec::new();
        let mut seen_pages: HashSet<u32> = HashSet::new();

        for link in doc.select(&link_sel) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(cap) = chapter_re.captures(href) else {
                continue;
            };
            let page: u32 = match cap[1].parse() {
                Ok(p) => p,
                Err(_) => continue,
            };
            let title: String = link.text().collect::<String>().trim().to_string();
            if title.is_empty() || !seen_pages.insert(page) {
                continue;
            }
            chapters.push((page, title, absolute_url(&self.base_url, href)));
        }

        chapters.sort_by_key(|(page, _, _)| *page);

        Ok(chapters
            .into_iter()
            .enumerate()
            .map(|(i, (_, title, url))| ChapterRef {
                order: i as u32 + 1,
                title,
                url,
            })
            .collect())
    }

    fn extract_chapter_content(&self, body: &str) -> Result<String> {
        let doc = Html::parse_document(body);

        let ladder = [
            "#content",
            ".content",
            "#chaptercontent",
            ".chaptercontent",
            "#novelcontent",
            ".novelcontent",
            "#text",
            ".text",
            "#article",
            ".article",
            "#read",
            ".read",
            "#booktext",
            ".booktext",
        ];

        let mut text = String::new();
        for css in ladder {
            if let Some(elem) = doc.select(&selector(css)?).next() {
                let candidate: String = elem.text().collect::<Vec<_>>().join("\n");
                if candidate.trim().chars().count() > 200 {
                    text = candidate;
                    break;
                }
            }
        }
        if text.is_empty() {
            // Last resort: the largest CJK-heavy block on the page
            let cjk_re = Regex::new(r"[一-龥]").map_err(|e| Error::Parse(e.to_string()))?;
            for div in doc.select(&selector("div")?) {
                let candidate: String = div.text().collect::<Vec<_>>().join("\n");
                if candidate.chars().count() > 500 && cjk_re.find_iter(&candidate).count() > 100 {
                    text = candidate;
                    break;
                }
            }
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

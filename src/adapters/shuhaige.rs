//! Adapter for shuhaige-style mobile novel sites.
//!
//! Category pages use pinyin path codes (`/DuShi/`), novel pages live at
//! numeric-id paths (`/350415/`), and chapter links are recognizable by
//! their `第N章` titles.

use super::{
    absolute_url, chapter_number, check_completed, domain_of, metadata_with_defaults, page_text,
    selector, SiteAdapter,
};
use crate::error::{Error, Result};
use crate::models::{ChapterRef, NovelMetadata, NovelSummary};
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;

const LISTING_CAP: usize = 200;

/// Skip-list for listing hrefs that are navigation, not novels
const NON_NOVEL_PATHS: &[&str] = &[
    "login", "register", "search", "category", "list", "sort", "tag",
];

pub struct ShuhaigeAdapter {
    base_url: String,
    site_id: String,
    min_content_chars: usize,
}

impl ShuhaigeAdapter {
    pub fn new(base_url: &str, min_content_chars: usize) -> Self {
        let site_id = domain_of(base_url).unwrap_or_else(|_| base_url.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_id,
            min_content_chars,
        }
    }

    fn category_code(category: &str) -> &str {
        match category {
            "都市" => "DuShi",
            "玄幻" => "XuanHuan",
            "言情" => "YanQing",
            "武侠" => "WuXia",
            "科幻" => "KeHuan",
            "悬疑" => "XuanYi",
            "历史" => "LiShi",
            "军事" => "JunShi",
            "游戏" => "YouXi",
            "竞技" => "JingJi",
            "仙侠" => "XianXia",
            other => other,
        }
    }

    /// Normalize `/shu_350415.html` style links to the canonical `/350415/`
    fn normalize_novel_href(href: &str) -> String {
        if let Some(cap) = Regex::new(r"/shu_(\d+)\.html")
            .ok()
            .and_then(|re| re.captures(href))
        {
            return format!("/{}/", &cap[1]);
        }
        href.to_string()
    }
}

impl SiteAdapter for ShuhaigeAdapter {
    fn category_url(&self, category: &str) -> String {
        format!("{}/{}/", self.base_url, Self::category_code(category))
    }

    fn list_novels(&self, body: &str, category: &str) -> Result<Vec<NovelSummary>> {
        let doc = Html::parse_document(body);
        let id_re = Regex::new(r"/(\d{4,})/").map_err(|e| Error::Parse(e.to_string()))?;
        let author_re = Regex::new(r"作者[：:]\s*(\S+)").map_err(|e| Error::Parse(e.to_string()))?;

        let item_sel = selector("li")?;
        let link_sel = selector("a[href]")?;

        let mut novels = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        // Listing items are plain <li> rows with the novel link first and
        // author/status text alongside it.
        for item in doc.select(&item_sel) {
            let Some(link) = item.select(&link_sel).next() else {
                continue;
            };
            let Some(raw_href) = link.value().attr("href") else {
                continue;
            };
            let href = Self::normalize_novel_href(raw_href);
            let title: String = link.text().collect::<String>().trim().to_string();

            if title.chars().count() < 2 {
                continue;
            }
            let Some(id_cap) = id_re.captures(&href) else {
                continue;
            };
            if href.ends_with(".html") {
                continue;
            }
            let lower = href.to_lowercase();
            if NON_NOVEL_PATHS.iter().any(|p| lower.contains(p)) {
                continue;
            }
            if !seen_ids.insert(id_cap[1].to_string()) {
                continue;
            }

            let item_text: String = item.text().collect::<Vec<_>>().join(" ");
            let author = author_re
                .captures(&item_text)
                .map(|cap| cap[1].trim_end_matches([':', '：']).to_string());

            let mut url = absolute_url(&self.base_url, &href);
            if !url.ends_with('/') {
                url.push('/');
            }

            novels.push(NovelSummary {
                title,
                url,
                category: category.to_string(),
                site_id: self.site_id.clone(),
                author,
                completed: check_completed(&item_text),
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

        let title = doc.select(&selector("h1")?).next().map(|h1| {
            let t: String = h1.text().collect::<String>().trim().to_string();
            t.trim_end_matches("列表").trim().to_string()
        });

        // "作者：xxx" runs straight into status text on this site; cut the
        // captured token at the first known marker.
        let author = Regex::new(r"作者[：:]\s*(\S+)")
            .ok()
            .and_then(|re| re.captures(&text))
            .map(|cap| cap[1].to_string())
            .map(|raw| {
                let mut name = raw.as_str();
                for marker in ["都市", "已完结", "最新章节", "万字", "最后更新"] {
                    if let Some(idx) = name.find(marker) {
                        name = &name[..idx];
                    }
                }
                name.trim_end_matches([':', '：']).to_string()
            })
            .filter(|a| !a.is_empty() && a.chars().count() < 30);

        let description = Regex::new(r"(?:内容简介|简介)[：:]\s*([^\n]+)")
            .ok()
            .and_then(|re| re.captures(&text))
            .map(|cap| cap[1].trim().to_string());

        let mut meta = metadata_with_defaults(
            title,
            author,
            description,
            self.base_url.clone(),
            self.site_id.clone(),
            check_completed(&text),
        )?;

        meta.total_chapters_expected = Regex::new(r"共\s*(\d+)\s*章")
            .ok()
            .and_then(|re| re.captures(&text))
            .and_then(|cap| cap[1].parse().ok());

        Ok(meta)
    }

    fn list_chapters(&self, body: &str) -> Result<Vec<ChapterRef>> {
        let doc = Html::parse_document(body);
        let link_sel = selector("a[href]")?;
        let title_re = Regex::new(r"第\d+章").map_err(|e| Error::Parse(e.to_string()))?;
        let numbered_re = Regex::new(r"^\d+[\.、]").map_err(|e| Error::Parse(e.to_string()))?;

        let mut chapters: Vec<(Option<u32>, String, String)> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for link in doc.select(&link_sel) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let title: String = link.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                continue;
            }
            if !title_re.is_match(&title) && !numbered_re.is_match(&title) {
                continue;
            }
            let url = absolute_url(&self.base_url, href);
            if !seen_urls.insert(url.clone()) {
                continue;
            }
            chapters.push((chapter_number(&title), title, url));
        }

        // Sort by the number embedded in the title where present, keeping
        // document order for unnumbered extras.
        chapters.sort_by_key(|(num, _, _)| num.unwrap_or(u32::MAX));

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
            "#chapterContent",
            "#novelcontent",
            ".novelcontent",
            "#text",
            ".text",
        ];

        let mut text = String::new();
        for css in ladder {
            if let Some(elem) = doc.select(&selector(css)?).next() {
                let candidate: String = elem.text().collect::<Vec<_>>().join("\n");
                if candidate.trim().chars().count() > 50 {
                    text = candidate;
                    break;
                }
            }
        }
        if text.is_empty() {
            text = page_text(body);
        }

        let cleaned = strip_site_boilerplate(&text);
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

/// Markers specific to this site's self-promotion lines
const SITE_MARKERS: &[&str] = &["书海阁", "www.shuhaige.net", "手机阅读", "返回书页"];

fn strip_site_boilerplate(text: &str) -> String {
    super::strip_nav_lines(text, SITE_MARKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ShuhaigeAdapter {
        ShuhaigeAdapter::new("https://m.shuhaige.net", 50)
    }

    #[test]
    fn test_category_url() {
        assert_eq!(adapter().category_url("都市"), "https://m.shuhaige.net/DuShi/");
        assert_eq!(adapter().category_url("Other"), "https://m.shuhaige.net/Other/");
    }

    #[test]
    fn test_list_novels() {
        let body = r#"<html><body><ul>
            <li><a href="/350415/">都市之最强战神</a> 作者：老街 已完结</li>
            <li><a href="/350416/">重生之都市修仙</a> 作者：十里 连载中</li>
            <li><a href="/shu_350417.html">平凡人生</a> 作者：佚名 完本</li>
            <li><a href="/login">登录</a></li>
        </ul></body></html>"#;

        let novels = adapter().list_novels(body, "都市").unwrap();
        assert_eq!(novels.len(), 3);
        assert_eq!(novels[0].title, "都市之最强战神");
        assert_eq!(novels[0].url, "https://m.shuhaige.net/350415/");
        assert!(novels[0].completed);
        assert_eq!(novels[0].author.as_deref(), Some("老街"));
        assert!(!novels[1].completed);
        // shu_ links normalized to the canonical id path
        assert_eq!(novels[2].url, "https://m.shuhaige.net/350417/");
    }

    #[test]
    fn test_list_novels_structural_mismatch() {
        let err = adapter()
            .list_novels("<html><body><p>nothing here</p></body></html>", "都市")
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_parse_novel_metadata() {
        let body = r#"<html><body>
            <h1>都市之最强战神列表</h1>
            <p>作者：老街都市已完结</p>
            <p>简介：他曾是兵王，如今回归都市。</p>
            <p>共 1024 章</p>
        </body></html>"#;

        let meta = adapter().parse_novel_metadata(body).unwrap();
        assert_eq!(meta.title, "都市之最强战神");
        assert_eq!(meta.author, "老街");
        assert!(meta.description.contains("兵王"));
        assert_eq!(meta.total_chapters_expected, Some(1024));
    }

    #[test]
    fn test_list_chapters_sorted() {
        let body = r#"<html><body><dl>
            <dd><a href="/350415/2.html">第2章 再起风云</a></dd>
            <dd><a href="/350415/1.html">第1章 归来</a></dd>
            <dd><a href="/350415/3.html">第3章 对决</a></dd>
        </dl></body></html>"#;

        let chapters = adapter().list_chapters(body).unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "第1章 归来");
        assert_eq!(chapters[0].order, 1);
        assert_eq!(chapters[2].title, "第3章 对决");
        assert_eq!(chapters[2].order, 3);
    }

    #[test]
    fn test_extract_chapter_content_strips_boilerplate() {
        let prose = "他站在城市的边缘，看着远处的灯火。".repeat(5);
        let body = format!(
            r#"<html><body><div id="content">{}
<p>上一章 目录 下一章</p><p>书海阁</p></div></body></html>"#,
            prose
        );

        let content = adapter().extract_chapter_content(&body).unwrap();
        assert!(content.contains("他站在城市的边缘"));
        assert!(!content.contains("书海阁"));
        assert!(!content.contains("上一章"));
    }

    #[test]
    fn test_extract_chapter_content_too_short() {
        let body = r#"<html><body><div id="content">太短</div></body></html>"#;
        let err = adapter().extract_chapter_content(body).unwrap_err();
        assert!(matches!(err, Error::EmptyContent { .. }));
    }
}

//! Training-data generation over the crawled novel trees
//!
//! Two on-disk layouts coexist historically: the crawl tree
//! (`site/category/novel/novel.txt`, layout A) and the organized tree
//! (`category/novel.txt`, layout B). The generator classifies the layout
//! explicitly from a bounded sample, enumerates source files accordingly,
//! windows the text into overlapping chunks with bounded context, enforces
//! deterministic per-novel and global sample caps, and serializes one
//! delimited row per sample. When the primary tree yields nothing and a
//! fallback tree was supplied, the whole generation retries against the
//! fallback before failing, and the report says which source was used.

pub mod chunk;

pub use chunk::{build_context, chunk as chunk_text, evenly_spaced_indices, Chunk};

use crate::config::{Config, GenerateConfig, PathsConfig};
use crate::error::{Error, Result};
use crate::models::{style_id_for_category, TrainingSample};
use crate::rewrite::Rewriter;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk layout of a novel tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Layout {
    /// `site/category/novel/novel.txt`
    LayoutA,
    /// `category/novel.txt`
    LayoutB,
    Unknown,
}

/// How many first-level entries the detector inspects
const DETECT_SAMPLE: usize = 3;

/// Classify a tree's layout from a bounded sample of subdirectories.
///
/// Walks the first few first-level directories: a directory chain three
/// levels deep marks layout A; text files directly under a first-level
/// directory mark layout B; anything else (including flat files with no
/// category directory at all) is Unknown.
pub fn detect_layout(root: &Path) -> Layout {
    let Ok(entries) = fs::read_dir(root) else {
        return Layout::Unknown;
    };
    let mut first_level: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    first_level.sort();

    for dir in first_level.iter().take(DETECT_SAMPLE) {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        let mut second_level: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        second_level.sort();

        for sub in second_level.iter().filter(|p| p.is_dir()).take(2) {
            let has_third_dir = fs::read_dir(sub)
                .map(|mut it| it.any(|e| e.map(|e| e.path().is_dir()).unwrap_or(false)))
                .unwrap_or(false);
            if has_third_dir {
                return Layout::LayoutA;
            }
        }

        let has_txt = second_level
            .iter()
            .any(|p| p.is_file() && p.extension().map_or(false, |x| x == "txt"));
        if has_txt {
            return Layout::LayoutB;
        }
    }

    Layout::Unknown
}

/// One enumerated source novel
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub novel_name: String,
    pub category: String,
    pub site: Option<String>,
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Enumerate novel text files under `root`, dispatching on the detected
/// layout. An unrecognized layout yields an empty list rather than a guess.
pub fn enumerate_files(root: &Path) -> Result<Vec<SourceFile>> {
    let layout = detect_layout(root);
    let mut files = Vec::new();

    match layout {
        Layout::LayoutA => {
            for entry in walkdir::WalkDir::new(root)
                .min_depth(4)
                .max_depth(4)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
                let path = entry.path();
                if !path.is_file() || path.extension().map_or(true, |x| x != "txt") {
                    continue;
                }
                let novel_dir = path.parent().unwrap_or(root);
                let category_dir = novel_dir.parent().unwrap_or(root);
                let site_dir = category_dir.parent().unwrap_or(root);
                files.push(SourceFile {
                    path: path.to_path_buf(),
                    novel_name: dir_name(novel_dir),
                    category: dir_name(category_dir),
                    site: Some(dir_name(site_dir)),
                });
            }
        }
        Layout::LayoutB => {
            for entry in walkdir::WalkDir::new(root)
                .min_depth(2)
                .max_depth(2)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
                let path = entry.path();
                if !path.is_file() || path.extension().map_or(true, |x| x != "txt") {
                    continue;
                }
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                files.push(SourceFile {
                    path: path.to_path_buf(),
                    novel_name: stem,
                    category: dir_name(path.parent().unwrap_or(root)),
                    site: None,
                });
            }
        }
        Layout::Unknown => {}
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Split novel text into chapter segments by heading.
///
/// The preamble before the first heading (title block, author, synopsis)
/// is excluded. Without any recognizable heading the whole text is one
/// segment and the windower does all the slicing.
pub fn split_chapters(content: &str) -> Vec<String> {
    let patterns = [
        r"第\s*\d+\s*章[^\n]*\n?",
        r"第\s*[一二三四五六七八九十百千万]+\s*章[^\n]*\n?",
        r"Chapter\s*\d+[^\n]*\n?",
    ];

    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        let matches: Vec<_> = re.find_iter(content).collect();
        if matches.is_empty() {
            continue;
        }

        let mut segments = Vec::new();
        for (i, m) in matches.iter().enumerate() {
            let start = m.end();
            let end = matches
                .get(i + 1)
                .map(|next| next.start())
                .unwrap_or(content.len());
            let segment = content[start..end].trim();
            if !segment.is_empty() {
                segments.push(segment.to_string());
            }
        }
        if !segments.is_empty() {
            return segments;
        }
    }

    vec![content.trim().to_string()]
}

/// Which source tree a generation run actually used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTree {
    Primary,
    Fallback,
}

/// Result of one generation run
#[derive(Debug, Serialize)]
pub struct GenerationReport {
    pub samples: usize,
    pub novels: usize,
    pub source_used: SourceTree,
    pub layout: Layout,
    pub output_path: PathBuf,
    /// Rows that pass the post-write format check
    pub well_formed_rows: usize,
    pub per_site: BTreeMap<String, usize>,
    pub per_category: BTreeMap<String, usize>,
}

/// Generation statistics sidecar
#[derive(Debug, Serialize)]
struct GenerationStats<'a> {
    total_samples: usize,
    sites: &'a BTreeMap<String, usize>,
    categories: &'a BTreeMap<String, usize>,
}

/// Serialized row caps, matching the downstream trainer's expectations
const MAX_FIELD_CHARS: usize = 2000;
const MAX_CONTEXT_CHARS: usize = 500;
const MIN_FIELD_CHARS: usize = 10;

pub struct TrainingDataGenerator {
    cfg: GenerateConfig,
    paths: PathsConfig,
    rewriter: Box<dyn Rewriter>,
}

impl TrainingDataGenerator {
    pub fn new(config: &Config, rewriter: Box<dyn Rewriter>) -> Self {
        Self {
            cfg: config.generate.clone(),
            paths: config.paths.clone(),
            rewriter,
        }
    }

    /// Generate the sample file from `primary`, retrying once against
    /// `fallback` when the primary tree yields zero usable samples.
    pub fn generate(&self, primary: &Path, fallback: Option<&Path>) -> Result<GenerationReport> {
        if let Some((samples, layout, novels)) = self.collect_samples(primary)? {
            return self.write_report(samples, layout, novels, SourceTree::Primary);
        }

        if let Some(fallback_dir) = fallback {
            warn!(
                "No samples from {:?}, falling back to {:?}",
                primary, fallback_dir
            );
            if let Some((samples, layout, novels)) = self.collect_samples(fallback_dir)? {
                return self.write_report(samples, layout, novels, SourceTree::Fallback);
            }
        }

        Err(Error::NoSamples(primary.display().to_string()))
    }

    /// Collect capped samples from one tree; `None` when the tree yields
    /// nothing usable
    fn collect_samples(
        &self,
        root: &Path,
    ) -> Result<Option<(Vec<TrainingSample>, Layout, usize)>> {
        let layout = detect_layout(root);
        if layout == Layout::Unknown {
            debug!("{:?}: unrecognized layout", root);
            return Ok(None);
        }

        let files = enumerate_files(root)?;
        if files.is_empty() {
            return Ok(None);
        }
        info!("Found {} novel file(s) under {:?} ({:?})", files.len(), root, layout);

        let mut samples: Vec<TrainingSample> = Vec::new();
        let mut novels = 0usize;

        for file in &files {
            if samples.len() >= self.cfg.global_cap {
                info!("Global sample cap {} reached", self.cfg.global_cap);
                break;
            }
            let content = match fs::read_to_string(&file.path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping unreadable {:?}: {}", file.path, e);
                    continue;
                }
            };

            let novel_samples = self.samples_for_novel(&content, file);
            if novel_samples.is_empty() {
                continue;
            }
            novels += 1;

            let remaining = self.cfg.global_cap - samples.len();
            samples.extend(novel_samples.into_iter().take(remaining));
        }

        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some((samples, layout, novels)))
    }

    /// Chunk one novel and cap its contribution deterministically
    fn samples_for_novel(&self, content: &str, src: &SourceFile) -> Vec<TrainingSample> {
        let style_id = style_id_for_category(&src.category);
        let site = src.site.clone().unwrap_or_else(|| "unknown".to_string());

        let mut windows: Vec<(String, Option<String>)> = Vec::new();
        for segment in split_chapters(content) {
            for window in chunk_text(&segment, &self.cfg) {
                let context = build_context(
                    &segment,
                    window.start,
                    window.text.chars().count(),
                    &self.cfg,
                );
                windows.push((window.text, context));
            }
        }

        // Over-cap novels contribute evenly spaced windows so repeated
        // runs stay reproducible
        let picked = evenly_spaced_indices(windows.len(), self.cfg.per_novel_cap);

        picked
            .into_iter()
            .map(|i| {
                let (original, context) = windows[i].clone();
                let rewritten = self
                    .rewriter
                    .rewrite(&original, style_id, context.as_deref())
                    .unwrap_or_else(|e| {
                        // The rewriter is optional; never block generation
                        debug!("Rewriter unavailable, keeping original: {}", e);
                        original.clone()
                    });
                TrainingSample {
                    original_text: original,
                    rewritten_text: rewritten,
                    style_id,
                    context,
                    source: src.novel_name.clone(),
                    site: site.clone(),
                    category: src.category.clone(),
                }
            })
            .collect()
    }

    fn write_report(
        &self,
        samples: Vec<TrainingSample>,
        layout: Layout,
        novels: usize,
        source_used: SourceTree,
    ) -> Result<GenerationReport> {
        let output_path = self.paths.training_data_file();
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut written = 0usize;
        let mut per_site: BTreeMap<String, usize> = BTreeMap::new();
        let mut per_category: BTreeMap<String, usize> = BTreeMap::new();

        let mut out = String::new();
        for sample in &samples {
            let original = escape_field(&sample.original_text, MAX_FIELD_CHARS);
            let rewritten = escape_field(&sample.rewritten_text, MAX_FIELD_CHARS);
            if original.is_empty() || rewritten.is_empty() {
                continue;
            }

            match &sample.context {
                Some(ctx) if !ctx.is_empty() => {
                    let context = escape_field(ctx, MAX_CONTEXT_CHARS);
                    out.push_str(&format!(
                        "{}\t{}\t{}\t{}\n",
                        original, rewritten, sample.style_id, context
                    ));
                }
                _ => {
                    out.push_str(&format!(
                        "{}\t{}\t{}\n",
                        original, rewritten, sample.style_id
                    ));
                }
            }
            written += 1;
            *per_site.entry(sample.site.clone()).or_default() += 1;
            *per_category.entry(sample.category.clone()).or_default() += 1;
        }
        fs::write(&output_path, out)?;

        let well_formed_rows = verify_sample_file(&output_path)?;
        if well_formed_rows < written {
            warn!(
                "{} of {} rows failed the format check",
                written - well_formed_rows,
                written
            );
        }

        let stats = GenerationStats {
            total_samples: written,
            sites: &per_site,
            categories: &per_category,
        };
        fs::write(
            self.paths.training_stats_file(),
            serde_json::to_string_pretty(&stats)?,
        )?;

        info!(
            "Generated {} sample(s) from {} novel(s) into {:?}",
            written, novels, output_path
        );

        Ok(GenerationReport {
            samples: written,
            novels,
            source_used,
            layout,
            output_path,
            well_formed_rows,
            per_site,
            per_category,
        })
    }
}

/// Flatten a text field for the delimited format: separators become
/// spaces, runs of spaces collapse, and the field is capped
fn escape_field(text: &str, cap: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let collapsed = flat.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(cap).collect()
}

/// Count rows of the sample file that the trainer will accept
pub fn verify_sample_file(path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)?;
    let mut well_formed = 0usize;
    for line in content.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            continue;
        }
        if parts[2].parse::<u32>().is_err() {
            continue;
        }
        if parts[0].chars().count() > MIN_FIELD_CHARS && parts[1].chars().count() > MIN_FIELD_CHARS
        {
            well_formed += 1;
        }
    }
    Ok(well_formed)
}

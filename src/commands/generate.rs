//! Generate command implementation

use crate::config::Config;
use crate::error::Result;
use crate::generate::{GenerationReport, TrainingDataGenerator};
use crate::rewrite::{IdentityRewriter, KeywordRewriter, Rewriter};
use std::path::PathBuf;

/// Options for sample generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Source tree; defaults to the organized tree
    pub source: Option<PathBuf>,
    /// Fallback tree; defaults to the crawl tree
    pub fallback: Option<PathBuf>,
    /// Skip the style rewriter and emit identity rows
    pub no_rewrite: bool,
}

/// Generate the training sample file
pub fn cmd_generate(config: &Config, options: &GenerateOptions) -> Result<GenerationReport> {
    let rewriter: Box<dyn Rewriter> = if options.no_rewrite {
        Box::new(IdentityRewriter)
    } else {
        Box::new(KeywordRewriter)
    };
    let generator = TrainingDataGenerator::new(config, rewriter);

    let primary = options
        .source
        .clone()
        .unwrap_or_else(|| config.paths.processed_dir.clone());
    let fallback = options
        .fallback
        .clone()
        .unwrap_or_else(|| config.paths.novels_dir.clone());

    generator.generate(&primary, Some(&fallback))
}

/// Human-readable generation report
pub fn print_generation_report(report: &GenerationReport) {
    println!("\n✓ Training data generated");
    println!("  Samples: {}", report.samples);
    println!("  Novels: {}", report.novels);
    println!("  Source: {:?} ({:?})", report.source_used, report.layout);
    println!("  Output: {}", report.output_path.display());
    println!(
        "  Format check: {}/{} rows well-formed",
        report.well_formed_rows, report.samples
    );

    if !report.per_category.is_empty() {
        println!("\n  Per category:");
        for (category, count) in &report.per_category {
            println!("    {}: {}", category, count);
        }
    }
}

//! Pipeline command implementation

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{PipelineOptions, PipelineOrchestrator, PipelineReport, StageStatus};

/// Run the full pipeline
pub async fn cmd_pipeline(config: &Config, options: &PipelineOptions) -> Result<PipelineReport> {
    let orchestrator = PipelineOrchestrator::new(config.clone());
    orchestrator.run(options).await
}

/// Human-readable pipeline report
pub fn print_pipeline_report(report: &PipelineReport) {
    println!("\nPipeline stages:");
    for stage in &report.stages {
        let marker = match stage.status {
            StageStatus::Ok => "✓",
            StageStatus::Skipped => "→",
            StageStatus::Failed => "✗",
        };
        let detail = stage
            .detail
            .as_deref()
            .map(|d| format!(" ({})", d))
            .unwrap_or_default();
        println!("  {} {}{}", marker, stage.stage_name, detail);
        for (name, count) in &stage.counts {
            println!("      {}: {}", name, count);
        }
    }

    println!("\nVerification:");
    for (name, count) in &report.verification.counts {
        println!("  {}: {}", name, count);
    }
    if report.verification.failures.is_empty() {
        println!("\n✓ Pipeline completed");
    } else {
        println!("\n✗ Pipeline verification failed:");
        for failure in &report.verification.failures {
            println!("  - {}", failure);
        }
    }
}

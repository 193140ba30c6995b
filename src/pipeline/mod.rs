//! Pipeline orchestration
//!
//! Ordered stages: `scrape -> organize -> generate_training_data ->
//! train`. Every stage declares the artifacts it consumes and produces;
//! before a stage runs, its upstream artifacts must already exist (either
//! freshly produced or left over from a prior run). A missing artifact
//! whose producing stage was skipped fails fast as a precondition error
//! instead of silently producing an empty downstream stage. Stage
//! failures are isolated; nothing rolls back. After the last stage a
//! verification pass asserts non-zero counts for the critical artifacts,
//! because silent zero-output runs (wrong directory layout, empty
//! listings) are the dominant failure mode this pipeline exists to catch.

use crate::config::Config;
use crate::crawl::{CrawlEngine, SiteJob};
use crate::error::{Error, Result};
use crate::generate::{verify_sample_file, TrainingDataGenerator};
use crate::registry::SiteRegistry;
use crate::rewrite::KeywordRewriter;
use crate::trainer::{CommandTrainer, Trainer};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, info, warn};

/// The ordered stage set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scrape,
    Organize,
    GenerateTrainingData,
    Train,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Scrape,
        Stage::Organize,
        Stage::GenerateTrainingData,
        Stage::Train,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Organize => "organize",
            Stage::GenerateTrainingData => "generate_training_data",
            Stage::Train => "train",
        }
    }

    /// Upstream artifacts this stage consumes, with their producing stage
    fn required_inputs(&self, config: &Config) -> Vec<(PathBuf, Stage)> {
        match self {
            Stage::Scrape => Vec::new(),
            Stage::Organize => vec![(config.paths.novels_dir.clone(), Stage::Scrape)],
            // Generation falls back from the organized tree to the crawl
            // tree, so the crawl tree is the hard requirement
            Stage::GenerateTrainingData => {
                vec![(config.paths.novels_dir.clone(), Stage::Scrape)]
            }
            Stage::Train => vec![(
                config.paths.training_data_file(),
                Stage::GenerateTrainingData,
            )],
        }
    }

    /// Artifacts this stage declares as outputs
    pub fn outputs(&self, config: &Config) -> Vec<PathBuf> {
        match self {
            Stage::Scrape => vec![config.paths.novels_dir.clone()],
            Stage::Organize => vec![config.paths.processed_dir.clone()],
            Stage::GenerateTrainingData => vec![config.paths.training_data_file()],
            Stage::Train => vec![config.paths.model_dir.clone()],
        }
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scrape" => Ok(Stage::Scrape),
            "organize" => Ok(Stage::Organize),
            "generate" | "generate_training_data" => Ok(Stage::GenerateTrainingData),
            "train" => Ok(Stage::Train),
            _ => Err(Error::Config(format!("Unknown stage: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Skipped,
    Failed,
}

/// Per-stage result consumed by the next stage's precondition check and
/// the final verification
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStageResult {
    pub stage_name: String,
    pub status: StageStatus,
    pub output_paths: Vec<PathBuf>,
    pub counts: BTreeMap<String, u64>,
    pub detail: Option<String>,
}

impl PipelineStageResult {
    fn skipped(stage: Stage, config: &Config, detail: &str) -> Self {
        Self {
            stage_name: stage.name().to_string(),
            status: StageStatus::Skipped,
            output_paths: stage.outputs(config),
            counts: BTreeMap::new(),
            detail: Some(detail.to_string()),
        }
    }

    fn failed(stage: Stage, config: &Config, detail: String) -> Self {
        Self {
            stage_name: stage.name().to_string(),
            status: StageStatus::Failed,
            output_paths: stage.outputs(config),
            counts: BTreeMap::new(),
            detail: Some(detail),
        }
    }
}

/// Final verification over the critical artifacts
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub counts: BTreeMap<String, u64>,
    /// Named zero-count failures; empty means the run is trustworthy
    pub failures: Vec<String>,
}

/// Structured summary of a pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub stages: Vec<PipelineStageResult>,
    pub verification: VerificationReport,
    pub success: bool,
}

/// What to run
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub site: Option<String>,
    pub category: Option<String>,
    pub count: usize,
    pub skip: BTreeSet<Stage>,
}

pub struct PipelineOrchestrator {
    config: Config,
}

impl PipelineOrchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self, opts: &PipelineOptions) -> Result<PipelineReport> {
        let mut stages: Vec<PipelineStageResult> = Vec::new();

        for stage in Stage::ALL {
            if opts.skip.contains(&stage) {
                info!("Stage {}: skipped by request", stage.name());
                stages.push(PipelineStageResult::skipped(
                    stage,
                    &self.config,
                    "skipped by request",
                ));
                continue;
            }

            // Precondition: upstream artifacts must exist before this
            // stage runs
            let mut precondition_failure = None;
            for (artifact, producer) in stage.required_inputs(&self.config) {
                if artifact.exists() {
                    continue;
                }
                let message = format!(
                    "stage '{}' requires {:?}, produced by '{}', which does not exist",
                    stage.name(),
                    artifact,
                    producer.name()
                );
                if opts.skip.contains(&producer) {
                    // The operator asked to skip the producer and its
                    // artifact is absent: running further stages could
                    // only produce silent garbage
                    return Err(Error::Precondition(message));
                }
                precondition_failure = Some(message);
            }
            if let Some(message) = precondition_failure {
                error!("Stage {}: {}", stage.name(), message);
                stages.push(PipelineStageResult::failed(stage, &self.config, message));
                continue;
            }

            let result = match stage {
                Stage::Scrape => self.run_scrape(opts).await,
                Stage::Organize => self.run_organize(),
                Stage::GenerateTrainingData => self.run_generate(),
                Stage::Train => self.run_train().await,
            };

            match result {
                Ok(result) => stages.push(result),
                Err(e) => {
                    error!("Stage {} failed: {}", stage.name(), e);
                    stages.push(PipelineStageResult::failed(stage, &self.config, e.to_string()));
                }
            }
        }

        let verification = self.verify(&opts.skip);
        let success = stages.iter().all(|s| s.status != StageStatus::Failed)
            && verification.failures.is_empty();

        Ok(PipelineReport {
            stages,
            verification,
            success,
        })
    }

    async fn run_scrape(&self, opts: &PipelineOptions) -> Result<PipelineStageResult> {
        let (Some(site_id), Some(category)) = (&opts.site, &opts.category) else {
            return Ok(PipelineStageResult::skipped(
                Stage::Scrape,
                &self.config,
                "no site/category specified; using existing data",
            ));
        };

        let registry = SiteRegistry::open(&self.config.paths.registry_file)?;
        let site = registry.lookup(site_id)?.clone();

        let engine = CrawlEngine::new(self.config.clone());
        let summary = engine
            .crawl_batch(vec![SiteJob {
                site,
                category: category.clone(),
                count: opts.count,
            }])
            .await?;

        let mut counts = BTreeMap::new();
        counts.insert("persisted".to_string(), summary.persisted as u64);
        counts.insert("quarantined".to_string(), summary.quarantined as u64);
        counts.insert("aborted".to_string(), summary.aborted as u64);
        counts.insert("chapters".to_string(), summary.total_chapters as u64);

        Ok(PipelineStageResult {
            stage_name: Stage::Scrape.name().to_string(),
            status: StageStatus::Ok,
            output_paths: Stage::Scrape.outputs(&self.config),
            counts,
            detail: None,
        })
    }

    /// Migrate the crawl tree (layout A) into the organized tree
    /// (layout B): `processed/category/novel.txt`
    fn run_organize(&self) -> Result<PipelineStageResult> {
        let files = crate::generate::enumerate_files(&self.config.paths.novels_dir)?;

        let mut copied = 0u64;
        for file in &files {
            let target_dir = self.config.paths.processed_dir.join(&file.category);
            std::fs::create_dir_all(&target_dir)?;
            let target = target_dir.join(format!("{}.txt", file.novel_name));
            std::fs::copy(&file.path, &target)?;
            copied += 1;
        }

        if copied == 0 {
            warn!("Organize: nothing to migrate from the crawl tree");
        } else {
            info!("Organize: migrated {} novel(s) into the organized tree", copied);
        }

        let mut counts = BTreeMap::new();
        counts.insert("migrated".to_string(), copied);

        Ok(PipelineStageResult {
            stage_name: Stage::Organize.name().to_string(),
            status: StageStatus::Ok,
            output_paths: Stage::Organize.outputs(&self.config),
            counts,
            detail: None,
        })
    }

    fn run_generate(&self) -> Result<PipelineStageResult> {
        let generator = TrainingDataGenerator::new(&self.config, Box::new(KeywordRewriter));
        let report = generator.generate(
            &self.config.paths.processed_dir,
            Some(&self.config.paths.novels_dir),
        )?;

        let mut counts = BTreeMap::new();
        counts.insert("samples".to_string(), report.samples as u64);
        counts.insert("novels".to_string(), report.novels as u64);
        counts.insert("well_formed_rows".to_string(), report.well_formed_rows as u64);

        Ok(PipelineStageResult {
            stage_name: Stage::GenerateTrainingData.name().to_string(),
            status: StageStatus::Ok,
            output_paths: Stage::GenerateTrainingData.outputs(&self.config),
            counts,
            detail: Some(format!("source: {:?}", report.source_used)),
        })
    }

    async fn run_train(&self) -> Result<PipelineStageResult> {
        let Some(command) = &self.config.trainer.command else {
            return Ok(PipelineStageResult::skipped(
                Stage::Train,
                &self.config,
                "no trainer command configured",
            ));
        };

        let trainer = CommandTrainer::new(command);
        let outcome = trainer
            .train(
                &self.config.paths.training_data_file(),
                &self.config.paths.model_dir,
            )
            .await?;

        let mut counts = BTreeMap::new();
        counts.insert("input_rows".to_string(), outcome.input_rows as u64);
        counts.insert("artifacts".to_string(), outcome.artifacts.len() as u64);

        Ok(PipelineStageResult {
            stage_name: Stage::Train.name().to_string(),
            status: StageStatus::Ok,
            output_paths: Stage::Train.outputs(&self.config),
            counts,
            detail: outcome.noop.then(|| "trainer no-op".to_string()),
        })
    }

    /// Count the critical artifacts and name every zero explicitly
    fn verify(&self, skip: &BTreeSet<Stage>) -> VerificationReport {
        let mut counts = BTreeMap::new();
        let mut failures = Vec::new();

        let novels = count_persisted_novels(&self.config);
        counts.insert("persisted_novels".to_string(), novels);
        if novels == 0 {
            failures.push("no persisted novels in the training tree".to_string());
        }

        let samples = verify_sample_file(&self.config.paths.training_data_file()).unwrap_or(0);
        counts.insert("training_samples".to_string(), samples as u64);
        if samples == 0 {
            failures.push("training sample file has zero usable rows".to_string());
        }

        if !skip.contains(&Stage::Train) && self.config.trainer.command.is_some() {
            let artifacts = std::fs::read_dir(&self.config.paths.model_dir)
                .map(|it| it.filter_map(|e| e.ok()).filter(|e| e.path().is_file()).count())
                .unwrap_or(0) as u64;
            counts.insert("model_artifacts".to_string(), artifacts);
            if artifacts == 0 {
                failures.push("trainer produced no model artifacts".to_string());
            }
        }

        VerificationReport { counts, failures }
    }
}

/// Count persisted novel sidecars in the training tree
fn count_persisted_novels(config: &Config) -> u64 {
    let mut count = 0u64;
    for entry in walkdir::WalkDir::new(&config.paths.novels_dir)
        .min_depth(4)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().map_or(false, |x| x == "json") {
            count += 1;
        }
    }
    count
}

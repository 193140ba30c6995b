//! External trainer boundary
//!
//! The model trainer is an opaque collaborator: it receives the sample
//! file path and an output directory, and on success leaves model
//! artifacts behind. The one behavior the pipeline depends on is that a
//! zero-input run is detectable as a no-op, which the verification stage
//! checks by counting input rows and output artifacts.

use crate::error::{Error, Result};
use crate::generate::verify_sample_file;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of handing the sample file to the trainer
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub input_rows: usize,
    /// Model artifact files present under the output directory afterwards
    pub artifacts: Vec<PathBuf>,
    /// True when the trainer was not run (no command configured, or
    /// nothing to train on)
    pub noop: bool,
}

#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(&self, samples: &Path, model_dir: &Path) -> Result<TrainOutcome>;
}

/// Spawns a configured external command as `<command> <samples> <model_dir>`
pub struct CommandTrainer {
    command: String,
}

impl CommandTrainer {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

fn list_artifacts(model_dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(model_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Trainer for CommandTrainer {
    async fn train(&self, samples: &Path, model_dir: &Path) -> Result<TrainOutcome> {
        let input_rows = verify_sample_file(samples)?;
        if input_rows == 0 {
            warn!("Trainer not invoked: sample file has no usable rows");
            return Ok(TrainOutcome {
                input_rows,
                artifacts: Vec::new(),
                noop: true,
            });
        }

        std::fs::create_dir_all(model_dir)?;

        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Trainer("empty trainer command".to_string()))?;

        info!("Invoking trainer: {} ({} rows)", self.command, input_rows);
        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(samples)
            .arg(model_dir)
            .status()
            .await
            .map_err(|e| Error::Trainer(format!("failed to spawn '{}': {}", program, e)))?;

        if !status.success() {
            return Err(Error::Trainer(format!(
                "trainer exited with {}",
                status.code().map_or("signal".to_string(), |c| c.to_string())
            )));
        }

        Ok(TrainOutcome {
            input_rows,
            artifacts: list_artifacts(model_dir),
            noop: false,
        })
    }
}

/// Stands in when no trainer command is configured
pub struct NoopTrainer;

#[async_trait]
impl Trainer for NoopTrainer {
    async fn train(&self, samples: &Path, model_dir: &Path) -> Result<TrainOutcome> {
        let input_rows = verify_sample_file(samples).unwrap_or(0);
        Ok(TrainOutcome {
            input_rows,
            artifacts: list_artifacts(model_dir),
            noop: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_samples(path: &Path, rows: usize) {
        let mut out = String::new();
        for i in 0..rows {
            out.push_str(&format!(
                "这是第{}条原始样本文本内容\t这是第{}条改写样本文本内容\t11\n",
                i, i
            ));
        }
        std::fs::write(path, out).unwrap();
    }

    #[tokio::test]
    async fn test_zero_input_is_detectable_noop() {
        let tmp = TempDir::new().unwrap();
        let samples = tmp.path().join("training_data.txt");
        std::fs::write(&samples, "").unwrap();

        let trainer = CommandTrainer::new("false");
        let outcome = trainer.train(&samples, &tmp.path().join("model")).await.unwrap();
        assert!(outcome.noop);
        assert_eq!(outcome.input_rows, 0);
        assert!(outcome.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_command_trainer_runs_and_lists_artifacts() {
        let tmp = TempDir::new().unwrap();
        let samples = tmp.path().join("training_data.txt");
        write_samples(&samples, 5);
        let model_dir = tmp.path().join("model");

        // Stand-in trainer: touch drops an artifact and tolerates the
        // appended sample/model-dir arguments
        let trainer = CommandTrainer::new(&format!(
            "touch {}",
            model_dir.join("model.bin").display()
        ));
        std::fs::create_dir_all(&model_dir).unwrap();
        let outcome = trainer.train(&samples, &model_dir).await.unwrap();
        assert!(!outcome.noop);
        assert_eq!(outcome.input_rows, 5);
        assert!(outcome.artifacts.iter().any(|p| p.ends_with("model.bin")));
    }

    #[tokio::test]
    async fn test_failing_trainer_surfaces_error() {
        let tmp = TempDir::new().unwrap();
        let samples = tmp.path().join("training_data.txt");
        write_samples(&samples, 5);

        let trainer = CommandTrainer::new("false");
        let err = trainer
            .train(&samples, &tmp.path().join("model"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Trainer(_)));
    }

    #[tokio::test]
    async fn test_noop_trainer() {
        let tmp = TempDir::new().unwrap();
        let samples = tmp.path().join("training_data.txt");
        write_samples(&samples, 3);

        let outcome = NoopTrainer.train(&samples, &tmp.path().join("model")).await.unwrap();
        assert!(outcome.noop);
        assert_eq!(outcome.input_rows, 3);
    }
}

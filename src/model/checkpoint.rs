//! Best-model checkpointing with a JSON metadata sidecar.

use crate::model::architecture::{init_model, SeqClassifier};
use crate::model::ModelConfig;
use anyhow::{Context, Result};
use burn::prelude::*;
use burn::record::{CompactRecorder, Recorder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CHECKPOINT_VERSION: u32 = 1;

/// Metadata stored next to the recorded weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub version: u32,
    pub dataset: String,
    pub missing_rate: f64,
    pub model: String,
    pub seed: u64,
    pub epoch: usize,
    pub valid_loss: f64,
    pub model_config: ModelConfig,
}

/// Tracks the best validation loss and persists the model that achieved it.
pub struct CheckpointManager {
    dir: PathBuf,
    best_loss: Option<f64>,
}

impl CheckpointManager {
    /// Create a manager rooted at `dir`, creating it if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        crate::utils::ensure_dir(&dir)?;
        Ok(Self {
            dir,
            best_loss: None,
        })
    }

    fn weights_path(&self) -> PathBuf {
        self.dir.join("best_model")
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join("best_model.json")
    }

    /// Persist the model if its validation loss strictly improves on the
    /// best seen so far. Returns whether a save happened.
    pub fn save_best<B: Backend>(
        &mut self,
        model: SeqClassifier<B>,
        metadata: &CheckpointMetadata,
    ) -> Result<bool> {
        if let Some(best) = self.best_loss {
            if metadata.valid_loss >= best {
                return Ok(false);
            }
        }

        let recorder = CompactRecorder::new();
        recorder
            .record(model.into_record(), self.weights_path())
            .context("Failed to record model weights")?;

        let json = serde_json::to_string_pretty(metadata)
            .context("Failed to serialize checkpoint metadata")?;
        fs::write(self.metadata_path(), json)
            .with_context(|| format!("Failed to write {:?}", self.metadata_path()))?;

        debug!(
            "Saved checkpoint at epoch {} (valid_loss={:.6})",
            metadata.epoch, metadata.valid_loss
        );
        self.best_loss = Some(metadata.valid_loss);
        Ok(true)
    }

    /// Rebuild the best model from disk.
    pub fn load_best<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(SeqClassifier<B>, CheckpointMetadata)> {
        let raw = fs::read_to_string(self.metadata_path())
            .with_context(|| format!("Failed to read {:?}", self.metadata_path()))?;
        let metadata: CheckpointMetadata =
            serde_json::from_str(&raw).context("Failed to parse checkpoint metadata")?;

        let recorder = CompactRecorder::new();
        let record = recorder
            .load(self.weights_path(), device)
            .context("Failed to load recorded weights")?;

        let model = init_model::<B>(&metadata.model_config, device).load_record(record);
        info!(
            "Restored checkpoint from epoch {} (valid_loss={:.6})",
            metadata.epoch, metadata.valid_loss
        );
        Ok((model, metadata))
    }

    /// Checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn metadata(valid_loss: f64, epoch: usize) -> CheckpointMetadata {
        CheckpointMetadata {
            version: CHECKPOINT_VERSION,
            dataset: "Coffee".to_string(),
            missing_rate: 0.3,
            model: "neuralcde".to_string(),
            seed: 42,
            epoch,
            valid_loss,
            model_config: ModelConfig::new(5, 1, 8, 1, 2, 2),
        }
    }

    #[test]
    fn test_save_and_restore_round_trip() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let mut manager = CheckpointManager::new(dir.path()).unwrap();

        let config = ModelConfig::new(5, 1, 8, 1, 2, 2);
        let model = init_model::<TestBackend>(&config, &device);

        assert!(manager.save_best(model, &metadata(0.5, 3)).unwrap());

        let (restored, meta) = manager.load_best::<TestBackend>(&device).unwrap();
        assert_eq!(meta.epoch, 3);
        assert_eq!(meta.dataset, "Coffee");

        let features = Tensor::zeros([2, 4, 5], &device);
        let coeffs = Tensor::zeros([2, 4, 1], &device);
        assert_eq!(restored.forward(features, coeffs).dims(), [2, 2]);
    }

    #[test]
    fn test_save_best_requires_strict_improvement() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let mut manager = CheckpointManager::new(dir.path()).unwrap();
        let config = ModelConfig::new(5, 1, 8, 1, 2, 2);

        let model = init_model::<TestBackend>(&config, &device);
        assert!(manager.save_best(model, &metadata(0.5, 1)).unwrap());

        let model = init_model::<TestBackend>(&config, &device);
        assert!(!manager.save_best(model, &metadata(0.5, 2)).unwrap());

        let model = init_model::<TestBackend>(&config, &device);
        assert!(manager.save_best(model, &metadata(0.4, 3)).unwrap());
    }

    #[test]
    fn test_load_without_checkpoint_errors() {
        let dir = TempDir::new().unwrap();
        let device: <TestBackend as Backend>::Device = Default::default();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(manager.load_best::<TestBackend>(&device).is_err());
    }
}

//! Epoch loop: Adam with weight decay, step-decayed learning rate,
//! validation-driven snapshots, and early stopping.

use crate::data::batch::{assemble, batch_plan};
use crate::data::preprocessing::PreparedData;
use crate::data::SplitIndices;
use crate::model::architecture::{SeqClassifier, SeqClassifierRecord};
use crate::model::checkpoint::{CheckpointManager, CheckpointMetadata};
use crate::model::ModelConfig;
use crate::training::scheduler::LearningRateScheduler;
use crate::training::{TrainingConfig, TrainingResult, TrainingState};
use anyhow::Result;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Identifies the run for checkpoint metadata.
#[derive(Debug, Clone)]
pub struct RunTag {
    pub dataset: String,
    pub missing_rate: f64,
    pub model: String,
}

/// Drives training of a [`SeqClassifier`] on one prepared dataset.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    device: B::Device,
    checkpoint: Option<CheckpointManager>,
    tag: RunTag,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device, tag: RunTag) -> Self {
        Self {
            config,
            device,
            checkpoint: None,
            tag,
        }
    }

    /// Enable on-disk checkpointing of the best validation model.
    pub fn with_checkpointing(mut self, manager: CheckpointManager) -> Self {
        self.checkpoint = Some(manager);
        self
    }

    /// Train until the epoch budget or early stopping, then restore the
    /// best-validation weights.
    ///
    /// The learning rate follows the step schedule by epoch index whether
    /// or not validation is improving. If a checkpoint manager is set and
    /// restoring from disk fails, the in-memory snapshot is used instead
    /// and the failure is logged rather than propagated.
    pub fn train(
        &mut self,
        mut model: SeqClassifier<B>,
        model_config: &ModelConfig,
        data: &PreparedData,
        split: &SplitIndices,
    ) -> Result<(SeqClassifier<B>, TrainingResult)> {
        let start = Instant::now();
        let mut optimizer = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay as f32)))
            .init();
        let scheduler = LearningRateScheduler::Step {
            step_size: self.config.lr_step,
            gamma: self.config.lr_gamma,
        };
        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);

        let mut state = TrainingState::new();
        let mut best_record: Option<SeqClassifierRecord<B>> = None;
        let mut best_epoch: Option<usize> = None;
        let mut best_checkpoint: Option<PathBuf> = None;

        info!(
            "Training {} on '{}' (rate={}, lr={}, batch_size={}, epochs<={})",
            self.tag.model,
            self.tag.dataset,
            self.tag.missing_rate,
            self.config.learning_rate,
            self.config.batch_size,
            self.config.epochs
        );
        let progress = ProgressBar::new(self.config.epochs as u64);

        for epoch in 0..self.config.epochs {
            let lr = scheduler.get_lr(self.config.learning_rate, epoch);
            let plan = batch_plan(
                &split.train,
                self.config.batch_size,
                true,
                true,
                self.config.seed.wrapping_add(epoch as u64),
            );

            let mut loss_sum = 0.0;
            for indices in &plan {
                let batch = assemble::<B>(data, indices, &self.device);
                let (logits, aux) = model.forward_with_aux(batch.features, batch.coeffs);
                let mut loss = loss_fn.forward(logits, batch.targets);
                if let Some(aux) = aux {
                    loss = loss + aux;
                }
                loss_sum += loss.clone().into_scalar().elem::<f64>();

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(lr, model, grads);
            }
            let train_loss = loss_sum / plan.len().max(1) as f64;

            let inference_model = model.valid();
            let valid_loss = evaluate_loss(
                &inference_model,
                data,
                &split.valid,
                self.config.batch_size,
                &self.device,
            );
            let test_loss = evaluate_loss(
                &inference_model,
                data,
                &split.test,
                self.config.batch_size,
                &self.device,
            );

            let improved = state.update_epoch(train_loss, valid_loss, test_loss);
            if improved {
                best_epoch = Some(state.epoch);
                best_record = Some(model.clone().into_record());
                if let Some(manager) = &mut self.checkpoint {
                    let metadata = CheckpointMetadata {
                        version: 1,
                        dataset: self.tag.dataset.clone(),
                        missing_rate: self.tag.missing_rate,
                        model: self.tag.model.clone(),
                        seed: self.config.seed,
                        epoch: state.epoch,
                        valid_loss,
                        model_config: snapshot(model_config),
                    };
                    manager.save_best(model.valid(), &metadata)?;
                    best_checkpoint = Some(manager.dir().to_path_buf());
                }
            }

            if state.epoch % 10 == 0 {
                debug!(
                    "epoch {}: train_loss={:.6} valid_loss={:.6} lr={:.2e} patience={}",
                    state.epoch, train_loss, valid_loss, lr, state.patience
                );
            }
            progress.inc(1);

            if state.should_stop(&self.config) {
                info!(
                    "Early stopping at epoch {} (best valid_loss={:.6})",
                    state.epoch, state.best_loss
                );
                break;
            }
        }
        progress.finish_and_clear();

        // Restore the weights that achieved the best validation loss.
        let mut restored_from_disk = false;
        if let Some(manager) = &self.checkpoint {
            match manager.load_best::<B>(&self.device) {
                Ok((best, _)) => {
                    model = best;
                    restored_from_disk = true;
                }
                Err(err) => {
                    warn!("Checkpoint restore failed ({err:#}); using in-memory snapshot");
                }
            }
        }
        if !restored_from_disk {
            if let Some(record) = best_record {
                model = model.load_record(record);
            }
        }

        let duration_secs = start.elapsed().as_secs_f64();
        info!(
            "Finished after {} epochs in {} (best valid_loss={:.6})",
            state.epoch,
            crate::utils::format_duration(duration_secs),
            state.best_loss
        );

        Ok((
            model,
            TrainingResult {
                state,
                best_epoch,
                best_checkpoint,
                duration_secs,
            },
        ))
    }
}

/// Mean per-sample loss over a split, in inference mode.
pub fn evaluate_loss<B: Backend>(
    model: &SeqClassifier<B>,
    data: &PreparedData,
    indices: &[usize],
    batch_size: usize,
    device: &B::Device,
) -> f64 {
    let plan = batch_plan(indices, batch_size, false, false, 0);
    let loss_fn = CrossEntropyLossConfig::new().init(device);

    let mut sum = 0.0;
    let mut count = 0usize;
    for batch_indices in &plan {
        let batch = assemble::<B>(data, batch_indices, device);
        let (logits, aux) = model.forward_with_aux(batch.features, batch.coeffs);
        let mut loss = loss_fn.forward(logits, batch.targets);
        if let Some(aux) = aux {
            loss = loss + aux;
        }
        sum += loss.into_scalar().elem::<f64>() * batch_indices.len() as f64;
        count += batch_indices.len();
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn snapshot(config: &ModelConfig) -> ModelConfig {
    ModelConfig::new(
        config.input_size,
        config.coeff_size,
        config.hidden_dim,
        config.num_layers,
        config.num_hidden_layers,
        config.num_classes,
    )
    .with_dropout(config.dropout)
    .with_aux_loss(config.aux_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawDataset;
    use crate::model::architecture::init_model;
    use crate::model::Interpolation;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn toy_run() -> (PreparedData, SplitIndices) {
        let n = 24;
        let seq_len = 6;
        let raw = RawDataset {
            name: "toy".to_string(),
            // class 0 low values, class 1 high values
            values: (0..n)
                .flat_map(|i| {
                    let base = if i % 2 == 0 { 0.0f32 } else { 5.0 };
                    (0..seq_len).map(move |t| base + t as f32 * 0.1)
                })
                .collect(),
            labels: (0..n).map(|i| (i % 2) as i64).collect(),
            num_samples: n,
            seq_len,
            num_dims: 1,
            num_classes: 2,
        };
        let data =
            crate::data::preprocessing::preprocess(&raw, 0.0, Interpolation::Hermite, false, 0);
        let split = SplitIndices {
            train: (0..16).collect(),
            valid: (16..20).collect(),
            test: (20..24).collect(),
        };
        (data, split)
    }

    fn tag() -> RunTag {
        RunTag {
            dataset: "toy".to_string(),
            missing_rate: 0.0,
            model: "neuralcde".to_string(),
        }
    }

    #[test]
    fn test_train_records_losses_and_returns_model() {
        let (data, split) = toy_run();
        let device = Default::default();
        let params = crate::config::HyperParams {
            hidden_dim: 8,
            num_layers: 1,
            lr: Some(1e-2),
        };
        let config = ModelConfig::for_run("neuralcde", &data, &params);
        let model = init_model::<TestBackend>(&config, &device);

        let mut trainer = Trainer::<TestBackend>::new(
            TrainingConfig::for_run(3, 8, 1e-2, 7),
            device,
            tag(),
        );
        let (model, result) = trainer.train(model, &config, &data, &split).unwrap();

        assert_eq!(result.state.epoch, 3);
        assert_eq!(result.state.train_losses.len(), 3);
        assert_eq!(result.state.valid_losses.len(), 3);
        assert_eq!(result.state.test_losses.len(), 3);
        assert!(result.state.best_loss.is_finite());
        assert!(result.best_epoch.is_some());
        assert!(result.best_checkpoint.is_none());

        let device = Default::default();
        let batch = assemble::<TestBackend>(&data, &split.test, &device);
        let logits = model.forward(batch.features, batch.coeffs);
        assert_eq!(logits.dims(), [4, 2]);
    }

    #[test]
    fn test_train_with_checkpointing_writes_best() {
        let (data, split) = toy_run();
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let params = crate::config::HyperParams {
            hidden_dim: 8,
            num_layers: 1,
            lr: Some(1e-2),
        };
        let config = ModelConfig::for_run("neuralcde", &data, &params);
        let model = init_model::<TestBackend>(&config, &device);

        let manager = CheckpointManager::new(dir.path()).unwrap();
        let mut trainer = Trainer::<TestBackend>::new(
            TrainingConfig::for_run(2, 8, 1e-2, 7),
            device,
            tag(),
        )
        .with_checkpointing(manager);

        let (_, result) = trainer.train(model, &config, &data, &split).unwrap();
        assert!(result.best_checkpoint.is_some());
        assert!(dir.path().join("best_model.json").is_file());
    }

    #[test]
    fn test_evaluate_loss_empty_split() {
        let (data, _) = toy_run();
        let device = Default::default();
        let params = crate::config::HyperParams {
            hidden_dim: 8,
            num_layers: 1,
            lr: None,
        };
        let config = ModelConfig::for_run("neuralcde", &data, &params);
        let model = init_model::<NdArray<f32>>(&config, &device);
        assert_eq!(evaluate_loss(&model, &data, &[], 8, &device), 0.0);
    }
}

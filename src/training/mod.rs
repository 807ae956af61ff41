//! Training configuration, epoch-level state, and early stopping.

pub mod scheduler;
pub mod trainer;

use burn::prelude::Config;
use std::path::PathBuf;

/// Training hyperparameters for one run.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Maximum number of epochs
    pub epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Base learning rate
    pub learning_rate: f64,
    /// L2 weight decay
    pub weight_decay: f64,
    /// Epochs between learning-rate decays
    #[config(default = 10)]
    pub lr_step: usize,
    /// Multiplicative decay factor
    #[config(default = 0.5)]
    pub lr_gamma: f64,
    /// Epochs that must elapse before early stopping can trigger
    #[config(default = 20)]
    pub min_epochs: usize,
    /// Non-improving epochs tolerated after `min_epochs`
    #[config(default = 10)]
    pub patience_limit: usize,
    /// Run seed for shuffling and initialization
    pub seed: u64,
}

impl TrainingConfig {
    /// Standard configuration: weight decay coupled to the learning rate.
    pub fn for_run(epochs: usize, batch_size: usize, learning_rate: f64, seed: u64) -> Self {
        Self::new(epochs, batch_size, learning_rate, learning_rate * 0.01, seed)
    }
}

/// Mutable per-run training state.
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Completed epochs
    pub epoch: usize,
    /// Best validation loss seen so far
    pub best_loss: f64,
    /// Epochs since the last improvement
    pub patience: usize,
    /// Per-epoch training loss
    pub train_losses: Vec<f64>,
    /// Per-epoch validation loss
    pub valid_losses: Vec<f64>,
    /// Per-epoch test loss, tracked for curves only
    pub test_losses: Vec<f64>,
}

impl TrainingState {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            best_loss: f64::INFINITY,
            patience: 0,
            train_losses: Vec::new(),
            valid_losses: Vec::new(),
            test_losses: Vec::new(),
        }
    }

    /// Record an epoch. Early stopping and snapshots key on the validation
    /// loss alone; the test loss is only kept for curves. Returns whether
    /// the validation loss strictly improved on the best seen so far.
    pub fn update_epoch(&mut self, train_loss: f64, valid_loss: f64, test_loss: f64) -> bool {
        self.epoch += 1;
        self.train_losses.push(train_loss);
        self.valid_losses.push(valid_loss);
        self.test_losses.push(test_loss);

        if valid_loss < self.best_loss {
            self.best_loss = valid_loss;
            self.patience = 0;
            true
        } else {
            self.patience += 1;
            false
        }
    }

    /// Early-stopping rule: only after the minimum epoch count, and only
    /// once patience exceeds the limit.
    pub fn should_stop(&self, config: &TrainingConfig) -> bool {
        self.epoch > config.min_epochs && self.patience > config.patience_limit
    }
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one training run.
#[derive(Debug)]
pub struct TrainingResult {
    /// Final training state with loss histories
    pub state: TrainingState,
    /// Epoch of the best validation loss (1-based), if any improved
    pub best_epoch: Option<usize>,
    /// Where the best checkpoint was written, if checkpointing was enabled
    pub best_checkpoint: Option<PathBuf>,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrainingConfig {
        TrainingConfig::for_run(100, 16, 1e-3, 0)
    }

    #[test]
    fn test_weight_decay_coupled_to_lr() {
        let cfg = TrainingConfig::for_run(100, 32, 2e-3, 0);
        assert!((cfg.weight_decay - 2e-5).abs() < 1e-12);
    }

    #[test]
    fn test_strict_improvement_resets_patience() {
        let mut state = TrainingState::new();
        assert!(state.update_epoch(1.0, 0.9, 1.0));
        assert!(!state.update_epoch(1.0, 0.9, 1.0));
        assert_eq!(state.patience, 1);
        assert!(state.update_epoch(1.0, 0.8, 1.0));
        assert_eq!(state.patience, 0);
        assert_eq!(state.best_loss, 0.8);
    }

    #[test]
    fn test_no_early_stop_before_min_epochs() {
        let cfg = config();
        let mut state = TrainingState::new();
        state.update_epoch(1.0, 0.5, 1.0);
        for _ in 0..19 {
            state.update_epoch(1.0, 0.6, 1.0);
        }
        // epoch 20 with patience 19: still within the warmup window
        assert_eq!(state.epoch, 20);
        assert!(!state.should_stop(&cfg));
    }

    #[test]
    fn test_early_stop_after_patience_exhausted() {
        let cfg = config();
        let mut state = TrainingState::new();
        state.update_epoch(1.0, 0.5, 1.0);
        for _ in 0..10 {
            state.update_epoch(1.0, 0.6, 1.0);
        }
        for _ in 0..10 {
            state.update_epoch(1.0, 0.6, 1.0);
        }
        assert_eq!(state.epoch, 21);
        assert_eq!(state.patience, 20);
        assert!(state.should_stop(&cfg));
    }

    #[test]
    fn test_patience_boundary_is_exclusive() {
        let cfg = config();
        let mut state = TrainingState::new();
        // 25 epochs, patience exactly at the limit
        state.update_epoch(1.0, 0.5, 1.0);
        for _ in 0..14 {
            state.update_epoch(1.0, 0.4 - 0.001 * state.epoch as f64, 1.0);
        }
        for _ in 0..10 {
            state.update_epoch(1.0, 1.0, 1.0);
        }
        assert_eq!(state.patience, 10);
        assert!(!state.should_stop(&cfg));
        state.update_epoch(1.0, 1.0, 1.0);
        assert!(state.should_stop(&cfg));
    }
}

//! Learning-rate schedules.

/// Learning-rate schedule applied per epoch.
#[derive(Debug, Clone, Copy)]
pub enum LearningRateScheduler {
    /// Fixed learning rate
    Constant,
    /// Multiply by `gamma` every `step_size` epochs
    Step { step_size: usize, gamma: f64 },
}

impl LearningRateScheduler {
    /// Learning rate for a zero-based epoch index.
    pub fn get_lr(&self, base_lr: f64, epoch: usize) -> f64 {
        match self {
            LearningRateScheduler::Constant => base_lr,
            LearningRateScheduler::Step { step_size, gamma } => {
                let decays = epoch / step_size;
                base_lr * gamma.powi(decays as i32)
            }
        }
    }
}

//! # ists-bench: irregular time-series classification benchmark harness
//!
//! ists-bench trains and evaluates missing-value time-series classifiers
//! over a fixed battery of public datasets and artificial missing rates,
//! persisting per-run predictions and logits for later aggregation.
//!
//! ## Features
//!
//! - Per-(dataset, model) hyperparameter records loaded from disk
//! - Precomputed train/val/test splits keyed by (dataset, seed)
//! - Missing-rate masking with mask/delta/intensity channels and
//!   interpolation coefficients
//! - Early stopping on validation loss with step LR decay
//! - Deterministic per-run result files (labels, predictions, logits)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ists_bench::runner::{run_once, Paths, RunSpec};
//! use ists_bench::TrainBackend;
//!
//! let paths = Paths {
//!     data_root: "data".into(),
//!     config_root: "config".into(),
//!     out_root: "out".into(),
//! };
//! let spec = RunSpec {
//!     dataset: "Coffee".to_string(),
//!     missing_rate: 0.0,
//!     model: "neuralcde".to_string(),
//!     epochs: 100,
//!     seed: 42,
//!     skip_existing: false,
//!     checkpoint_dir: None,
//! };
//! let device = Default::default();
//! let summary = run_once::<TrainBackend>(&paths, &spec, &device).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod model;
pub mod predict;
pub mod results;
pub mod runner;
pub mod training;
pub mod utils;

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;

/// Default inference backend
pub type DefaultBackend = NdArray<f32>;

/// Training backend with automatic differentiation
pub type TrainBackend = Autodiff<DefaultBackend>;

/// Re-export commonly used types
pub use config::HyperParams;
pub use data::{RawDataset, SplitIndices};
pub use model::{Interpolation, ModelConfig};
pub use predict::EvalOutput;
pub use results::ResultRecord;
pub use training::{TrainingConfig, TrainingResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - irregular time-series classification benchmark harness",
        NAME, VERSION
    )
}

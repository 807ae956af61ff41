//! Per-run configuration artifacts loaded from the fixed on-disk layout.
//!
//! Hyperparameter records live at
//! `<config-root>/params/<dataset>/<dataset>_<model>.json` and split index
//! triples at `<config-root>/split/<dataset>/<dataset>_<seed>.json`. Both
//! are pre-generated; a missing file is a hard error with no fallback.

use crate::data::SplitIndices;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hyperparameter record for one (dataset, model) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperParams {
    /// Hidden dimension of the classifier
    pub hidden_dim: usize,
    /// Configured layer count; interpretation depends on the model family
    pub num_layers: usize,
    /// Explicit learning rate; `None` defers to the batch-size rule
    pub lr: Option<f64>,
}

impl HyperParams {
    /// Reject degenerate records; every model needs at least one layer
    /// and a non-zero hidden width.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_dim == 0 {
            bail!("hidden_dim must be at least 1");
        }
        if self.num_layers == 0 {
            bail!("num_layers must be at least 1");
        }
        Ok(())
    }
}

/// Path of the hyperparameter record for (dataset, model)
pub fn params_path(config_root: &Path, dataset: &str, model: &str) -> PathBuf {
    config_root
        .join("params")
        .join(dataset)
        .join(format!("{}_{}.json", dataset, model))
}

/// Path of the split file for (dataset, seed)
pub fn split_path(config_root: &Path, dataset: &str, seed: u64) -> PathBuf {
    config_root
        .join("split")
        .join(dataset)
        .join(format!("{}_{}.json", dataset, seed))
}

/// Load the hyperparameter record for a (dataset, model) pair.
pub fn load_hyperparams(config_root: &Path, dataset: &str, model: &str) -> Result<HyperParams> {
    let path = params_path(config_root, dataset, model);
    debug!("Loading hyperparameters from {:?}", path);

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read hyperparameter record {:?}", path))?;
    let params: HyperParams = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse hyperparameter record {:?}", path))?;
    params
        .validate()
        .with_context(|| format!("Invalid hyperparameter record {:?}", path))?;

    Ok(params)
}

/// Load the precomputed split triple for a (dataset, seed) pair.
///
/// Stratification by label is a property of the pre-generated file and is
/// not recomputed here.
pub fn load_split(config_root: &Path, dataset: &str, seed: u64) -> Result<SplitIndices> {
    let path = split_path(config_root, dataset, seed);
    debug!("Loading split from {:?}", path);

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read split file {:?}", path))?;
    let split: SplitIndices = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse split file {:?}", path))?;

    Ok(split)
}

/// Write a hyperparameter record (used when generating config artifacts).
pub fn write_hyperparams(
    config_root: &Path,
    dataset: &str,
    model: &str,
    params: &HyperParams,
) -> Result<PathBuf> {
    let path = params_path(config_root, dataset, model);
    if let Some(parent) = path.parent() {
        crate::utils::ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(params).context("Failed to serialize params")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

/// Write a split file (used when generating config artifacts).
pub fn write_split(
    config_root: &Path,
    dataset: &str,
    seed: u64,
    split: &SplitIndices,
) -> Result<PathBuf> {
    let path = split_path(config_root, dataset, seed);
    if let Some(parent) = path.parent() {
        crate::utils::ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(split).context("Failed to serialize split")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

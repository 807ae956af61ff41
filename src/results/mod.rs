//! Result records and their deterministic on-disk layout.
//!
//! One run writes one JSON file at
//! `<out-root>/<dataset>/<rate>/<dataset>_<rate>_<model>_<seed>.json`,
//! where `<rate>` is the missing rate formatted to one decimal place. The
//! path is a pure function of the run parameters so that reruns land on
//! the same file and sweeps can skip work that already exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Persisted outcome of one (dataset, rate, model, seed) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub dataset: String,
    pub missing_rate: f64,
    pub model: String,
    pub seed: u64,
    /// True test labels, in split order
    pub y_true: Vec<i64>,
    /// Predicted test labels, in split order
    pub y_pred: Vec<i64>,
    /// Raw test logits, one row per sample
    pub logits: Vec<Vec<f32>>,
}

/// Missing rate rendered with one decimal place, as used in paths.
pub fn format_missing_rate(rate: f64) -> String {
    format!("{:.1}", rate)
}

/// Result file path for a run.
pub fn result_path(
    out_root: &Path,
    dataset: &str,
    missing_rate: f64,
    model: &str,
    seed: u64,
) -> PathBuf {
    let rate = format_missing_rate(missing_rate);
    out_root.join(dataset).join(&rate).join(format!(
        "{}_{}_{}_{}.json",
        dataset, rate, model, seed
    ))
}

/// Whether a result already exists for these run parameters.
pub fn result_exists(
    out_root: &Path,
    dataset: &str,
    missing_rate: f64,
    model: &str,
    seed: u64,
) -> bool {
    result_path(out_root, dataset, missing_rate, model, seed).is_file()
}

/// Write a result record, creating parent directories as needed.
pub fn write_result(out_root: &Path, record: &ResultRecord) -> Result<PathBuf> {
    let path = result_path(
        out_root,
        &record.dataset,
        record.missing_rate,
        &record.model,
        record.seed,
    );
    if let Some(parent) = path.parent() {
        crate::utils::ensure_dir(parent)?;
    }

    let json = serde_json::to_string(record).context("Failed to serialize result record")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;

    info!("Wrote result to {:?}", path);
    Ok(path)
}

/// Read a result record back.
pub fn read_result(
    out_root: &Path,
    dataset: &str,
    missing_rate: f64,
    model: &str,
    seed: u64,
) -> Result<ResultRecord> {
    let path = result_path(out_root, dataset, missing_rate, model, seed);
    let raw =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> ResultRecord {
        ResultRecord {
            dataset: "Coffee".to_string(),
            missing_rate: 0.3,
            model: "neuralcde".to_string(),
            seed: 42,
            y_true: vec![0, 1, 1],
            y_pred: vec![0, 1, 0],
            logits: vec![vec![0.9, 0.1], vec![0.2, 0.8], vec![0.6, 0.4]],
        }
    }

    #[test]
    fn test_path_is_deterministic() {
        let root = Path::new("/out");
        let path = result_path(root, "Coffee", 0.3, "neuralcde", 42);
        assert_eq!(
            path,
            Path::new("/out/Coffee/0.3/Coffee_0.3_neuralcde_42.json")
        );
        // zero rate formats as 0.0, not 0
        let path = result_path(root, "Coffee", 0.0, "lstm", 7);
        assert_eq!(path, Path::new("/out/Coffee/0.0/Coffee_0.0_lstm_7.json"));
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let rec = record();
        let path = write_result(dir.path(), &rec).unwrap();
        assert!(path.is_file());
        assert!(result_exists(dir.path(), "Coffee", 0.3, "neuralcde", 42));

        let loaded = read_result(dir.path(), "Coffee", 0.3, "neuralcde", 42).unwrap();
        assert_eq!(loaded.y_true, rec.y_true);
        assert_eq!(loaded.y_pred, rec.y_pred);
        assert_eq!(loaded.logits, rec.logits);
    }

    #[test]
    fn test_rerun_overwrites_same_file() {
        let dir = TempDir::new().unwrap();
        let first = write_result(dir.path(), &record()).unwrap();
        let mut changed = record();
        changed.y_pred = vec![1, 1, 1];
        let second = write_result(dir.path(), &changed).unwrap();
        assert_eq!(first, second);

        let loaded = read_result(dir.path(), "Coffee", 0.3, "neuralcde", 42).unwrap();
        assert_eq!(loaded.y_pred, vec![1, 1, 1]);
    }

    #[test]
    fn test_missing_result_errors() {
        let dir = TempDir::new().unwrap();
        assert!(!result_exists(dir.path(), "Coffee", 0.3, "neuralcde", 1));
        assert!(read_result(dir.path(), "Coffee", 0.3, "neuralcde", 1).is_err());
    }
}

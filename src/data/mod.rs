pub mod batch;
pub mod loader;
pub mod preprocessing;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Fixed dataset battery (UCR/UEA archive names)
pub const DATASETS: &[&str] = &[
    "ArrowHead",
    "Car",
    "Coffee",
    "GunPoint",
    "Herring",
    "Lightning2",
    "Lightning7",
    "Meat",
    "OliveOil",
    "Rock",
    "SmoothSubspace",
    "ToeSegmentation1",
    "ToeSegmentation2",
    "Trace",
    "Wine",
    "ArticularyWordRecognition",
    "BasicMotions",
    "CharacterTrajectories",
    "Cricket",
    "Epilepsy",
    "ERing",
    "EthanolConcentration",
    "EyesOpenShut",
    "FingerMovements",
    "Handwriting",
    "JapaneseVowels",
    "Libras",
    "NATOPS",
    "RacketSports",
    "SpokenArabicDigits",
];

/// Default model battery for the sweep
pub const DEFAULT_MODELS: &[&str] = &["neuralcde", "neuralsde_3_00", "neuralsde_3_18"];

/// Raw dataset as loaded from disk, before masking and normalization.
///
/// Values are stored sample-major: index `((i * seq_len) + t) * num_dims + d`.
#[derive(Debug, Clone)]
pub struct RawDataset {
    /// Dataset name
    pub name: String,
    /// Flattened values, `[num_samples, seq_len, num_dims]`
    pub values: Vec<f32>,
    /// Class indices in `0..num_classes`
    pub labels: Vec<i64>,
    /// Number of samples
    pub num_samples: usize,
    /// Sequence length
    pub seq_len: usize,
    /// Number of value channels
    pub num_dims: usize,
    /// Number of distinct classes
    pub num_classes: usize,
}

impl RawDataset {
    /// Value at (sample, timestep, channel)
    pub fn value(&self, sample: usize, t: usize, dim: usize) -> f32 {
        self.values[(sample * self.seq_len + t) * self.num_dims + dim]
    }
}

/// Precomputed train/valid/test index triple over the sample axis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitIndices {
    /// Training sample indices
    pub train: Vec<usize>,
    /// Validation sample indices
    pub valid: Vec<usize>,
    /// Test sample indices
    pub test: Vec<usize>,
}

impl SplitIndices {
    /// Verify the three index sets partition `0..num_samples`.
    pub fn validate(&self, num_samples: usize) -> Result<()> {
        let mut seen = vec![false; num_samples];
        let total = self.train.len() + self.valid.len() + self.test.len();
        if total != num_samples {
            bail!(
                "Split covers {} indices but dataset has {} samples",
                total,
                num_samples
            );
        }
        for &idx in self
            .train
            .iter()
            .chain(self.valid.iter())
            .chain(self.test.iter())
        {
            if idx >= num_samples {
                bail!("Split index {} out of range (n={})", idx, num_samples);
            }
            if seen[idx] {
                bail!("Split index {} appears in more than one set", idx);
            }
            seen[idx] = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_size() {
        assert_eq!(DATASETS.len(), 30);
        assert!(DATASETS.contains(&"Coffee"));
    }

    #[test]
    fn test_split_validate_partition() {
        let split = SplitIndices {
            train: vec![0, 1, 2],
            valid: vec![3],
            test: vec![4],
        };
        split.validate(5).unwrap();
    }

    #[test]
    fn test_split_validate_rejects_overlap() {
        let split = SplitIndices {
            train: vec![0, 1],
            valid: vec![1],
            test: vec![2],
        };
        assert!(split.validate(3).is_err());
    }

    #[test]
    fn test_split_validate_rejects_gap() {
        let split = SplitIndices {
            train: vec![0],
            valid: vec![1],
            test: vec![3],
        };
        assert!(split.validate(4).is_err());
    }

    #[test]
    fn test_raw_dataset_indexing() {
        let ds = RawDataset {
            name: "toy".to_string(),
            values: (0..12).map(|v| v as f32).collect(),
            labels: vec![0, 1],
            num_samples: 2,
            seq_len: 3,
            num_dims: 2,
            num_classes: 2,
        };
        assert_eq!(ds.value(0, 0, 0), 0.0);
        assert_eq!(ds.value(0, 1, 1), 3.0);
        assert_eq!(ds.value(1, 2, 1), 11.0);
    }
}

//! Batch planning and tensor assembly.

use crate::data::preprocessing::PreparedData;
use burn::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// One mini-batch on the target device.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    /// Per-timestep features, `[batch, seq, feature_size]`
    pub features: Tensor<B, 3>,
    /// Interpolation coefficients, `[batch, seq, num_dims]`
    pub coeffs: Tensor<B, 3>,
    /// Class targets, `[batch]`
    pub targets: Tensor<B, 1, Int>,
}

/// Split the sample indices of one split into batch-sized groups.
///
/// Training shuffles with an epoch-varied seed and drops the ragged tail so
/// every gradient step sees a full batch. Evaluation keeps file order and
/// the tail so every sample is scored exactly once.
pub fn batch_plan(
    indices: &[usize],
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: u64,
) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = indices.to_vec();
    if shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        order.shuffle(&mut rng);
    }

    let mut batches: Vec<Vec<usize>> = order
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect();

    if drop_last {
        if let Some(last) = batches.last() {
            if last.len() < batch_size && batches.len() > 1 {
                batches.pop();
            }
        }
    }

    batches
}

/// Assemble the tensors for one batch.
///
/// The feature layout per timestep is `[values, mask, delta, intensity?]`
/// with every block repeated across channels; masked values are zero-filled
/// here, after normalization.
pub fn assemble<B: Backend>(
    data: &PreparedData,
    batch_indices: &[usize],
    device: &B::Device,
) -> Batch<B> {
    let b = batch_indices.len();
    let seq = data.seq_len;
    let dim = data.num_dims;
    let feat = data.feature_size();

    let mut features = vec![0.0f32; b * seq * feat];
    let mut coeffs = vec![0.0f32; b * seq * dim];
    let mut targets = vec![0i64; b];

    for (row, &sample) in batch_indices.iter().enumerate() {
        targets[row] = data.labels[sample];
        for t in 0..seq {
            let base = (row * seq + t) * feat;
            let m = data.mask[sample * seq + t];
            let dl = data.delta[sample * seq + t];

            for d in 0..dim {
                let v = data.values[(sample * seq + t) * dim + d];
                features[base + d] = if v.is_nan() { 0.0 } else { v };
                features[base + dim + d] = m;
                features[base + 2 * dim + d] = dl;
                coeffs[(row * seq + t) * dim + d] = data.coeffs[(sample * seq + t) * dim + d];
            }
            if let Some(intensity) = &data.intensity {
                let iv = intensity[sample * seq + t];
                for d in 0..dim {
                    features[base + 3 * dim + d] = iv;
                }
            }
        }
    }

    Batch {
        features: Tensor::from_data(TensorData::new(features, [b, seq, feat]), device),
        coeffs: Tensor::from_data(TensorData::new(coeffs, [b, seq, dim]), device),
        targets: Tensor::from_data(TensorData::new(targets, [b]), device),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawDataset;
    use crate::model::Interpolation;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn prepared(n: usize) -> PreparedData {
        let seq_len = 6;
        let num_dims = 2;
        let raw = RawDataset {
            name: "toy".to_string(),
            values: (0..n * seq_len * num_dims).map(|v| v as f32).collect(),
            labels: (0..n).map(|i| (i % 3) as i64).collect(),
            num_samples: n,
            seq_len,
            num_dims,
            num_classes: 3,
        };
        crate::data::preprocessing::preprocess(&raw, 0.0, Interpolation::Hermite, false, 0)
    }

    #[test]
    fn test_train_plan_drops_ragged_tail() {
        let indices: Vec<usize> = (0..10).collect();
        let batches = batch_plan(&indices, 4, true, true, 0);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 4));
    }

    #[test]
    fn test_train_plan_keeps_single_short_batch() {
        let indices: Vec<usize> = (0..3).collect();
        let batches = batch_plan(&indices, 16, true, true, 0);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[test]
    fn test_eval_plan_covers_everything_in_order() {
        let indices: Vec<usize> = (0..10).collect();
        let batches = batch_plan(&indices, 4, false, false, 0);
        let flat: Vec<usize> = batches.into_iter().flatten().collect();
        assert_eq!(flat, indices);
    }

    #[test]
    fn test_shuffle_varies_with_seed() {
        let indices: Vec<usize> = (0..64).collect();
        let a = batch_plan(&indices, 16, true, true, 1);
        let b = batch_plan(&indices, 16, true, true, 2);
        let a_again = batch_plan(&indices, 16, true, true, 1);
        assert_eq!(a, a_again);
        assert_ne!(a, b);
    }

    #[test]
    fn test_assemble_shapes() {
        let data = prepared(5);
        let device = Default::default();
        let batch = assemble::<TestBackend>(&data, &[0, 2, 4], &device);

        assert_eq!(batch.features.dims(), [3, 6, 6]);
        assert_eq!(batch.coeffs.dims(), [3, 6, 2]);
        assert_eq!(batch.targets.dims(), [3]);
    }

    #[test]
    fn test_assemble_targets_follow_labels() {
        let data = prepared(5);
        let device = Default::default();
        let batch = assemble::<TestBackend>(&data, &[1, 2], &device);
        let targets = batch.targets.to_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![1, 2]);
    }
}

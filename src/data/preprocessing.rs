//! Missing-rate masking, auxiliary channels, interpolation coefficients,
//! and train-split-only normalization.

use crate::data::RawDataset;
use crate::model::Interpolation;
use anyhow::{bail, Result};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// Preprocessed tensor bundle for one run.
///
/// All arrays are indexed identically along the sample axis. `values` keeps
/// NaN at masked positions until batch assembly zero-fills them; mask and
/// delta are per-timestep (a masked timestep drops every channel at once).
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Normalized values with NaN at masked positions, `[n, seq, dim]`
    pub values: Vec<f32>,
    /// Observation mask per timestep, `[n, seq]` (1.0 observed)
    pub mask: Vec<f32>,
    /// Normalized steps since last observation, `[n, seq]`
    pub delta: Vec<f32>,
    /// Running observed fraction, `[n, seq]`; only for intensity models
    pub intensity: Option<Vec<f32>>,
    /// Interpolation coefficients, `[n, seq, dim]`
    pub coeffs: Vec<f32>,
    /// Class indices
    pub labels: Vec<i64>,
    /// Number of samples
    pub num_samples: usize,
    /// Sequence length
    pub seq_len: usize,
    /// Number of value channels
    pub num_dims: usize,
    /// Number of classes
    pub num_classes: usize,
}

impl PreparedData {
    /// Per-timestep feature width fed to the classifier: value, mask and
    /// delta channels per dim, plus intensity channels when present.
    pub fn feature_size(&self) -> usize {
        let base = 3 * self.num_dims;
        if self.intensity.is_some() {
            base + self.num_dims
        } else {
            base
        }
    }

    fn vidx(&self, sample: usize, t: usize, d: usize) -> usize {
        (sample * self.seq_len + t) * self.num_dims + d
    }

    fn sidx(&self, sample: usize, t: usize) -> usize {
        sample * self.seq_len + t
    }
}

/// Mask timesteps at the given rate and derive the auxiliary channels and
/// interpolation coefficients.
///
/// Masking is Bernoulli per timestep with a run-seeded RNG; a masked
/// timestep removes every channel of that step. Coefficients are finite
/// differences of the scheme-imputed (un-normalized) series, matching the
/// upstream contract that normalization applies to values only.
pub fn preprocess(
    data: &RawDataset,
    missing_rate: f64,
    interpolation: Interpolation,
    use_intensity: bool,
    seed: u64,
) -> PreparedData {
    info!(
        "Preprocessing '{}' (missing_rate={}, interpolation={}, intensity={})",
        data.name,
        missing_rate,
        interpolation.as_str(),
        use_intensity
    );

    let n = data.num_samples;
    let seq = data.seq_len;
    let dim = data.num_dims;

    let mut values = data.values.clone();
    let mut mask = vec![1.0f32; n * seq];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    if missing_rate > 0.0 {
        for i in 0..n {
            for t in 0..seq {
                if rng.gen::<f64>() < missing_rate {
                    mask[i * seq + t] = 0.0;
                    for d in 0..dim {
                        values[(i * seq + t) * dim + d] = f32::NAN;
                    }
                }
            }
        }
    }

    let mut delta = vec![0.0f32; n * seq];
    for i in 0..n {
        let mut gap = 0u32;
        for t in 0..seq {
            delta[i * seq + t] = gap as f32 / seq as f32;
            if mask[i * seq + t] > 0.0 {
                gap = 1;
            } else {
                gap += 1;
            }
        }
    }

    let intensity = use_intensity.then(|| {
        let mut out = vec![0.0f32; n * seq];
        for i in 0..n {
            let mut observed = 0u32;
            for t in 0..seq {
                if mask[i * seq + t] > 0.0 {
                    observed += 1;
                }
                out[i * seq + t] = observed as f32 / (t + 1) as f32;
            }
        }
        out
    });

    let coeffs = interpolation_coeffs(&values, &mask, n, seq, dim, interpolation);

    PreparedData {
        values,
        mask,
        delta,
        intensity,
        coeffs,
        labels: data.labels.clone(),
        num_samples: n,
        seq_len: seq,
        num_dims: dim,
        num_classes: data.num_classes,
    }
}

/// Forward differences of the scheme-imputed series.
fn interpolation_coeffs(
    values: &[f32],
    mask: &[f32],
    n: usize,
    seq: usize,
    dim: usize,
    interpolation: Interpolation,
) -> Vec<f32> {
    let mut coeffs = vec![0.0f32; n * seq * dim];
    let mut imputed = vec![0.0f32; seq];

    for i in 0..n {
        for d in 0..dim {
            let observed: Vec<(usize, f32)> = (0..seq)
                .filter(|&t| mask[i * seq + t] > 0.0)
                .map(|t| (t, values[(i * seq + t) * dim + d]))
                .collect();

            if observed.is_empty() {
                imputed.iter_mut().for_each(|v| *v = 0.0);
            } else {
                match interpolation {
                    // zero-order hold between observations
                    Interpolation::Rectilinear => {
                        let mut current = observed[0].1;
                        for t in 0..seq {
                            if mask[i * seq + t] > 0.0 {
                                current = values[(i * seq + t) * dim + d];
                            }
                            imputed[t] = current;
                        }
                    }
                    // piecewise-linear through observed anchors, flat ends
                    _ => {
                        let mut anchor = 0;
                        for t in 0..seq {
                            while anchor + 1 < observed.len() && observed[anchor + 1].0 <= t {
                                anchor += 1;
                            }
                            let (t0, v0) = observed[anchor];
                            imputed[t] = if t <= t0 || anchor + 1 >= observed.len() {
                                v0
                            } else {
                                let (t1, v1) = observed[anchor + 1];
                                let frac = (t - t0) as f32 / (t1 - t0) as f32;
                                v0 + (v1 - v0) * frac
                            };
                        }
                    }
                }
            }

            for t in 0..seq {
                coeffs[(i * seq + t) * dim + d] = if t + 1 < seq {
                    imputed[t + 1] - imputed[t]
                } else {
                    0.0
                };
            }
        }
    }

    coeffs
}

/// Per-channel normalization statistics computed from the training split.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Mean of observed training values per channel
    pub means: Vec<f32>,
    /// Standard deviation of observed training values per channel
    pub stds: Vec<f32>,
}

impl Normalizer {
    /// Fit statistics on the non-missing values of the training split only.
    pub fn fit(data: &PreparedData, train_idx: &[usize]) -> Self {
        let dim = data.num_dims;
        let mut sums = vec![0.0f64; dim];
        let mut counts = vec![0usize; dim];

        for &i in train_idx {
            for t in 0..data.seq_len {
                for d in 0..dim {
                    let v = data.values[data.vidx(i, t, d)];
                    if !v.is_nan() {
                        sums[d] += v as f64;
                        counts[d] += 1;
                    }
                }
            }
        }

        let means: Vec<f32> = (0..dim)
            .map(|d| {
                if counts[d] > 0 {
                    (sums[d] / counts[d] as f64) as f32
                } else {
                    0.0
                }
            })
            .collect();

        let mut sq_sums = vec![0.0f64; dim];
        for &i in train_idx {
            for t in 0..data.seq_len {
                for d in 0..dim {
                    let v = data.values[data.vidx(i, t, d)];
                    if !v.is_nan() {
                        let diff = v as f64 - means[d] as f64;
                        sq_sums[d] += diff * diff;
                    }
                }
            }
        }

        let stds: Vec<f32> = (0..dim)
            .map(|d| {
                if counts[d] > 1 {
                    (sq_sums[d] / (counts[d] - 1) as f64).sqrt() as f32
                } else {
                    1.0
                }
            })
            .collect();

        debug!("Fitted normalizer on {} training samples", train_idx.len());
        Self { means, stds }
    }

    /// Apply `(x - mean) / (std + 1e-5)` to every split with the training
    /// statistics. NaN positions stay NaN.
    pub fn apply(&self, data: &mut PreparedData) {
        let dim = data.num_dims;
        for chunk in data.values.chunks_mut(dim) {
            for (d, v) in chunk.iter_mut().enumerate() {
                if !v.is_nan() {
                    *v = (*v - self.means[d]) / (self.stds[d] + 1e-5);
                }
            }
        }
    }
}

/// Smallest power of two in `[16, 128]` with `batch_size > num_samples / 16`.
///
/// Datasets too large for any candidate are rejected rather than silently
/// accepted with an unbound batch size.
pub fn batch_size_for(num_samples: usize) -> Result<usize> {
    for exp in 4..8u32 {
        let batch_size = 1usize << exp;
        if batch_size as f64 > num_samples as f64 / 16.0 {
            return Ok(batch_size);
        }
    }
    bail!(
        "No batch size in [16, 128] satisfies batch_size > {}/16",
        num_samples
    )
}

/// Learning rate from the hyperparameter record, defaulting to the
/// batch-size rule `1e-3 * batch_size / 16` when unspecified.
pub fn resolve_learning_rate(lr: Option<f64>, batch_size: usize) -> f64 {
    lr.unwrap_or(1e-3 * batch_size as f64 / 16.0)
}

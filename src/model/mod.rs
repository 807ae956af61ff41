//! Model policy tables and architecture configuration.
//!
//! The harness trains many named model variants that share one classifier
//! skeleton; what differs per name is the interpolation scheme fed to the
//! coefficient channel, whether an intensity channel is added, whether an
//! auxiliary loss term applies, and how the configured layer count maps
//! onto the network.

pub mod architecture;
pub mod checkpoint;
pub mod metrics;

use crate::config::HyperParams;
use crate::data::preprocessing::PreparedData;
use burn::prelude::*;

/// Interpolation scheme used to build the coefficient channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Natural,
    Linear,
    Rectilinear,
    Cubic,
    Hermite,
}

impl Interpolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolation::Natural => "natural",
            Interpolation::Linear => "linear",
            Interpolation::Rectilinear => "rectilinear",
            Interpolation::Cubic => "cubic",
            Interpolation::Hermite => "hermite",
        }
    }
}

/// Interpolation scheme for a model name.
pub fn interpolation(model: &str) -> Interpolation {
    match model {
        "gru-dt" | "gru-d" | "gru-ode" | "ode-rnn" | "neuralcde" | "neuralrde-1"
        | "neuralrde-2" | "neuralrde-3" | "ancde" | "exit" | "leap" => Interpolation::Natural,
        "neuralcde-l" => Interpolation::Linear,
        "neuralcde-r" => Interpolation::Rectilinear,
        "neuralcde-c" => Interpolation::Cubic,
        _ => Interpolation::Hermite,
    }
}

/// Whether the model consumes an observation-intensity channel.
pub fn use_intensity(model: &str) -> bool {
    matches!(model, "gru-dt" | "gru-d" | "ode-rnn")
}

/// Whether the model adds an auxiliary loss term during training.
/// Exactly these two names; latentsde variants do not qualify.
pub fn has_aux_loss(model: &str) -> bool {
    matches!(model, "latentsde" | "leap")
}

/// Map the configured layer count onto (num_layers, num_hidden_layers).
///
/// Sequence baselines stack the configured count directly; attention
/// variants ignore it; the continuous-time families keep one recurrent
/// layer and use the count for the vector-field depth.
pub fn layer_plan(model: &str, configured_layers: usize) -> (usize, usize) {
    match model {
        "cnn" | "cnn-3" | "cnn-5" | "cnn-7" | "rnn" | "lstm" | "gru" | "gru-simple" | "grud"
        | "bilstm" | "tlstm" | "plstm" | "tglstm" | "transformer" => (configured_layers, 0),
        "sand" | "mtan" | "miam" => (1, 0),
        _ => (1, configured_layers),
    }
}

/// Architecture configuration derived from policy, data shape, and the
/// hyperparameter record.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Per-timestep feature width
    pub input_size: usize,
    /// Coefficient channel width
    pub coeff_size: usize,
    /// Hidden dimension
    pub hidden_dim: usize,
    /// Recurrent/stacked layer count
    pub num_layers: usize,
    /// Hidden-layer count of the vector field
    pub num_hidden_layers: usize,
    /// Number of output classes
    pub num_classes: usize,
    /// Dropout probability
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Add the auxiliary loss head
    #[config(default = false)]
    pub aux_loss: bool,
}

impl ModelConfig {
    /// Build the configuration for a named model on the prepared data.
    pub fn for_run(model: &str, data: &PreparedData, params: &HyperParams) -> Self {
        let (num_layers, num_hidden_layers) = layer_plan(model, params.num_layers);
        Self::new(
            data.feature_size(),
            data.num_dims,
            params.hidden_dim,
            num_layers,
            num_hidden_layers,
            data.num_classes,
        )
        .with_aux_loss(has_aux_loss(model))
    }
}

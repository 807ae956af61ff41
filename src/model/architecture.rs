//! Shared classifier skeleton over irregularly-sampled sequences.

use crate::model::ModelConfig;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Sequence classifier over per-timestep features and interpolation
/// coefficients.
///
/// The two channels are concatenated, projected into the hidden space, run
/// through the hidden stack with ReLU and dropout, mean-pooled over time,
/// and mapped to class logits.
#[derive(Module, Debug)]
pub struct SeqClassifier<B: Backend> {
    input_proj: Linear<B>,
    hidden: Vec<Linear<B>>,
    head: Linear<B>,
    dropout: Dropout,
    activation: Relu,
    aux_loss: bool,
}

impl<B: Backend> SeqClassifier<B> {
    /// Class logits, `[batch, num_classes]`.
    pub fn forward(&self, features: Tensor<B, 3>, coeffs: Tensor<B, 3>) -> Tensor<B, 2> {
        self.forward_with_aux(features, coeffs).0
    }

    /// Logits plus the auxiliary regularization term when the model family
    /// carries one.
    pub fn forward_with_aux(
        &self,
        features: Tensor<B, 3>,
        coeffs: Tensor<B, 3>,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 1>>) {
        let x = Tensor::cat(vec![features, coeffs], 2);
        let mut x = self.activation.forward(self.input_proj.forward(x));
        x = self.dropout.forward(x);

        for layer in &self.hidden {
            x = self.activation.forward(layer.forward(x));
            x = self.dropout.forward(x);
        }

        let aux = self
            .aux_loss
            .then(|| x.clone().powf_scalar(2.0).mean() * 1e-2);

        let pooled: Tensor<B, 2> = x.mean_dim(1).squeeze(1);
        (self.head.forward(pooled), aux)
    }
}

/// Initialize the classifier for a configuration on the given device.
pub fn init_model<B: Backend>(config: &ModelConfig, device: &B::Device) -> SeqClassifier<B> {
    let input_size = config.input_size + config.coeff_size;
    // num_layers >= 1 is enforced at record load; saturate so a direct
    // zero-layer config degrades to projection + head instead of panicking
    let hidden_count = (config.num_layers + config.num_hidden_layers).saturating_sub(1);

    SeqClassifier {
        input_proj: LinearConfig::new(input_size, config.hidden_dim).init(device),
        hidden: (0..hidden_count)
            .map(|_| LinearConfig::new(config.hidden_dim, config.hidden_dim).init(device))
            .collect(),
        head: LinearConfig::new(config.hidden_dim, config.num_classes).init(device),
        dropout: DropoutConfig::new(config.dropout).init(),
        activation: Relu::new(),
        aux_loss: config.aux_loss,
    }
}

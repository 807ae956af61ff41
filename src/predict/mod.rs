//! Test-split evaluation: hard predictions, logits, and metrics.

use crate::data::batch::{assemble, batch_plan};
use crate::data::preprocessing::PreparedData;
use crate::model::architecture::SeqClassifier;
use crate::model::metrics::{accuracy, weighted_f1};
use anyhow::{anyhow, Result};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use burn::tensor::ElementConversion;
use tracing::info;

/// Evaluation output for one split.
#[derive(Debug, Clone)]
pub struct EvalOutput {
    /// True class indices, in split order
    pub y_true: Vec<i64>,
    /// Predicted class indices, in split order
    pub y_pred: Vec<i64>,
    /// Raw per-class logits, one row per sample
    pub logits: Vec<Vec<f32>>,
    /// Mean per-sample loss, auxiliary term included
    pub loss: f64,
    /// Exact-match accuracy
    pub accuracy: f64,
    /// Support-weighted F1
    pub weighted_f1: f64,
}

/// Scores a trained classifier over a sample-index split.
pub struct Evaluator<B: Backend> {
    device: B::Device,
    batch_size: usize,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(device: B::Device, batch_size: usize) -> Self {
        Self { device, batch_size }
    }

    /// Evaluate in file order, covering every index exactly once.
    ///
    /// Predictions are the argmax over logits; the auxiliary term only
    /// affects the reported loss, never the predictions or metrics.
    pub fn evaluate(
        &self,
        model: &SeqClassifier<B>,
        data: &PreparedData,
        indices: &[usize],
    ) -> Result<EvalOutput> {
        let plan = batch_plan(indices, self.batch_size, false, false, 0);
        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);

        let mut y_true = Vec::with_capacity(indices.len());
        let mut y_pred = Vec::with_capacity(indices.len());
        let mut all_logits = Vec::with_capacity(indices.len());
        let mut loss_sum = 0.0;

        for batch_indices in &plan {
            let batch = assemble::<B>(data, batch_indices, &self.device);
            let (logits, aux) = model.forward_with_aux(batch.features, batch.coeffs);

            let mut loss = loss_fn.forward(logits.clone(), batch.targets);
            if let Some(aux) = aux {
                loss = loss + aux;
            }
            loss_sum += loss.into_scalar().elem::<f64>() * batch_indices.len() as f64;

            let preds: Tensor<B, 1, Int> = logits.clone().argmax(1).squeeze(1);
            let preds = preds
                .to_data()
                .convert::<i64>()
                .to_vec::<i64>()
                .map_err(|e| anyhow!("Failed to read predictions: {e:?}"))?;
            let logit_rows = logits
                .to_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow!("Failed to read logits: {e:?}"))?;

            y_pred.extend(preds);
            for row in logit_rows.chunks(data.num_classes) {
                all_logits.push(row.to_vec());
            }
            y_true.extend(batch_indices.iter().map(|&i| data.labels[i]));
        }

        let loss = if y_true.is_empty() {
            0.0
        } else {
            loss_sum / y_true.len() as f64
        };
        let output = EvalOutput {
            accuracy: accuracy(&y_true, &y_pred),
            weighted_f1: weighted_f1(&y_true, &y_pred),
            loss,
            y_true,
            y_pred,
            logits: all_logits,
        };

        info!(
            "Evaluated {} samples: accuracy={:.4} weighted_f1={:.4} loss={:.6}",
            output.y_true.len(),
            output.accuracy,
            output.weighted_f1,
            output.loss
        );
        Ok(output)
    }
}

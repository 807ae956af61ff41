//! Run orchestration: single runs and the Cartesian sweep.

use crate::config::{load_hyperparams, load_split};
use crate::data::loader::SeriesLoader;
use crate::data::preprocessing::{
    batch_size_for, preprocess, resolve_learning_rate, Normalizer,
};
use crate::model::architecture::init_model;
use crate::model::checkpoint::CheckpointManager;
use crate::model::{interpolation, use_intensity, ModelConfig};
use crate::predict::Evaluator;
use crate::results::{result_exists, write_result, ResultRecord};
use crate::training::trainer::{RunTag, Trainer};
use crate::training::TrainingConfig;
use anyhow::{Context, Result};
use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;
use tracing::info;

/// Filesystem roots for one invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_root: PathBuf,
    pub config_root: PathBuf,
    pub out_root: PathBuf,
}

/// Parameters of a single run.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub dataset: String,
    pub missing_rate: f64,
    pub model: String,
    pub epochs: usize,
    pub seed: u64,
    /// Skip the run when its result file already exists
    pub skip_existing: bool,
    /// Root for best-model checkpoints; `None` keeps snapshots in memory
    pub checkpoint_dir: Option<PathBuf>,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub dataset: String,
    pub missing_rate: f64,
    pub model: String,
    pub seed: u64,
    pub accuracy: f64,
    pub weighted_f1: f64,
    pub test_loss: f64,
    pub epochs_trained: usize,
    pub duration_secs: f64,
    pub result_path: PathBuf,
}

/// Execute one run end to end.
///
/// Returns `Ok(None)` when the run was skipped because its result already
/// exists. Missing hyperparameter or split files are hard errors, as is a
/// dataset too large for the batch-size rule.
pub fn run_once<B: AutodiffBackend>(
    paths: &Paths,
    spec: &RunSpec,
    device: &B::Device,
) -> Result<Option<RunSummary>> {
    if spec.skip_existing
        && result_exists(
            &paths.out_root,
            &spec.dataset,
            spec.missing_rate,
            &spec.model,
            spec.seed,
        )
    {
        info!(
            "Skipping {}/{}/{} seed {}: result exists",
            spec.dataset, spec.missing_rate, spec.model, spec.seed
        );
        return Ok(None);
    }

    B::seed(spec.seed);

    let params = load_hyperparams(&paths.config_root, &spec.dataset, &spec.model)?;
    let raw = SeriesLoader::new().load(&paths.data_root, &spec.dataset)?;

    let batch_size = batch_size_for(raw.num_samples)
        .with_context(|| format!("Dataset '{}'", spec.dataset))?;
    let learning_rate = resolve_learning_rate(params.lr, batch_size);

    let split = load_split(&paths.config_root, &spec.dataset, spec.seed)?;
    split
        .validate(raw.num_samples)
        .with_context(|| format!("Split for '{}' seed {}", spec.dataset, spec.seed))?;

    let mut data = preprocess(
        &raw,
        spec.missing_rate,
        interpolation(&spec.model),
        use_intensity(&spec.model),
        spec.seed,
    );
    Normalizer::fit(&data, &split.train).apply(&mut data);

    let model_config = ModelConfig::for_run(&spec.model, &data, &params);
    let model = init_model::<B>(&model_config, device);

    let training_config =
        TrainingConfig::for_run(spec.epochs, batch_size, learning_rate, spec.seed);
    let tag = RunTag {
        dataset: spec.dataset.clone(),
        missing_rate: spec.missing_rate,
        model: spec.model.clone(),
    };
    let mut trainer = Trainer::<B>::new(training_config, device.clone(), tag);
    if let Some(root) = &spec.checkpoint_dir {
        let dir = root.join(format!(
            "{}_{}_{}_{}",
            spec.dataset,
            crate::results::format_missing_rate(spec.missing_rate),
            spec.model,
            spec.seed
        ));
        trainer = trainer.with_checkpointing(CheckpointManager::new(dir)?);
    }

    let (model, training) = trainer.train(model, &model_config, &data, &split)?;

    let eval = Evaluator::<B::InnerBackend>::new(device.clone(), batch_size).evaluate(
        &model.valid(),
        &data,
        &split.test,
    )?;
    info!(
        "{} on '{}' rate {} seed {}: accuracy={:.4} weighted_f1={:.4}",
        spec.model, spec.dataset, spec.missing_rate, spec.seed, eval.accuracy, eval.weighted_f1
    );

    let record = ResultRecord {
        dataset: spec.dataset.clone(),
        missing_rate: spec.missing_rate,
        model: spec.model.clone(),
        seed: spec.seed,
        y_true: eval.y_true,
        y_pred: eval.y_pred,
        logits: eval.logits,
    };
    let path = write_result(&paths.out_root, &record)?;

    Ok(Some(RunSummary {
        dataset: spec.dataset.clone(),
        missing_rate: spec.missing_rate,
        model: spec.model.clone(),
        seed: spec.seed,
        accuracy: eval.accuracy,
        weighted_f1: eval.weighted_f1,
        test_loss: eval.loss,
        epochs_trained: training.state.epoch,
        duration_secs: training.duration_secs,
        result_path: path,
    }))
}

/// Cartesian sweep over datasets, missing rates, models, and repeats.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub datasets: Vec<String>,
    pub missing_rates: Vec<f64>,
    pub models: Vec<String>,
    pub repeats: u64,
    pub epochs: usize,
    pub base_seed: u64,
    pub skip_existing: bool,
    pub checkpoint_dir: Option<PathBuf>,
}

/// Run the full sweep. Any failing run aborts the whole sweep; there is
/// no per-run isolation, so a misconfigured config root surfaces on the
/// first run that touches it.
pub fn run_sweep<B: AutodiffBackend>(
    paths: &Paths,
    sweep: &SweepConfig,
    device: &B::Device,
) -> Result<Vec<RunSummary>> {
    let total =
        sweep.datasets.len() * sweep.missing_rates.len() * sweep.models.len() * sweep.repeats as usize;
    info!("Starting sweep: {} runs", total);

    let mut summaries = Vec::new();
    let mut skipped = 0usize;

    for dataset in &sweep.datasets {
        for &missing_rate in &sweep.missing_rates {
            for model in &sweep.models {
                for repeat in 0..sweep.repeats {
                    let spec = RunSpec {
                        dataset: dataset.clone(),
                        missing_rate,
                        model: model.clone(),
                        epochs: sweep.epochs,
                        seed: sweep.base_seed + repeat,
                        skip_existing: sweep.skip_existing,
                        checkpoint_dir: sweep.checkpoint_dir.clone(),
                    };
                    let outcome = run_once::<B>(paths, &spec, device).with_context(|| {
                        format!(
                            "Run {}/{}/{} seed {}",
                            spec.dataset, spec.missing_rate, spec.model, spec.seed
                        )
                    })?;
                    match outcome {
                        Some(summary) => summaries.push(summary),
                        None => skipped += 1,
                    }
                }
            }
        }
    }

    info!(
        "Sweep finished: {} completed, {} skipped",
        summaries.len(),
        skipped
    );
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{write_hyperparams, write_split, HyperParams};
    use crate::data::SplitIndices;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use std::fmt::Write as _;
    use std::fs;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn seed_workspace(root: &std::path::Path) -> Paths {
        let paths = Paths {
            data_root: root.join("data"),
            config_root: root.join("config"),
            out_root: root.join("out"),
        };
        fs::create_dir_all(&paths.data_root).unwrap();

        // 64 samples, seq_len 8, two separable classes
        let mut tsv = String::new();
        for i in 0..64 {
            let label = i % 2;
            let base = if label == 0 { 0.0 } else { 4.0 };
            write!(tsv, "{}", label).unwrap();
            for t in 0..8 {
                write!(tsv, "\t{:.2}", base + t as f32 * 0.1).unwrap();
            }
            tsv.push('\n');
        }
        fs::write(paths.data_root.join("Coffee.tsv"), tsv).unwrap();

        write_hyperparams(
            &paths.config_root,
            "Coffee",
            "neuralcde",
            &HyperParams {
                hidden_dim: 8,
                num_layers: 1,
                lr: Some(1e-2),
            },
        )
        .unwrap();
        write_split(
            &paths.config_root,
            "Coffee",
            42,
            &SplitIndices {
                train: (0..44).collect(),
                valid: (44..54).collect(),
                test: (54..64).collect(),
            },
        )
        .unwrap();

        paths
    }

    fn spec() -> RunSpec {
        RunSpec {
            dataset: "Coffee".to_string(),
            missing_rate: 0.0,
            model: "neuralcde".to_string(),
            epochs: 5,
            seed: 42,
            skip_existing: false,
            checkpoint_dir: None,
        }
    }

    #[test]
    fn test_run_once_end_to_end() {
        let dir = TempDir::new().unwrap();
        let paths = seed_workspace(dir.path());
        let device = Default::default();

        let summary = run_once::<TestBackend>(&paths, &spec(), &device)
            .unwrap()
            .unwrap();

        assert_eq!(summary.epochs_trained, 5);
        assert!(summary.result_path.is_file());
        assert_eq!(
            summary.result_path,
            paths
                .out_root
                .join("Coffee/0.0/Coffee_0.0_neuralcde_42.json")
        );

        let record =
            crate::results::read_result(&paths.out_root, "Coffee", 0.0, "neuralcde", 42).unwrap();
        assert_eq!(record.y_true.len(), 10);
        assert_eq!(record.y_pred.len(), 10);
        assert_eq!(record.logits.len(), 10);
    }

    #[test]
    fn test_run_once_skips_existing() {
        let dir = TempDir::new().unwrap();
        let paths = seed_workspace(dir.path());
        let device = Default::default();

        let mut spec = spec();
        spec.skip_existing = true;

        assert!(run_once::<TestBackend>(&paths, &spec, &device)
            .unwrap()
            .is_some());
        assert!(run_once::<TestBackend>(&paths, &spec, &device)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_run_once_missing_params_is_hard_error() {
        let dir = TempDir::new().unwrap();
        let paths = seed_workspace(dir.path());
        let device = Default::default();

        let mut spec = spec();
        spec.model = "lstm".to_string();
        assert!(run_once::<TestBackend>(&paths, &spec, &device).is_err());
    }

    #[test]
    fn test_sweep_aborts_on_missing_config() {
        let dir = TempDir::new().unwrap();
        let paths = seed_workspace(dir.path());
        let device = Default::default();

        // second dataset has neither a series file nor config artifacts
        let sweep = SweepConfig {
            datasets: vec!["Coffee".to_string(), "Absent".to_string()],
            missing_rates: vec![0.0],
            models: vec!["neuralcde".to_string()],
            repeats: 1,
            epochs: 1,
            base_seed: 42,
            skip_existing: false,
            checkpoint_dir: None,
        };
        assert!(run_sweep::<TestBackend>(&paths, &sweep, &device).is_err());
    }

    #[test]
    fn test_sweep_completes_when_all_runs_resolve() {
        let dir = TempDir::new().unwrap();
        let paths = seed_workspace(dir.path());
        let device = Default::default();

        let sweep = SweepConfig {
            datasets: vec!["Coffee".to_string()],
            missing_rates: vec![0.0],
            models: vec!["neuralcde".to_string()],
            repeats: 1,
            epochs: 1,
            base_seed: 42,
            skip_existing: false,
            checkpoint_dir: None,
        };
        let summaries = run_sweep::<TestBackend>(&paths, &sweep, &device).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].dataset, "Coffee");
    }
}

use anyhow::Result;
use ists_bench::cli::{parse_args, setup_logging, Commands, RunArgs, SweepArgs};
use ists_bench::data::{DATASETS, DEFAULT_MODELS};
use ists_bench::runner::{run_once, run_sweep, Paths, RunSpec, SweepConfig};
use ists_bench::TrainBackend;
use tracing::{error, info};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", ists_bench::info());

    let result = match cli.command {
        Commands::Run(args) => do_run(args),
        Commands::Sweep(args) => do_sweep(args),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn do_run(args: RunArgs) -> Result<()> {
    // Device selection has to happen before any backend initialization.
    ists_bench::utils::configure_device_env(&args.device);

    let paths = Paths {
        data_root: args.data_root,
        config_root: args.config_root,
        out_root: args.out_root,
    };
    let spec = RunSpec {
        dataset: args.dataset,
        missing_rate: args.missing_rate,
        model: args.model,
        epochs: args.epochs,
        seed: args.seed,
        skip_existing: args.skip_existing,
        checkpoint_dir: args.checkpoint_dir,
    };

    let device = Default::default();
    match run_once::<TrainBackend>(&paths, &spec, &device)? {
        Some(summary) => {
            info!("=== Run Results ===");
            info!("Epochs trained: {}", summary.epochs_trained);
            info!("Accuracy: {:.4}", summary.accuracy);
            info!("Weighted F1: {:.4}", summary.weighted_f1);
            info!("Test loss: {:.6}", summary.test_loss);
            info!("Result written to: {:?}", summary.result_path);
        }
        None => info!("Run skipped, result already exists"),
    }

    Ok(())
}

fn do_sweep(args: SweepArgs) -> Result<()> {
    ists_bench::utils::configure_device_env(&args.device);

    let paths = Paths {
        data_root: args.data_root,
        config_root: args.config_root,
        out_root: args.out_root,
    };
    let datasets = if args.datasets.is_empty() {
        DATASETS.iter().map(|s| s.to_string()).collect()
    } else {
        args.datasets
    };
    let models = if args.models.is_empty() {
        DEFAULT_MODELS.iter().map(|s| s.to_string()).collect()
    } else {
        args.models
    };

    let sweep = SweepConfig {
        datasets,
        missing_rates: args.missing_rates,
        models,
        repeats: args.repeats,
        epochs: args.epochs,
        base_seed: args.base_seed,
        skip_existing: args.skip_existing,
        checkpoint_dir: args.checkpoint_dir,
    };

    let device = Default::default();
    let summaries = run_sweep::<TrainBackend>(&paths, &sweep, &device)?;

    info!("=== Sweep Results ===");
    for summary in &summaries {
        info!(
            "{} {} {} seed {}: accuracy={:.4} weighted_f1={:.4}",
            summary.dataset,
            summary.missing_rate,
            summary.model,
            summary.seed,
            summary.accuracy,
            summary.weighted_f1
        );
    }

    Ok(())
}

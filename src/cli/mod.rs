use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Benchmark harness for classifiers of irregularly-sampled time series
#[derive(Parser, Debug)]
#[command(name = "ists-bench")]
#[command(about = "Benchmark harness for irregular time-series classification")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a single (dataset, rate, model, seed) run
    Run(RunArgs),

    /// Execute the Cartesian sweep over datasets, rates, models and repeats
    Sweep(SweepArgs),
}

/// Single-run arguments
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Dataset name
    #[arg(short, long, required = true)]
    pub dataset: String,

    /// Model name
    #[arg(short, long, required = true)]
    pub model: String,

    /// Fraction of timesteps to drop
    #[arg(long, default_value = "0.0")]
    pub missing_rate: f64,

    /// Directory holding the series files
    #[arg(long, default_value = "./data")]
    pub data_root: PathBuf,

    /// Directory holding params/ and split/
    #[arg(long, default_value = "./config")]
    pub config_root: PathBuf,

    /// Directory for result files
    #[arg(short, long, default_value = "./out")]
    pub out_root: PathBuf,

    /// Number of training epochs
    #[arg(short, long, default_value = "100")]
    pub epochs: usize,

    /// Run seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Skip the run if its result file already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Directory for best-model checkpoints
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Visible accelerator device
    #[arg(long, default_value = "0")]
    pub device: String,
}

/// Sweep arguments
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// Datasets to sweep (defaults to the full battery)
    #[arg(long, num_args = 1..)]
    pub datasets: Vec<String>,

    /// Models to sweep (defaults to the standard battery)
    #[arg(long, num_args = 1..)]
    pub models: Vec<String>,

    /// Missing rates to sweep
    #[arg(long, num_args = 1.., default_values_t = [0.0])]
    pub missing_rates: Vec<f64>,

    /// Directory holding the series files
    #[arg(long, default_value = "./data")]
    pub data_root: PathBuf,

    /// Directory holding params/ and split/
    #[arg(long, default_value = "./config")]
    pub config_root: PathBuf,

    /// Directory for result files
    #[arg(short, long, default_value = "./out")]
    pub out_root: PathBuf,

    /// Number of training epochs per run
    #[arg(short, long, default_value = "100")]
    pub epochs: usize,

    /// Repeats per combination; run seeds are base_seed..base_seed+repeats
    #[arg(short, long, default_value = "5")]
    pub repeats: u64,

    /// First run seed
    #[arg(long, default_value = "42")]
    pub base_seed: u64,

    /// Skip runs whose result files already exist
    #[arg(long)]
    pub skip_existing: bool,

    /// Directory for best-model checkpoints
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Visible accelerator device
    #[arg(long, default_value = "0")]
    pub device: String,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

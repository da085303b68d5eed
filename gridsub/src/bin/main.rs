use std::error::Error;
use std::path::PathBuf;
use clap::Parser;
use env_logger::Env;
use log::info;
use gridsub::{jobs_for, read_datasets, GridConfig, Submitter};

/// Submit one ntuple-production job per (dataset, run era) to the grid
#[derive(Parser, Debug)]
struct Args {
    /// File listing one dataset per line
    datasets: PathBuf,

    /// TOML file overriding the built-in job settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the job configuration files without submitting them
    #[arg(short, long)]
    dry_run: bool,

    /// Directory for the job configuration files
    #[arg(short, long, default_value = "crab_configs")]
    workdir: PathBuf,

    /// Grid client executable
    #[arg(long, default_value = "crab")]
    client: String,

    /// 0: info, 1: debug, 2 or more: trace
    #[arg(short, long, num_args = 0..=1, default_value = "0", default_missing_value = "1")]
    verbosity: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let level = match args.verbosity { 0 => "info", 1 => "debug", _ => "trace" };
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", level));

    let config = match &args.config {
        Some(path) => GridConfig::read(path)?,
        None       => GridConfig::default(),
    };
    let datasets = read_datasets(&args.datasets)?;
    let jobs = jobs_for(&datasets, &config);
    info!("{} datasets, {} jobs", datasets.len(), jobs.len());

    let submitter = Submitter { workdir: args.workdir, client: args.client, dry_run: args.dry_run };
    let summary = submitter.submit_all(&jobs, &config);
    info!("{} submitted, {} failed", summary.submitted.len(), summary.failed.len());
    if summary.ok() { Ok(()) }
    else            { Err(format!("{} submissions failed", summary.failed.len()).into()) }
}

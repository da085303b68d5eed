use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::info;

use trigstat::config::{Config, read_config_file};

#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "parse_config", about = "Validate a study configuration and print what was understood")]
struct Cli {
    /// Configuration file; the built-in study if absent
    config_file: Option<PathBuf>,

    /// Print as TOML rather than as a Rust debug dump
    #[clap(short, long)]
    toml: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));
    let args = Cli::parse();

    let config = match &args.config_file {
        Some(path) => read_config_file(path)?,
        None       => Config::builtin()?,
    };
    info!("{} rate samples, {} efficiency, {} resolution and {} response definitions",
          config.rate_samples().len(), config.efficiency.len(), config.resolution.len(), config.response.len());

    if args.toml { println!("{}", toml::to_string_pretty(&config)?) }
    else         { println!("{config:#?}") }

    Ok(())
}

mod cli;
mod progress;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", args.log_level()));

    let config = match &args.config {
        Some(path) => read_config_file(path)?,
        None       => Config::builtin()?,
    };
    let exts = dedup_extensions(&args.exts);
    let layout = InputLayout::new(&args.input, &config.input);
    let pipeline = Pipeline {
        config: &config,
        layout: &layout,
        output: &args.output,
        exts: &exts,
        dry_run: args.dry_run,
        plots: !args.no_plots,
        min_counts: args.min_counts_for_valid_rate,
    };
    let mut timer = Progress::new();

    for reco in &config.reco_keys {
        println!("{}\n{reco}\n{}", "=".repeat(110), "=".repeat(110));
        let mut console = Console { reco, bar: None };
        let summary = pipeline.run_reco(reco, &mut console, &mut timer)?;
        info!("{reco}: {} artifacts", group_digits(summary.written.len()));
    }
    info!("Finished in {} ms", group_digits(timer.total().as_millis()));
    Ok(())
}

/// Progress bar while samples are read, rate tables once they are complete
struct Console<'a> {
    reco: &'a str,
    bar: Option<progress::Progress>,
}

impl Observer for Console<'_> {
    fn scenario_started(&mut self, scenario: &str, n_samples: usize) {
        self.bar = progress::Progress::new(n_samples, self.reco, scenario)
            .map_err(|e| warn!("no progress bar: {e}"))
            .ok();
    }

    fn sample(&mut self, process: &str) {
        if let Some(bar) = &self.bar { bar.sample(process) }
    }

    fn scenario_done(&mut self, rates: &ScenarioRates, tables: &[RateTable]) {
        if let Some(bar) = self.bar.take() { bar.finish() }
        println!("{}", rates.scenario);
        for table in tables {
            println!("{}", "-".repeat(110));
            for line in table.lines() {
                println!("{line}");
            }
        }
        println!("{}", "-".repeat(110));
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::error::Error;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use trigstat::{
    config::{Config, read_config_file},
    io::InputLayout,
    pipeline::{Observer, Pipeline},
    rate::ScenarioRates,
    report::RateTable,
    utils::{dedup_extensions, group_digits, timing::Progress},
};
use cli::Cli;

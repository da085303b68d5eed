/// Command line interface for `plot_tdr` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "plot_tdr",
    about = "Trigger rates, efficiencies and resolutions for the HLT design study",
)]
pub (super) struct Cli {
    /// Directory with one subdirectory of histogram files per reconstruction
    #[clap(short, long)]
    pub input: PathBuf,

    /// Artifacts are written to <OUTPUT>/<reconstruction>/
    #[clap(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Artifact formats, by file extension
    #[clap(short, long, num_args = 1.., default_value = "json")]
    pub exts: Vec<String>,

    /// Log what would be written, but write nothing
    #[clap(short, long)]
    pub dry_run: bool,

    /// 0: info, 1: debug, 2 or more: trace. RUST_LOG takes precedence
    #[clap(short, long, num_args = 0..=1, default_value = "0", default_missing_value = "1")]
    pub verbosity: u8,

    /// Rates resting on fewer counts are shown as -99
    #[clap(long, default_value = "-1", allow_negative_numbers = true)]
    pub min_counts_for_valid_rate: f64,

    /// Print the rate tables only
    #[clap(long)]
    pub no_plots: bool,

    /// Study configuration (TOML); the built-in design study if absent
    #[clap(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub (super) fn log_level(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::PathBuf;

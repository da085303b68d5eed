//! Study configuration: which samples to read, how to weight them, and which
//! rates, efficiencies and resolutions to derive from them.

pub mod binning;
pub mod definitions;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::axis::Edges;
use crate::error::{Error, Result};
use crate::types::{CrossSection, Luminosity, Rate};

pub use binning::{Binning, Uniform};
pub use definitions::{EfficiencyDefinition, ResolutionDefinition, ResolutionKind, ResponseDefinition, Source};

/// The study shipped with the crate: Phase-2 HLT TDR jet, HT and MET triggers
const BUILTIN: &str = include_str!("../tdr.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Reconstruction configurations: subdirectories of the input directory
    #[serde(default = "default_reco_keys")]
    pub reco_keys: Vec<String>,

    /// Name of the histogram whose entries count the generated events
    #[serde(default = "default_events_key")]
    pub events_key: String,

    #[serde(default)]
    pub input: Input,

    /// Cross-sections in pb
    #[serde(default)]
    pub cross_sections: BTreeMap<String, CrossSection>,

    /// Processes whose rate does not scale with luminosity, in Hz
    #[serde(default)]
    pub fixed_rates: BTreeMap<String, Rate>,

    /// Pileup scenarios, keyed by tag (`PU140`, `PU200`)
    #[serde(default)]
    pub scenarios: BTreeMap<String, Scenario>,

    /// Named groups of processes whose rates are summed
    #[serde(default)]
    pub rate_groups: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub rates: Rates,

    #[serde(default)]
    pub binning: BTreeMap<String, Binning>,

    #[serde(default)]
    pub efficiency: Vec<EfficiencyDefinition>,

    #[serde(default)]
    pub resolution: Vec<ResolutionDefinition>,

    #[serde(default)]
    pub response: Vec<ResponseDefinition>,
}

fn default_reco_keys() -> Vec<String> { vec!["HLT_TRKv06p1_TICL".into()] }
fn default_events_key() -> String { "eventsProcessed".into() }

/// Input file naming: `<prefix><process>_<scenario>.<extension>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_prefix() -> String { "Phase2HLTTDR_".into() }
fn default_extension() -> String { "json".into() }

impl Default for Input {
    fn default() -> Self { Self { prefix: default_prefix(), extension: default_extension() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {

    /// Instantaneous luminosity in Hz/pb
    pub inst_lumi: Luminosity,

    /// HLT thresholds (GeV), keyed by the names used in `rates.paths`
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rates {

    /// Pairs of path ids printed side by side: `[L1T, L1T+HLT]`
    #[serde(default)]
    pub table: Vec<(String, String)>,

    /// Rate groups whose rate curves are summed into one curve per scenario
    #[serde(default)]
    pub curve_groups: Vec<String>,

    /// Rate curves: output name -> histogram key
    #[serde(default)]
    pub curves: BTreeMap<String, String>,

    #[serde(default)]
    pub paths: BTreeMap<String, RatePath>,
}

/// A trigger path whose rate is the tail of `histogram` above a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatePath {

    /// Display label; `{threshold}` is replaced by the scenario's threshold
    pub label: String,

    pub histogram: String,

    /// Key into the scenario's thresholds. Absent: every entry that reached
    /// the histogram counts.
    #[serde(default)]
    pub threshold: Option<String>,
}

impl Config {

    /// The built-in study configuration
    pub fn builtin() -> Result<Self> {
        let config: Config = toml::from_str(BUILTIN)?;
        config.validate()?;
        Ok(config)
    }

    /// Binning for `variable`, honouring any override for `scenario`
    pub fn binning(&self, variable: &str, scenario: &str) -> Result<Edges> {
        self.binning.get(variable)
            .ok_or_else(|| Error::Config(format!("no binning named `{variable}`")))?
            .edges(scenario)
    }

    /// Every process mentioned in any rate group, sorted and deduplicated
    pub fn rate_samples(&self) -> Vec<&str> {
        self.rate_groups.values().flatten().map(String::as_str).sorted_unstable().dedup().collect()
    }

    /// Check cross-references between sections
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));

        for (group, processes) in &self.rate_groups {
            for p in processes {
                if !self.cross_sections.contains_key(p) && !self.fixed_rates.contains_key(p) {
                    return fail(format!("rate group `{group}`: no cross-section or fixed rate for `{p}`"));
                }
            }
        }
        for (id, path) in &self.rates.paths {
            let Some(key) = &path.threshold else { continue };
            for (tag, scenario) in &self.scenarios {
                if !scenario.thresholds.contains_key(key) {
                    return fail(format!("rate path `{id}`: scenario `{tag}` has no threshold `{key}`"));
                }
            }
        }
        for (l1t, hlt) in &self.rates.table {
            for id in [l1t, hlt] {
                if !self.rates.paths.contains_key(id) {
                    return fail(format!("rate table refers to unknown path `{id}`"));
                }
            }
        }
        for group in &self.rates.curve_groups {
            if !self.rate_groups.contains_key(group) {
                return fail(format!("curve group `{group}` is not a rate group"));
            }
        }
        for (name, binning) in &self.binning {
            binning.validate().map_err(|e| Error::Config(format!("binning `{name}`: {e}")))?;
            for tag in self.scenarios.keys() {
                binning.edges(tag).map_err(|e| Error::Config(format!("binning `{name}` in scenario `{tag}`: {e}")))?;
            }
        }
        let binning_names = self.efficiency.iter().map(|e| (&e.name, &e.binning))
            .chain(self.resolution.iter().map(|r| (&r.name, &r.binning)));
        for (name, binning) in binning_names {
            if !self.binning.contains_key(binning) {
                return fail(format!("`{name}` uses unknown binning `{binning}`"));
            }
        }
        for e in &self.efficiency {
            e.validate()?;
        }
        for r in &self.resolution {
            r.validate()?;
        }
        for r in &self.response {
            r.validate()?;
        }
        Ok(())
    }
}

/// Read and validate a study configuration file
pub fn read_config_file(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Open { path: path.to_path_buf(), reason: e.to_string() })?;
    let config: Config = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

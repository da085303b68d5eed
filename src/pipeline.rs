//! One reconstruction from input files to artifacts: rate tables and rate
//! curves for every pileup scenario, then efficiency, response and
//! resolution plots.

use std::collections::{btree_map::Entry, BTreeMap};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::config::Config;
use crate::efficiency;
use crate::error::Result;
use crate::io::{HistogramSource, InputLayout};
use crate::rate::ScenarioRates;
use crate::report::{write_artifact, CurveArtifact, RateTable, Series};
use crate::resolution;
use crate::utils::timing::Progress;

/// Where and how the artifacts of one reconstruction are written
pub struct Output<'a> {
    dir: PathBuf,
    exts: &'a [String],
    dry_run: bool,
    enabled: bool,
    written: Vec<PathBuf>,
}

impl<'a> Output<'a> {

    /// With `enabled` false, `emit` accepts artifacts and writes nothing
    pub fn new(dir: impl Into<PathBuf>, exts: &'a [String], dry_run: bool, enabled: bool) -> Self {
        Self { dir: dir.into(), exts, dry_run, enabled, written: vec![] }
    }

    pub fn emit<T: Serialize>(&mut self, name: &str, artifact: &T) -> Result<()> {
        if self.enabled {
            self.written.extend(write_artifact(&self.dir, name, self.exts, artifact, self.dry_run)?);
        }
        Ok(())
    }

    /// Paths written so far (or, in a dry run, that would have been)
    pub fn written(&self) -> &[PathBuf] { &self.written }
}

/// Input files of one reconstruction, each opened once
pub struct Sources<'a> {
    layout: &'a InputLayout,
    reco: &'a str,
    open: BTreeMap<(String, String), Box<dyn HistogramSource>>,
}

impl<'a> Sources<'a> {

    pub fn new(layout: &'a InputLayout, reco: &'a str) -> Self { Self { layout, reco, open: BTreeMap::new() } }

    pub fn get(&mut self, sample: &str, scenario: &str) -> Result<&dyn HistogramSource> {
        let source = match self.open.entry((sample.to_owned(), scenario.to_owned())) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e)   => e.insert(self.layout.open(self.reco, sample, scenario)?),
        };
        Ok(&**source)
    }

    /// Number of distinct files opened
    pub fn len(&self) -> usize { self.open.len() }

    pub fn is_empty(&self) -> bool { self.open.is_empty() }
}

/// Hooks for reporting progress; every method does nothing by default.
pub trait Observer {
    /// Rates of `scenario` are about to be computed from `n_samples` files
    fn scenario_started(&mut self, _scenario: &str, _n_samples: usize) {}
    /// A sample file is about to be read
    fn sample(&mut self, _process: &str) {}
    /// Rates of one scenario are complete
    fn scenario_done(&mut self, _rates: &ScenarioRates, _tables: &[RateTable]) {}
}

/// Observer which ignores everything
pub struct Quiet;
impl Observer for Quiet {}

/// Settings shared by every reconstruction of one invocation
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub layout: &'a InputLayout,
    /// Artifacts go to `<output>/<reconstruction>/`
    pub output: &'a Path,
    pub exts: &'a [String],
    pub dry_run: bool,
    /// Without plots, only the rate tables are produced
    pub plots: bool,
    pub min_counts: f64,
}

/// What one reconstruction produced
#[derive(Debug, Clone)]
pub struct RecoSummary {
    /// Every rate table of every scenario, scenarios in order
    pub tables: Vec<RateTable>,
    pub written: Vec<PathBuf>,
}

impl Pipeline<'_> {

    pub fn run_reco(&self, reco: &str, observer: &mut dyn Observer, timer: &mut Progress) -> Result<RecoSummary> {
        let config = self.config;
        let mut out = Output::new(self.output.join(reco), self.exts, self.dry_run, self.plots);
        let mut tables = vec![];

        timer.start(format!("{reco}: rates"));
        let mut curves: BTreeMap<String, CurveArtifact> = BTreeMap::new();
        for scenario in config.scenarios.keys() {
            observer.scenario_started(scenario, config.rate_samples().len());
            let rates = ScenarioRates::compute(self.layout, reco, scenario, config, |p| observer.sample(p))?;
            let scenario_tables = config.rates.table.iter()
                .map(|(l1t, hlt)| RateTable::new(&rates, l1t, hlt, self.min_counts))
                .collect::<Vec<_>>();
            observer.scenario_done(&rates, &scenario_tables);
            tables.extend(scenario_tables);
            for (name, curve) in &rates.curves {
                curves.entry(name.clone())
                    .or_insert_with(|| CurveArtifact::new(format!("rate_{name}")))
                    .series.push(Series::from_hist(scenario.as_str(), curve));
            }
        }
        for artifact in curves.values() {
            out.emit(&artifact.name, artifact)?;
        }
        timer.done();

        if !self.plots {
            return Ok(RecoSummary { tables, written: vec![] });
        }
        let mut sources = Sources::new(self.layout, reco);

        timer.start(format!("{reco}: efficiencies"));
        for def in &config.efficiency {
            let mut artifact = CurveArtifact::new(def.name.as_str());
            for scenario in config.scenarios.keys() {
                let edges = config.binning(&def.binning, scenario)?;
                for graph in efficiency::build(sources.get(&def.sample, scenario)?, def, &edges)? {
                    let label = match graph.threshold {
                        Some(t) => format!("{scenario} {t}"),
                        None    => scenario.clone(),
                    };
                    artifact.series.push(Series::from_graph(label, &graph));
                }
            }
            out.emit(&def.name, &artifact)?;
        }
        timer.done_with_message(&format!("{} definitions", config.efficiency.len()));

        timer.start(format!("{reco}: responses and resolutions"));
        for def in &config.response {
            let mut artifact = CurveArtifact::new(def.name.as_str());
            for scenario in config.scenarios.keys() {
                let h2 = sources.get(&def.sample, scenario)?.h2(&def.histogram)?;
                for (hist, (low, high)) in resolution::response_distributions(&h2, &def.slices).iter().zip(&def.slices) {
                    artifact.series.push(Series::from_hist(format!("{scenario} {low}-{high}"), hist));
                }
            }
            out.emit(&def.name, &artifact)?;
        }
        for def in &config.resolution {
            let mut artifact = CurveArtifact::new(def.name.as_str());
            for scenario in config.scenarios.keys() {
                let edges = config.binning(&def.binning, scenario)?;
                let slices = resolution::curve(sources.get(&def.sample, scenario)?, def, &edges)?;
                artifact.series.push(Series::from_slices(scenario.as_str(), &slices));
            }
            out.emit(&def.name, &artifact)?;
        }
        timer.done();
        info!("{reco}: {} input files, {} artifacts", sources.len(), out.written().len());
        Ok(RecoSummary { tables, written: out.written })
    }
}

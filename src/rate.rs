//! Trigger rates: tail integrals of per-process histograms, weighted by
//! cross-section and luminosity, and summed over groups of processes.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::{Config, RatePath, Scenario};
use crate::error::{Error, Result};
use crate::histogram::Hist1D;
use crate::io::{HistogramSource, InputLayout};
use crate::types::{Count, Measurement, Rate};
use crate::xsec::CrossSections;

/// A rate (Hz) and the raw, unweighted count it was derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate : Measurement,
    pub count: Measurement,
}

impl RateEntry {

    /// Sum of entries: values add linearly, errors in quadrature
    pub fn combine<I: IntoIterator<Item = RateEntry>>(entries: I) -> Self {
        let (rates, counts): (Vec<_>, Vec<_>) = entries.into_iter().map(|e| (e.rate, e.count)).unzip();
        Self { rate: Measurement::sum(rates), count: Measurement::sum(counts) }
    }

    /// Replace the rate by the sentinel if it rests on fewer than
    /// `min_counts` counts. The count itself is kept.
    pub fn validated(self, min_counts: Count) -> Self {
        if self.count.value < min_counts { Self { rate: Measurement::sentinel(), ..self } } else { self }
    }
}

/// Rate carried by each generated event
pub fn per_event_factor(rate_factor: Rate, events_processed: Count) -> Result<Rate> {
    if events_processed <= 0.0 {
        return Err(Error::NoEvents(format!("{events_processed} events, cannot normalize rate {rate_factor} Hz")));
    }
    Ok(rate_factor / events_processed)
}

/// Rate of entries in the bin containing `threshold` and above, overflow
/// included.
///
/// Without a threshold every entry counts, from underflow to overflow.
pub fn rate_above(hist: &Hist1D, threshold: Option<f64>, factor: Rate) -> RateEntry {
    let first = threshold.map_or(0, |t| hist.find_bin(t));
    let count = hist.integral_from(first);
    RateEntry { rate: count.scaled(factor), count }
}

/// Cumulative rate histogram: bin `i` holds the rate from the low edge of
/// bin `i` upwards, overflow included. Named after the input with a `_rate`
/// suffix.
pub fn rate_curve(hist: &Hist1D, factor: Rate) -> Hist1D {
    let mut curve = Hist1D::new(format!("{}_rate", hist.name), hist.axis().clone());
    for bin in 1..=hist.n_bins() {
        curve.set_bin(bin, hist.integral_from(bin).scaled(factor));
    }
    curve
}

/// Threshold of `path` in `scenario`, if it has one
pub fn path_threshold(path: &RatePath, scenario: &Scenario) -> Result<Option<f64>> {
    path.threshold.as_ref()
        .map(|key| scenario.thresholds.get(key).copied()
             .ok_or_else(|| Error::Config(format!("no threshold `{key}` for path `{}`", path.label))))
        .transpose()
}

/// Display label of `path` in `scenario`: `HLT_PFPuppiHT{threshold}` -> `HLT_PFPuppiHT1100`
pub fn path_label(path: &RatePath, scenario: &Scenario) -> Result<String> {
    Ok(match path_threshold(path, scenario)? {
        Some(t) => path.label.replace("{threshold}", &t.to_string()),
        None    => path.label.clone(),
    })
}

fn scenario<'c>(config: &'c Config, tag: &str) -> Result<&'c Scenario> {
    config.scenarios.get(tag).ok_or_else(|| Error::Config(format!("unknown pileup scenario `{tag}`")))
}

/// Everything derived from one process in one pileup scenario
#[derive(Debug, Clone)]
pub struct ProcessRates {
    pub process: String,
    pub events_processed: Count,
    /// Rate per generated event
    pub factor: Rate,
    /// Path id -> rate entry
    pub paths: BTreeMap<String, RateEntry>,
    /// Curve name -> cumulative rate histogram
    pub curves: BTreeMap<String, Hist1D>,
}

impl ProcessRates {

    pub fn load(source: &dyn HistogramSource, process: &str, scenario_tag: &str, config: &Config) -> Result<Self> {
        let sc = scenario(config, scenario_tag)?;
        // Unknown processes fail before any histogram is read
        let total = CrossSections::from_config(config).rate_factor(process, sc.inst_lumi)?;

        let events_processed = source.h1(&config.events_key)?.entries();
        let factor = per_event_factor(total, events_processed)
            .map_err(|e| Error::NoEvents(format!("{}: {e}", source.path().display())))?;
        debug!("{process} {scenario_tag}: {events_processed} events, {factor:e} Hz per event");

        let mut paths = BTreeMap::new();
        for (id, path) in &config.rates.paths {
            let hist = source.h1(&path.histogram)?;
            let entry = rate_above(&hist, path_threshold(path, sc)?, factor);
            trace!("{process} {scenario_tag} {id}: {} Hz [counts = {}]", entry.rate, entry.count);
            paths.insert(id.clone(), entry);
        }

        let mut curves = BTreeMap::new();
        for (name, key) in &config.rates.curves {
            let mut hist = source.h1(key)?;
            hist.name = name.clone();
            curves.insert(name.clone(), rate_curve(&hist, factor));
        }

        Ok(Self { process: process.to_owned(), events_processed, factor, paths, curves })
    }
}

fn process_rates<'p>(per_process: &'p BTreeMap<String, ProcessRates>, process: &str) -> Result<&'p ProcessRates> {
    per_process.get(process).ok_or_else(|| Error::UnknownProcess(process.to_owned()))
}

/// Path id -> group -> combined entry, for every path and rate group
pub fn group_rates(
    per_process: &BTreeMap<String, ProcessRates>,
    groups     : &BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<String, BTreeMap<String, RateEntry>>> {
    let path_ids = per_process.values().flat_map(|p| p.paths.keys()).cloned().collect::<BTreeSet<_>>();
    let mut out = BTreeMap::new();
    for id in path_ids {
        let mut by_group = BTreeMap::new();
        for (group, processes) in groups {
            let entries = processes.iter()
                .map(|p| process_rates(per_process, p).and_then(|rates| {
                    rates.paths.get(&id).copied()
                        .ok_or_else(|| Error::Config(format!("no rate for path `{id}` in `{p}`")))
                }))
                .collect::<Result<Vec<_>>>()?;
            by_group.insert(group.clone(), RateEntry::combine(entries));
        }
        out.insert(id, by_group);
    }
    Ok(out)
}

/// Sum each rate curve over all processes of the given groups
pub fn group_curves(
    per_process: &BTreeMap<String, ProcessRates>,
    groups     : &BTreeMap<String, Vec<String>>,
    selected   : &[String],
) -> Result<BTreeMap<String, Hist1D>> {
    let mut out: BTreeMap<String, Hist1D> = BTreeMap::new();
    for group in selected {
        let processes = groups.get(group)
            .ok_or_else(|| Error::Config(format!("unknown rate group `{group}`")))?;
        for p in processes {
            for (name, curve) in &process_rates(per_process, p)?.curves {
                match out.get_mut(name) {
                    Some(total) => total.add(curve)?,
                    None => { out.insert(name.clone(), curve.clone()); }
                }
            }
        }
    }
    Ok(out)
}

/// Rates of one reconstruction in one pileup scenario, aggregated over
/// the configured rate groups
#[derive(Debug, Clone)]
pub struct ScenarioRates {
    pub scenario: String,
    /// Path id -> display label
    pub labels: BTreeMap<String, String>,
    /// Path id -> group -> combined entry
    pub groups: BTreeMap<String, BTreeMap<String, RateEntry>>,
    /// Curve name -> summed cumulative rate histogram
    pub curves: BTreeMap<String, Hist1D>,
}

impl ScenarioRates {

    /// Read every rate sample of `scenario`; `on_sample` is called before each file is read.
    pub fn compute(
        layout   : &InputLayout,
        reco     : &str,
        scenario_tag: &str,
        config   : &Config,
        mut on_sample: impl FnMut(&str),
    ) -> Result<Self> {
        let sc = scenario(config, scenario_tag)?;
        let mut per_process = BTreeMap::new();
        for process in config.rate_samples() {
            on_sample(process);
            let source = layout.open(reco, process, scenario_tag)?;
            let rates = ProcessRates::load(source.as_ref(), process, scenario_tag, config)?;
            per_process.insert(process.to_owned(), rates);
        }
        let labels = config.rates.paths.iter()
            .map(|(id, path)| path_label(path, sc).map(|label| (id.clone(), label)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            scenario: scenario_tag.to_owned(),
            labels,
            groups: group_rates(&per_process, &config.rate_groups)?,
            curves: group_curves(&per_process, &config.rate_groups, &config.rates.curve_groups)?,
        })
    }

    pub fn entry(&self, path: &str, group: &str) -> Option<RateEntry> {
        self.groups.get(path)?.get(group).copied()
    }
}

//! What to derive from the samples, beyond rates

use serde::{Deserialize, Serialize};

use crate::efficiency::Estimator;
use crate::error::{Error, Result};

/// Where numerator and denominator distributions come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// 1D histograms, used as they are
    #[default]
    H1,
    /// 2D histograms of (triggering quantity, reference quantity), projected
    /// onto the reference axis. The numerator keeps only the entries whose
    /// triggering quantity lies above the threshold.
    Projection,
}

/// An efficiency graph per pileup scenario (and per threshold, if any)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EfficiencyDefinition {
    pub name: String,

    /// Process whose files are read
    pub sample: String,

    pub numerator: String,
    pub denominator: String,

    #[serde(default)]
    pub source: Source,

    /// Thresholds on the triggering quantity (projections only)
    #[serde(default)]
    pub thresholds: Vec<f64>,

    /// Name of an entry in `[binning]`
    pub binning: String,

    #[serde(default)]
    pub estimator: Estimator,

    /// Confidence level of the error bars
    #[serde(default = "default_cl")]
    pub cl: f64,

    /// Drop the half-bin-width horizontal error bars
    #[serde(default)]
    pub zero_x_errors: bool,
}

fn default_cl() -> f64 { 0.683 }

impl EfficiencyDefinition {
    pub fn validate(&self) -> Result<()> {
        if self.source == Source::H1 && !self.thresholds.is_empty() {
            return Err(Error::Config(format!("efficiency `{}`: thresholds need `source = \"projection\"`", self.name)));
        }
        if !(self.cl > 0.0 && self.cl < 1.0) {
            return Err(Error::Config(format!("efficiency `{}`: confidence level {} is not in (0, 1)", self.name, self.cl)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionKind {
    /// RMS over mean of the response in each slice
    #[default]
    RelativeWidth,
    /// Mean response in each slice, with the error on the mean
    Mean,
    /// RMS of the `spread` response over the mean of the main response
    SpreadOverMean,
}

/// Per-slice summary of a 2D (response, reference) histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionDefinition {
    pub name: String,
    pub sample: String,
    pub histogram: String,
    #[serde(default)]
    pub kind: ResolutionKind,
    /// Second histogram, required by `spread-over-mean`
    #[serde(default)]
    pub spread: Option<String>,
    /// Slices of the reference axis: name of an entry in `[binning]`
    pub binning: String,
}

impl ResolutionDefinition {
    pub fn validate(&self) -> Result<()> {
        match (self.kind, &self.spread) {
            (ResolutionKind::SpreadOverMean, None) =>
                Err(Error::Config(format!("resolution `{}`: `spread-over-mean` needs a `spread` histogram", self.name))),
            (ResolutionKind::RelativeWidth | ResolutionKind::Mean, Some(_)) =>
                Err(Error::Config(format!("resolution `{}`: `spread` is only used by `spread-over-mean`", self.name))),
            _ => Ok(()),
        }
    }
}

/// Normalized response distributions in a few slices of the reference axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    pub name: String,
    pub sample: String,
    pub histogram: String,
    pub slices: Vec<(f64, f64)>,
}

impl ResponseDefinition {
    pub fn validate(&self) -> Result<()> {
        match self.slices.iter().find(|(low, high)| !(low < high)) {
            Some((low, high)) => Err(Error::Config(format!("response `{}`: empty slice [{low}, {high}]", self.name))),
            None => Ok(()),
        }
    }
}

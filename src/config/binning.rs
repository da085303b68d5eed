use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::axis::Edges;
use crate::error::{Error, Result};

/// Bin edges for one variable: either explicit `edges` or `uniform`, with
/// optional explicit edges per pileup scenario.
///
/// ```toml
/// [binning.met]
/// edges = [0, 10, 20, 50, 100]
///
/// [binning.jet_pt]
/// uniform = { bins = 100, low = 0, high = 1000 }
/// scenarios.PU200 = [0, 100, 1000]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Binning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform: Option<Uniform>,
    #[serde(default)]
    pub scenarios: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Uniform {
    pub bins: usize,
    pub low: f64,
    pub high: f64,
}

impl Binning {

    pub fn edges(&self, scenario: &str) -> Result<Edges> {
        match self.scenarios.get(scenario) {
            Some(edges) => Edges::new(edges.iter().copied()),
            None        => self.default_edges(),
        }
    }

    /// Edges for scenarios without an override
    fn default_edges(&self) -> Result<Edges> {
        match (&self.edges, self.uniform) {
            (Some(edges), None) => Edges::new(edges.iter().copied()),
            (None, Some(Uniform { bins, low, high })) => Edges::uniform(bins, low, high),
            (Some(_), Some(_)) => Err(Error::Binning("specify either `edges` or `uniform`, not both".into())),
            (None, None)       => Err(Error::Binning("neither `edges` nor `uniform` given".into())),
        }
    }

    /// Every edge set this binning can produce is well formed. A binning
    /// made only of scenario overrides has no default edges to check.
    pub fn validate(&self) -> Result<()> {
        if self.edges.is_some() || self.uniform.is_some() || self.scenarios.is_empty() {
            self.default_edges()?;
        }
        for edges in self.scenarios.values() {
            Edges::new(edges.iter().copied())?;
        }
        Ok(())
    }
}

//! Serialized plot artifacts and console rate tables.
//!
//! Nothing is rendered here: each plot becomes a data file, in every
//! requested format, which external tooling turns into figures.

use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::efficiency::EfficiencyGraph;
use crate::error::Result;
use crate::histogram::Hist1D;
use crate::rate::{RateEntry, ScenarioRates};
use crate::resolution::SliceValue;
use crate::types::{Measurement, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format { Json, Toml }

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _      => None,
        }
    }

    pub fn serialize<T: Serialize>(self, value: &T) -> Result<String> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(value)?,
            Self::Toml => toml::to_string_pretty(value)?,
        })
    }
}

/// Write `value` to `<dir>/<name>.<ext>` for each of `exts`, returning the
/// paths written (or, with `dry_run`, those that would have been written).
///
/// Extensions without a serialization are skipped with a warning.
pub fn write_artifact<T: Serialize>(dir: &Path, name: &str, exts: &[String], value: &T, dry_run: bool) -> Result<Vec<PathBuf>> {
    let mut written = vec![];
    for ext in exts {
        let Some(format) = Format::from_extension(ext) else {
            warn!("`{name}`: no `{ext}` output, plots are rendered externally");
            continue;
        };
        let path = dir.join(format!("{name}.{ext}"));
        if dry_run {
            info!("[dry run] would write {}", path.display());
        } else {
            create_dir_all(dir)?;
            write(&path, format.serialize(value)?)?;
            info!("Wrote {}", path.display());
        }
        written.push(path);
    }
    Ok(written)
}

impl From<&SliceValue> for Point {
    fn from(s: &SliceValue) -> Self { Point::in_bin(s.low, s.high, s.value) }
}

/// One line on a plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<Point>,
}

impl Series {
    /// Regular bins of `hist` at their centres, with half-width x errors
    pub fn from_hist(label: impl Into<String>, hist: &Hist1D) -> Self {
        let points = hist.bins()
            .map(|(_, low, high, content, error)| Point::in_bin(low, high, Measurement::new(content, error)))
            .collect();
        Self { label: label.into(), points }
    }

    pub fn from_graph(label: impl Into<String>, graph: &EfficiencyGraph) -> Self {
        Self { label: label.into(), points: graph.points.clone() }
    }

    pub fn from_slices(label: impl Into<String>, slices: &[SliceValue]) -> Self {
        Self { label: label.into(), points: slices.iter().map(Point::from).collect() }
    }
}

/// Several series overlaid on one plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveArtifact {
    pub name: String,
    pub series: Vec<Series>,
}

impl CurveArtifact {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into(), series: vec![] } }

    pub fn with(mut self, series: Series) -> Self { self.series.push(series); self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub group: String,
    pub l1t: RateEntry,
    pub hlt: RateEntry,
}

/// Rates of an (L1T, L1T+HLT) path pair for every rate group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub scenario: String,
    pub l1t_label: String,
    pub hlt_label: String,
    pub rows: Vec<RateRow>,
}

impl RateTable {
    /// Collect the rows for `l1t` and `hlt` from `rates`, replacing entries
    /// with fewer than `min_counts` counts by the sentinel.
    pub fn new(rates: &ScenarioRates, l1t: &str, hlt: &str, min_counts: f64) -> Self {
        let label = |path: &str| rates.labels.get(path).cloned().unwrap_or_else(|| path.to_owned());
        let groups = rates.groups.get(l1t).into_iter().flat_map(|g| g.keys());
        let rows = groups.filter_map(|group| {
            let l1t = rates.entry(l1t, group)?.validated(min_counts);
            let hlt = rates.entry(hlt, group)?.validated(min_counts);
            Some(RateRow { group: group.clone(), l1t, hlt })
        }).collect();
        Self { scenario: rates.scenario.clone(), l1t_label: label(l1t), hlt_label: label(hlt), rows }
    }

    pub fn header(&self) -> String {
        format!("{:<12} | [L1T] {} | [L1T+HLT] {}", "Rate [Hz]", self.l1t_label, self.hlt_label)
    }

    pub fn lines(&self) -> Vec<String> {
        std::iter::once(self.header())
            .chain(self.rows.iter().map(|r| format_rate_row(&r.group, &r.l1t, &r.hlt)))
            .collect()
    }
}

fn format_entry(e: &RateEntry) -> String {
    format!("{:>11.2} +/- {:>10.2} [counts = {:9.1}]", e.rate.value, e.rate.error, e.count.value)
}

/// `group | rate +/- error [counts = c] | rate +/- error [counts = c]`
pub fn format_rate_row(group: &str, l1t: &RateEntry, hlt: &RateEntry) -> String {
    format!("{group:<12} | {} | {}", format_entry(l1t), format_entry(hlt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Edges;
    use crate::efficiency::{divide, Estimator};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn hist() -> Hist1D {
        let mut h = Hist1D::new("h", Edges::new([0.0, 10.0, 30.0]).unwrap());
        h.fill(5.0);
        h.fill(20.0);
        h.fill(20.0);
        h
    }

    #[test]
    fn series_from_histogram() {
        let s = Series::from_hist("QCD", &hist());
        assert_eq!(s.points.len(), 2);
        assert_eq!(s.points[1], Point { x: 20.0, ex_low: 10.0, ex_high: 10.0, y: 2.0, ey_low: 2_f64.sqrt(), ey_high: 2_f64.sqrt() });
    }

    #[test]
    fn series_from_graph_keeps_points() {
        let mut pass = Hist1D::new("pass", Edges::new([0.0, 10.0, 30.0]).unwrap());
        pass.fill(20.0);
        let graph = divide(&pass, &hist(), Estimator::Normal, 0.683).unwrap();
        let s = Series::from_graph("eff", &graph);
        assert_eq!(s.points, graph.points);
        assert_eq!((s.points[1].x, s.points[1].y), (20.0, 0.5));
    }

    #[test]
    fn series_from_slices() {
        let s = Series::from_slices("HB", &[SliceValue { low: 30.0, high: 100.0, value: Measurement::new(0.2, 0.01) }]);
        assert_eq!((s.points[0].x, s.points[0].ex_low), (65.0, 35.0));
        assert_eq!(s.points[0].ey_high, 0.01);
    }

    #[test]
    fn formats() {
        assert_eq!(Format::from_extension("json"), Some(Format::Json));
        assert_eq!(Format::from_extension("TOML"), Some(Format::Toml));
        assert_eq!(Format::from_extension("png"), None);
    }

    #[test]
    fn write_all_requested_formats() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("HLT_TRKv06p1_TICL");
        let artifact = CurveArtifact::new("rates").with(Series::from_hist("QCD", &hist()));
        let exts = ["json".to_string(), "toml".to_string(), "pdf".to_string()];
        let written = write_artifact(&out, "rates", &exts, &artifact, false).unwrap();
        assert_eq!(written, vec![out.join("rates.json"), out.join("rates.toml")]);

        let back: CurveArtifact = serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(back, artifact);
        let back: CurveArtifact = toml::from_str(&std::fs::read_to_string(&written[1]).unwrap()).unwrap();
        assert_eq!(back.series[0].label, "QCD");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("reco");
        let written = write_artifact(&out, "x", &["json".to_string()], &CurveArtifact::new("x"), true).unwrap();
        assert_eq!(written, vec![out.join("x.json")]);
        assert!(!out.exists());
    }

    #[test]
    fn rate_row_layout() {
        let l1t = RateEntry { rate: Measurement::new(1234.567, 12.3), count: Measurement::new(5000.0, 70.7) };
        let hlt = RateEntry { rate: Measurement::sentinel(), count: Measurement::new(3.0, 1.7) };
        assert_eq!(format_rate_row("QCD", &l1t, &hlt),
                   "QCD          |     1234.57 +/-      12.30 [counts =    5000.0] |      -99.00 +/-     -99.00 [counts =       3.0]");
    }
}

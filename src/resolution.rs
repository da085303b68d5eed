//! Response and resolution in slices of a reference quantity.
//!
//! The input histograms hold the response (e.g. reconstructed over generated
//! pT) on the x axis and the reference quantity (generated pT) on the y axis.

use serde::{Deserialize, Serialize};

use crate::axis::Edges;
use crate::config::{ResolutionDefinition, ResolutionKind};
use crate::error::{Error, Result};
use crate::histogram::{Hist1D, Hist2D};
use crate::io::HistogramSource;
use crate::types::{Bin, Measurement};

/// Bins of `axis` selected by the slice `[low, high]`.
///
/// The limits are nudged inwards so that a limit sitting exactly on a bin
/// edge does not drag in the neighbouring bin.
pub fn slice_bins(axis: &Edges, low: f64, high: f64) -> (Bin, Bin) {
    (axis.find_bin(1.0001 * low), axis.find_bin(0.9999 * high))
}

fn slice(h2: &Hist2D, low: f64, high: f64) -> Hist1D {
    let (first, last) = slice_bins(h2.y_axis(), low, high);
    h2.projection_x(format!("{}_{low}to{high}", h2.name), first..=last)
}

/// Response distribution in each slice, normalized to unit integral
pub fn response_distributions(h2: &Hist2D, slices: &[(f64, f64)]) -> Vec<Hist1D> {
    slices.iter().map(|&(low, high)| slice(h2, low, high).normalized()).collect()
}

/// A summary value for one slice of the reference quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceValue {
    pub low: f64,
    pub high: f64,
    pub value: Measurement,
}

fn slices(edges: &Edges) -> impl Iterator<Item = (f64, f64)> + '_ {
    (1..=edges.n_bins()).map(|bin| (edges.lower_edge(bin), edges.upper_edge(bin)))
}

/// RMS over mean of the response in each slice; slices with zero mean are left out
pub fn resolution_curve(h2: &Hist2D, edges: &Edges) -> Vec<SliceValue> {
    slices(edges).filter_map(|(low, high)| {
        let h = slice(h2, low, high);
        let mean = h.mean();
        (mean != 0.0).then(|| SliceValue {
            low, high, value: Measurement::new(h.std_dev() / mean, h.std_dev_error() / mean),
        })
    }).collect()
}

/// Mean response in each non-empty slice, with the error on the mean
pub fn mean_curve(h2: &Hist2D, edges: &Edges) -> Vec<SliceValue> {
    slices(edges).filter_map(|(low, high)| {
        let h = slice(h2, low, high);
        (h.effective_entries() > 0.0).then(|| SliceValue {
            low, high, value: Measurement::new(h.mean(), h.mean_error()),
        })
    }).collect()
}

/// RMS of `spread_h2` over the mean of `mean_h2` in each slice, as for the
/// MET resolution: spread perpendicular to the reference, scaled by the
/// mean parallel response.
pub fn met_resolution_curve(mean_h2: &Hist2D, spread_h2: &Hist2D, edges: &Edges) -> Vec<SliceValue> {
    slices(edges).filter_map(|(low, high)| {
        let mean = slice(mean_h2, low, high).mean();
        let spread = slice(spread_h2, low, high);
        (mean != 0.0).then(|| SliceValue {
            low, high, value: Measurement::new(spread.std_dev() / mean, spread.std_dev_error() / mean),
        })
    }).collect()
}

/// Evaluate `def` on the histograms in `source`
pub fn curve(source: &dyn HistogramSource, def: &ResolutionDefinition, edges: &Edges) -> Result<Vec<SliceValue>> {
    let h2 = source.h2(&def.histogram)?;
    Ok(match def.kind {
        ResolutionKind::RelativeWidth => resolution_curve(&h2, edges),
        ResolutionKind::Mean          => mean_curve(&h2, edges),
        ResolutionKind::SpreadOverMean => {
            let key = def.spread.as_ref()
                .ok_or_else(|| Error::Config(format!("resolution `{}` has no `spread` histogram", def.name)))?;
            met_resolution_curve(&h2, &source.h2(key)?, edges)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    /// Response in [0, 2) with 20 bins, reference pT in [0, 600) with 6 bins
    fn response() -> Hist2D {
        let mut h = Hist2D::new("resp", Edges::uniform(20, 0.0, 2.0).unwrap(), Edges::uniform(6, 0.0, 600.0).unwrap());
        // 100 < pT < 200: responses 0.85 and 1.15
        h.fill(0.85, 150.0);
        h.fill(1.15, 150.0);
        // 300 < pT < 400: responses 0.95 and 1.05, twice
        for _ in 0..2 {
            h.fill(0.95, 350.0);
            h.fill(1.05, 350.0);
        }
        h
    }

    #[test]
    fn slice_limits_on_edges_select_whole_bins() {
        let axis = Edges::uniform(6, 0.0, 600.0).unwrap();
        assert_eq!(slice_bins(&axis, 100.0, 300.0), (2, 3));
        assert_eq!(slice_bins(&axis, 0.0, 600.0), (1, 6));
    }

    #[test]
    fn relative_width() {
        let edges = Edges::new([100.0, 200.0, 300.0, 400.0]).unwrap();
        let curve = resolution_curve(&response(), &edges);
        // the empty 200-300 slice has zero mean and is left out
        assert_eq!(curve.len(), 2);
        assert_eq!((curve[0].low, curve[0].high), (100.0, 200.0));
        assert_float_eq!(curve[0].value.value, 0.15, abs <= 1e-9);
        assert_float_eq!(curve[1].value.value, 0.05, abs <= 1e-9);
        // 4 entries: sigma / sqrt(2 * 4) / mean
        assert_float_eq!(curve[1].value.error, 0.05 / 8_f64.sqrt(), abs <= 1e-9);
    }

    #[test]
    fn mean_response() {
        let edges = Edges::new([100.0, 200.0, 300.0, 400.0]).unwrap();
        let curve = mean_curve(&response(), &edges);
        assert_eq!(curve.len(), 2);
        assert_float_eq!(curve[0].value.value, 1.0, abs <= 1e-9);
        assert_float_eq!(curve[0].value.error, 0.15 / 2_f64.sqrt(), abs <= 1e-9);
    }

    #[test]
    fn spread_over_mean() {
        let edges = Edges::new([100.0, 200.0]).unwrap();
        let mut spread = Hist2D::new("perp", Edges::uniform(20, -1.0, 1.0).unwrap(), Edges::uniform(6, 0.0, 600.0).unwrap());
        spread.fill(-0.25, 150.0);
        spread.fill( 0.35, 150.0);
        let curve = met_resolution_curve(&response(), &spread, &edges);
        assert_float_eq!(curve[0].value.value, 0.3, abs <= 1e-9);
    }

    #[test]
    fn normalized_responses() {
        let distributions = response_distributions(&response(), &[(100.0, 200.0), (300.0, 400.0), (400.0, 600.0)]);
        assert_eq!(distributions.len(), 3);
        assert_eq!(distributions[0].name, "resp_100to200");
        assert_float_eq!(distributions[1].integral(), 1.0, abs <= 1e-12);
        assert_eq!(distributions[2].integral(), 0.0);
    }
}

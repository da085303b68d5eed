use ndhistogram::axis::{Axis, BinInterval, Variable};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Bin;

/// An axis with arbitrary, strictly increasing bin edges.
///
/// `N + 1` edges define `N` regular bins. As with ROOT histograms there is
/// an underflow bin (index 0) below the first edge and an overflow bin
/// (index `N + 1`) at or above the last edge, so the axis has `N + 2` bins
/// in total.
///
/// This is ndhistogram's `Variable` axis behind a constructor which rejects
/// the edges `Variable::new` would panic on or silently reorder.
///
/// # Examples
/// ```
/// use ndhistogram::axis::Axis;
/// use trigstat::axis::Edges;
/// let axis = Edges::new([0.0, 10.0, 20.0, 50.0]).unwrap();
/// assert_eq!(axis.n_bins(), 3);
/// assert_eq!(axis.index(&-1.0), Some(0));
/// assert_eq!(axis.index(&25.0), Some(3));
/// assert_eq!(axis.index(&50.0), Some(4));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Edges(Variable<f64>);

impl Edges {

    /// # Errors
    /// Fewer than two edges, non-finite edges, or edges which are not
    /// strictly increasing.
    pub fn new(edges: impl IntoIterator<Item = f64>) -> Result<Self> {
        let edges: Vec<f64> = edges.into_iter().collect();
        if edges.len() < 2 {
            return Err(Error::Binning(format!("need at least 2 edges, got {}", edges.len())));
        }
        if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
            return Err(Error::Binning(format!("non-finite edge {bad}")));
        }
        if let Some(w) = edges.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::Binning(format!("edges not strictly increasing at {} -> {}", w[0], w[1])));
        }
        Ok(Self(Variable::new(edges)))
    }

    /// `nbins` equal-width bins covering `[low, high)`
    pub fn uniform(nbins: usize, low: f64, high: f64) -> Result<Self> {
        if nbins == 0 { return Err(Error::Binning("need more than zero bins on axis".into())) }
        let step = (high - low) / nbins as f64;
        Self::new((0..=nbins).map(|i| if i == nbins { high } else { low + i as f64 * step }))
    }

    /// Number of regular bins (excluding underflow and overflow)
    pub fn n_bins(&self) -> usize { self.0.num_bins() - 2 }

    /// All `n_bins() + 1` edges, lowest first
    pub fn edges(&self) -> Vec<f64> {
        self.0.bins().filter_map(|bin| bin.end()).collect()
    }

    pub fn low (&self) -> f64 { *self.0.low()  }
    pub fn high(&self) -> f64 { *self.0.high() }

    /// Index of the bin containing `x`. NaN is treated as overflow.
    pub fn find_bin(&self, x: f64) -> Bin {
        self.index(&x).unwrap_or(self.n_bins() + 1)
    }

    /// Lower edge of regular bin `bin` (`1..=n`); NaN for the underflow or
    /// an index past the overflow.
    pub fn lower_edge(&self, bin: Bin) -> f64 { self.0.bin(bin).and_then(|b| b.start()).unwrap_or(f64::NAN) }
    pub fn upper_edge(&self, bin: Bin) -> f64 { self.0.bin(bin).and_then(|b| b.end  ()).unwrap_or(f64::NAN) }
    pub fn width     (&self, bin: Bin) -> f64 { self.upper_edge(bin) - self.lower_edge(bin) }
    pub fn centre    (&self, bin: Bin) -> f64 { 0.5 * (self.lower_edge(bin) + self.upper_edge(bin)) }

    /// Whether `x` coincides (to within rounding) with one of the edges
    pub fn has_edge(&self, x: f64) -> bool {
        let tolerance = 1e-9 * (self.high() - self.low()).abs().max(1.0);
        self.edges().iter().any(|e| (e - x).abs() <= tolerance)
    }
}

impl TryFrom<Vec<f64>> for Edges {
    type Error = Error;
    fn try_from(edges: Vec<f64>) -> Result<Self> { Self::new(edges) }
}

impl From<Edges> for Vec<f64> {
    fn from(axis: Edges) -> Self { axis.edges() }
}

impl From<Edges> for Variable<f64> {
    fn from(Edges(axis): Edges) -> Self { axis }
}

impl Axis for Edges {
    type Coordinate = f64;
    type BinInterval = BinInterval<f64>;

    /// `Variable` cannot compare NaN against its edges: NaN belongs to no bin.
    #[inline]
    fn index(&self, coordinate: &Self::Coordinate) -> Option<usize> {
        if coordinate.is_nan() { None } else { self.0.index(coordinate) }
    }

    fn num_bins(&self) -> usize { self.0.num_bins() }

    fn bin(&self, index: usize) -> Option<Self::BinInterval> { self.0.bin(index) }
}

#[cfg(test)]
mod test_edges {
    use super::*;
    use rstest::rstest;

    #[rstest(/**/  x  , expected,
             case(-5.0 , 0), // underflow
             case( 0.0 , 1), // low edge belongs to first bin
             case( 9.99, 1),
             case(10.0 , 2),
             case(49.0 , 3),
             case(50.0 , 4), // high edge is overflow
             case(1e9  , 4),
    )]
    fn index(x: f64, expected: usize) {
        let axis = Edges::new([0.0, 10.0, 20.0, 50.0]).unwrap();
        assert_eq!(axis.index(&x), Some(expected));
    }

    #[test]
    fn nan_goes_nowhere() {
        let axis = Edges::new([0.0, 1.0]).unwrap();
        assert_eq!(axis.index(&f64::NAN), None);
        assert_eq!(axis.find_bin(f64::NAN), 2);
    }

    #[test]
    fn bin_intervals() {
        let axis = Edges::new([0.0, 0.25, 1.0]).unwrap();
        assert_eq!(axis.num_bins(), 4);
        assert_eq!(axis.bin(0), Some(BinInterval::underflow(0.0)));
        assert_eq!(axis.bin(1), Some(BinInterval::new(0.0, 0.25)));
        assert_eq!(axis.bin(2), Some(BinInterval::new(0.25, 1.0)));
        assert_eq!(axis.bin(3), Some(BinInterval::overflow(1.0)));
        assert_eq!(axis.bin(4), None);
    }

    #[test]
    fn edges_come_back_in_order() {
        let axis = Edges::new([0.0, 0.25, 1.0]).unwrap();
        assert_eq!(axis.edges(), vec![0.0, 0.25, 1.0]);
        assert_eq!((axis.low(), axis.high()), (0.0, 1.0));
        assert_eq!((axis.lower_edge(2), axis.upper_edge(2)), (0.25, 1.0));
        assert!(axis.lower_edge(0).is_nan());
    }

    #[rstest(/**/ edges,
             case(vec![]),
             case(vec![1.0]),
             case(vec![1.0, 1.0]),
             case(vec![2.0, 1.0]), // Variable::new would sort these
             case(vec![0.0, f64::INFINITY]),
    )]
    fn reject_bad_edges(edges: Vec<f64>) {
        assert!(Edges::new(edges).is_err());
    }

    #[test]
    fn uniform_matches_explicit() {
        let uniform = Edges::uniform(4, 0.0, 200.0).unwrap();
        assert_eq!(uniform, Edges::new([0.0, 50.0, 100.0, 150.0, 200.0]).unwrap());
        assert_eq!(uniform.centre(2), 75.0);
        assert_eq!(uniform.width(4), 50.0);
    }

    #[test]
    fn deserialize_validates() {
        let ok: std::result::Result<Edges, _> = serde_json::from_str("[0, 1, 2]");
        assert_eq!(ok.unwrap().edges(), vec![0.0, 1.0, 2.0]);
        let bad: std::result::Result<Edges, _> = serde_json::from_str("[2, 1]");
        assert!(bad.is_err());
    }
}

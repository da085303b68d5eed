//! Binned sums of weights with statistical errors, in one and two dimensions.
//!
//! Bin numbering follows ROOT: for an axis with `n` regular bins, bin 0 is
//! underflow and bin `n + 1` is overflow. Storage is an ndhistogram
//! `VecHistogram` whose bins hold the sum of weights and the sum of squared
//! weights.

use std::ops::{Add, AddAssign, Bound, RangeBounds};

use log::warn;
use ndhistogram::{axis::Axis, ndhistogram, FillWith, Histogram};
use serde::{Deserialize, Serialize};

use crate::axis::Edges;
use crate::error::{Error, Result};
use crate::types::{Bin, Measurement};

/// Bin value: sum of weights and sum of squared weights.
///
/// Plays the part of ndhistogram's `WeightedSum`, which cannot be scaled,
/// added or restored from stored sums.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Weighted {
    sumw : f64,
    sumw2: f64,
}

impl Weighted {
    pub fn new(sumw: f64, sumw2: f64) -> Self { Self { sumw, sumw2 } }
    pub fn sum     (&self) -> f64 { self.sumw }
    pub fn variance(&self) -> f64 { self.sumw2 }
    pub fn error   (&self) -> f64 { self.sumw2.sqrt() }

    fn scale(&mut self, factor: f64) {
        self.sumw  *= factor;
        self.sumw2 *= factor * factor;
    }
}

impl FillWith<f64> for Weighted {
    #[inline]
    fn fill_with(&mut self, weight: f64) {
        self.sumw  += weight;
        self.sumw2 += weight * weight;
    }
}

impl AddAssign<&Weighted> for Weighted {
    fn add_assign(&mut self, other: &Weighted) {
        self.sumw  += other.sumw;
        self.sumw2 += other.sumw2;
    }
}

impl Add for &Weighted {
    type Output = Weighted;
    fn add(self, other: &Weighted) -> Weighted {
        let mut sum = *self;
        sum += other;
        sum
    }
}

type Storage1D = ndhistogram::Hist1D<Edges, Weighted>;
type Storage2D = ndhistogram::Hist2D<Edges, Edges, Weighted>;

fn check_sumw2(name: &str, sumw2: &[f64]) -> Result<()> {
    match sumw2.iter().find(|w2| **w2 < 0.0 || !w2.is_finite()) {
        Some(bad) => Err(Error::Binning(format!("`{name}`: invalid sum of squared weights {bad}"))),
        None      => Ok(()),
    }
}

/// Copy stored per-bin sums into freshly created storage of the same size
fn restore<A: Axis>(hist: &mut ndhistogram::VecHistogram<A, Weighted>, sumw: Vec<f64>, sumw2: Vec<f64>) {
    hist.values_mut()
        .zip(sumw.into_iter().zip(sumw2))
        .for_each(|(value, (w, w2))| *value = Weighted::new(w, w2));
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHist1D", into = "RawHist1D")]
pub struct Hist1D {
    pub name: String,
    hist: Storage1D,
    entries: f64,
}

/// On-disk form of [`Hist1D`]: `contents` and `sumw2` include the flow bins
/// and so have `edges.len() + 1` elements. Missing `sumw2` means unweighted
/// (Poisson) errors; missing `entries` means the sum of contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHist1D {
    #[serde(default)]
    pub name: String,
    pub edges: Edges,
    pub contents: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sumw2: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<f64>,
}

impl TryFrom<RawHist1D> for Hist1D {
    type Error = Error;
    fn try_from(RawHist1D { name, edges, contents, sumw2, entries }: RawHist1D) -> Result<Self> {
        let sumw2 = sumw2.unwrap_or_else(|| contents.iter().map(|c| c.abs()).collect());
        let entries = entries.unwrap_or_else(|| contents.iter().sum());
        Hist1D::from_parts(name, edges, contents, sumw2, entries)
    }
}

impl From<Hist1D> for RawHist1D {
    fn from(h: Hist1D) -> Self {
        let edges = h.axis().clone();
        let contents = h.hist.values().map(Weighted::sum).collect();
        let sumw2    = h.hist.values().map(Weighted::variance).collect();
        Self { name: h.name, edges, contents, sumw2: Some(sumw2), entries: Some(h.entries) }
    }
}

impl Hist1D {

    pub fn new(name: impl Into<String>, axis: Edges) -> Self {
        Self { name: name.into(), hist: ndhistogram!(axis; Weighted), entries: 0.0 }
    }

    /// Build from per-bin sums which include underflow and overflow
    pub fn from_parts(
        name   : impl Into<String>,
        axis   : Edges,
        sumw   : Vec<f64>,
        sumw2  : Vec<f64>,
        entries: f64,
    ) -> Result<Self> {
        let name = name.into();
        let n = axis.num_bins();
        if sumw.len() != n || sumw2.len() != n {
            return Err(Error::Binning(format!(
                "`{name}`: {} regular bins need {n} values including flows, got {} contents and {} sumw2",
                axis.n_bins(), sumw.len(), sumw2.len())));
        }
        check_sumw2(&name, &sumw2)?;
        let mut hist = Self::new(name, axis);
        restore(&mut hist.hist, sumw, sumw2);
        hist.entries = entries;
        Ok(hist)
    }

    pub fn axis(&self) -> &Edges { &self.hist.axes().as_tuple().0 }

    /// Number of regular bins
    pub fn n_bins(&self) -> usize { self.axis().n_bins() }

    pub fn entries(&self) -> f64 { self.entries }

    pub fn find_bin(&self, x: f64) -> Bin { self.axis().find_bin(x) }

    pub fn fill(&mut self, x: f64) { self.fill_with(x, 1.0) }

    pub fn fill_with(&mut self, x: f64, weight: f64) {
        if self.axis().index(&x).is_some() {
            Histogram::fill_with(&mut self.hist, &x, weight);
            self.entries += 1.0;
        }
    }

    /// Sums in any bin, flows included. Out-of-range indices are empty.
    pub fn value(&self, bin: Bin) -> Weighted {
        self.hist.value_at_index(bin).copied().unwrap_or_default()
    }

    pub fn content(&self, bin: Bin) -> f64 { self.value(bin).sum() }

    pub fn error(&self, bin: Bin) -> f64 { self.value(bin).error() }

    pub fn measurement(&self, bin: Bin) -> Measurement { Measurement::new(self.content(bin), self.error(bin)) }

    /// Overwrite content and error of one bin
    pub fn set_bin(&mut self, bin: Bin, m: Measurement) {
        if let Some(value) = self.hist.value_at_index_mut(bin) {
            *value = Weighted::new(m.value, m.error * m.error);
        }
    }

    /// Sum of contents in the inclusive bin range `first..=last`, with its
    /// error. `last` is clamped to the overflow bin; an empty range gives zero.
    pub fn integral_and_error(&self, first: Bin, last: Bin) -> Measurement {
        let last = last.min(self.n_bins() + 1);
        let sum = (first..=last)
            .filter_map(|bin| self.hist.value_at_index(bin))
            .fold(Weighted::default(), |acc, value| &acc + value);
        Measurement::new(sum.sum(), sum.error())
    }

    /// Sum of contents from `bin` through the last regular bin.
    ///
    /// Overflow is not included, so the tail from `n + 1` is zero. Starting
    /// at bin 0 includes the underflow.
    pub fn tail_integral(&self, bin: Bin) -> Measurement {
        self.integral_and_error(bin, self.n_bins())
    }

    /// Sum of contents from `bin` through the overflow
    pub fn integral_from(&self, bin: Bin) -> Measurement {
        self.integral_and_error(bin, self.n_bins() + 1)
    }

    /// Sum of the regular bins
    pub fn integral(&self) -> f64 { self.tail_integral(1).value }

    pub fn scale(&mut self, factor: f64) {
        self.hist.values_mut().for_each(|value| value.scale(factor));
    }

    pub fn scaled(mut self, factor: f64) -> Self { self.scale(factor); self }

    /// Scale to unit integral over the regular bins. Empty histograms are left alone.
    pub fn normalized(self) -> Self {
        let integral = self.integral();
        if integral != 0.0 { self.scaled(1.0 / integral) } else { self }
    }

    /// Bin-by-bin addition; both histograms must share the same binning.
    pub fn add(&mut self, other: &Hist1D) -> Result<()> {
        self.hist = (&self.hist + &other.hist).map_err(|_| Error::Incompatible(
            format!("cannot add `{}` to `{}`: different binning", other.name, self.name)))?;
        self.entries += other.entries;
        Ok(())
    }

    /// Redistribute contents into bins with the given `edges`.
    ///
    /// Each regular bin moves, whole, into the new bin containing its centre;
    /// flows stay flows. Old bins falling outside the new range end up in the
    /// new underflow or overflow, so the sum over all bins is preserved.
    pub fn rebin(&self, edges: &Edges) -> Hist1D {
        let axis = self.axis();
        for edge in edges.edges() {
            if !axis.has_edge(edge) {
                warn!("rebinning `{}`: new edge {edge} does not match any edge of the original binning", self.name);
            }
        }
        let mut out = Hist1D::new(self.name.clone(), edges.clone());
        let n = self.n_bins();
        let overflow = edges.n_bins() + 1;
        for (bin, value) in self.hist.values().enumerate() {
            let target = match bin {
                0                  => 0,
                b if b == n + 1    => overflow,
                b                  => edges.find_bin(axis.centre(b)),
            };
            if let Some(sum) = out.hist.value_at_index_mut(target) { *sum += value }
        }
        out.entries = self.entries;
        out
    }

    /// Regular bins as `(bin, low edge, high edge, content, error)`
    pub fn bins(&self) -> impl Iterator<Item = (Bin, f64, f64, f64, f64)> + '_ {
        let axis = self.axis();
        (1..=self.n_bins()).map(move |b| {
            (b, axis.lower_edge(b), axis.upper_edge(b), self.content(b), self.error(b))
        })
    }

    /// `(sum of weights, sum of weights * x, sum of weights * x^2, sum of squared weights)`
    /// over the regular bins, with x at bin centres.
    fn moments(&self) -> (f64, f64, f64, f64) {
        let axis = self.axis();
        (1..=self.n_bins()).fold((0.0, 0.0, 0.0, 0.0), |(s, sx, sxx, s2), b| {
            let (x, v) = (axis.centre(b), self.value(b));
            let w = v.sum();
            (s + w, sx + w * x, sxx + w * x * x, s2 + v.variance())
        })
    }

    /// Weighted mean of the bin centres; zero for an empty histogram
    pub fn mean(&self) -> f64 {
        let (s, sx, _, _) = self.moments();
        if s == 0.0 { 0.0 } else { sx / s }
    }

    pub fn std_dev(&self) -> f64 {
        let (s, sx, sxx, _) = self.moments();
        if s == 0.0 { return 0.0 }
        let mean = sx / s;
        (sxx / s - mean * mean).max(0.0).sqrt()
    }

    /// Effective number of entries: `(sum w)^2 / sum w^2`
    pub fn effective_entries(&self) -> f64 {
        let (s, _, _, s2) = self.moments();
        if s2 == 0.0 { 0.0 } else { s * s / s2 }
    }

    pub fn mean_error(&self) -> f64 {
        let neff = self.effective_entries();
        if neff == 0.0 { 0.0 } else { self.std_dev() / neff.sqrt() }
    }

    /// Error on the standard deviation, assuming a Gaussian distribution
    pub fn std_dev_error(&self) -> f64 {
        let neff = self.effective_entries();
        if neff == 0.0 { 0.0 } else { self.std_dev() / (2.0 * neff).sqrt() }
    }
}

#[cfg(test)]
mod test_hist1d {
    use super::*;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn edges(e: &[f64]) -> Edges { Edges::new(e.iter().copied()).unwrap() }

    /// Contents 1, 2, 3, 4 in four 10-wide bins, plus 5 underflow and 7 overflow
    fn sample() -> Hist1D {
        Hist1D::from_parts("h", edges(&[0.0, 10.0, 20.0, 30.0, 40.0]),
                           vec![5.0, 1.0, 2.0, 3.0, 4.0, 7.0],
                           vec![5.0, 1.0, 2.0, 3.0, 4.0, 7.0],
                           22.0).unwrap()
    }

    #[test]
    fn fill_and_flows() {
        let mut h = Hist1D::new("h", edges(&[0.0, 1.0, 2.0]));
        h.fill(-1.0);
        h.fill(0.5);
        h.fill_with(1.5, 2.0);
        h.fill(2.0);
        h.fill(f64::NAN);
        assert_eq!((0..4).map(|b| h.content(b)).collect::<Vec<_>>(), vec![1.0, 1.0, 2.0, 1.0]);
        assert_float_eq!(h.error(2), 2.0, abs <= 1e-12);
        assert_eq!(h.entries(), 4.0);
    }

    #[test]
    fn tail_integrals() {
        let h = sample();
        assert_eq!(h.tail_integral(1).value, 10.0);
        assert_eq!(h.tail_integral(3).value,  7.0);
        assert_eq!(h.tail_integral(0).value, 15.0); // underflow included
        assert_eq!(h.tail_integral(5), Measurement::zero());
        assert_eq!(h.tail_integral(9), Measurement::zero());
        assert_float_eq!(h.tail_integral(3).error, 7.0_f64.sqrt(), abs <= 1e-12);
    }

    #[test]
    fn integral_from_includes_overflow() {
        let h = sample();
        assert_eq!(h.integral_from(3).value, 14.0);
        assert_eq!(h.integral_from(5).value,  7.0);
        assert_float_eq!(h.integral_from(3).error, 14.0_f64.sqrt(), abs <= 1e-12);
    }

    #[test]
    fn integral_range_is_clamped() {
        let h = sample();
        assert_eq!(h.integral_and_error(0, 1000).value, 22.0);
        assert_eq!(h.integral_and_error(3, 2), Measurement::zero());
    }

    #[test]
    fn set_bin_replaces_sums() {
        let mut h = sample();
        h.set_bin(2, Measurement::new(9.0, 3.0));
        assert_eq!(h.value(2), Weighted::new(9.0, 9.0));
        h.set_bin(99, Measurement::new(1.0, 1.0)); // ignored
        assert_eq!(h.content(99), 0.0);
    }

    #[test]
    fn rebin_merges_and_preserves_total() {
        let h = sample().rebin(&edges(&[0.0, 20.0, 40.0]));
        assert_eq!((0..4).map(|b| h.content(b)).collect::<Vec<_>>(), vec![5.0, 3.0, 7.0, 7.0]);
        assert_float_eq!(h.error(1), 3.0_f64.sqrt(), abs <= 1e-12);
    }

    #[test]
    fn rebin_outside_range_goes_to_flows() {
        let h = sample().rebin(&edges(&[10.0, 30.0]));
        assert_eq!((0..3).map(|b| h.content(b)).collect::<Vec<_>>(), vec![6.0, 5.0, 11.0]);
    }

    #[test]
    fn add_requires_same_binning() {
        let mut a = sample();
        a.add(&sample()).unwrap();
        assert_eq!(a.integral(), 20.0);
        assert_eq!(a.entries(), 44.0);
        assert_float_eq!(a.error(4), 8.0_f64.sqrt(), abs <= 1e-12);
        let other = Hist1D::new("other", edges(&[0.0, 1.0]));
        assert!(matches!(a.add(&other), Err(Error::Incompatible(_))));
    }

    #[test]
    fn scaling_squares_the_variance() {
        let h = sample().scaled(3.0);
        assert_eq!(h.value(4), Weighted::new(12.0, 36.0));
    }

    #[test]
    fn statistics() {
        let mut h = Hist1D::new("h", Edges::uniform(10, 0.0, 10.0).unwrap());
        h.fill(4.5);
        h.fill(6.5);
        assert_float_eq!(h.mean(), 5.5, abs <= 1e-12);
        assert_float_eq!(h.std_dev(), 1.0, abs <= 1e-12);
        assert_float_eq!(h.effective_entries(), 2.0, abs <= 1e-12);
        assert_float_eq!(h.std_dev_error(), 0.5, abs <= 1e-12);
        assert_float_eq!(h.mean_error(), 0.5_f64.sqrt(), abs <= 1e-12);
    }

    #[test]
    fn normalization() {
        let h = sample().normalized();
        assert_float_eq!(h.integral(), 1.0, abs <= 1e-12);
        let empty = Hist1D::new("e", edges(&[0.0, 1.0])).normalized();
        assert_eq!(empty.integral(), 0.0);
    }

    #[test]
    fn raw_form_defaults_to_poisson_errors() {
        let h: Hist1D = serde_json::from_str(r#"{"edges": [0, 1, 2], "contents": [0, 4, 9, 0]}"#).unwrap();
        assert_eq!(h.error(1), 2.0);
        assert_eq!(h.error(2), 3.0);
        assert_eq!(h.entries(), 13.0);
    }

    #[test]
    fn raw_form_checks_lengths() {
        let h: std::result::Result<Hist1D, _> = serde_json::from_str(r#"{"edges": [0, 1, 2], "contents": [1, 2]}"#);
        assert!(h.is_err());
    }

    #[test]
    fn raw_form_keeps_flows() {
        let raw = RawHist1D::from(sample());
        assert_eq!(raw.contents, vec![5.0, 1.0, 2.0, 3.0, 4.0, 7.0]);
        assert_eq!(raw.edges.edges(), vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        assert_eq!(Hist1D::try_from(raw).unwrap(), sample());
    }
}

// --------------------------------------------------------------------------------
/// Two-dimensional histogram. Global bin `ix + (nx + 2) * iy`, as in ROOT.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHist2D", into = "RawHist2D")]
pub struct Hist2D {
    pub name: String,
    hist: Storage2D,
    entries: f64,
}

/// On-disk form of [`Hist2D`]: `contents` is laid out with x varying
/// fastest and includes flow bins on both axes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHist2D {
    #[serde(default)]
    pub name: String,
    pub edges_x: Edges,
    pub edges_y: Edges,
    pub contents: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sumw2: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<f64>,
}

impl TryFrom<RawHist2D> for Hist2D {
    type Error = Error;
    fn try_from(RawHist2D { name, edges_x, edges_y, contents, sumw2, entries }: RawHist2D) -> Result<Self> {
        let n = edges_x.num_bins() * edges_y.num_bins();
        let sumw2 = sumw2.unwrap_or_else(|| contents.iter().map(|c| c.abs()).collect());
        if contents.len() != n || sumw2.len() != n {
            return Err(Error::Binning(format!(
                "`{name}`: expected {n} values including flows, got {} contents and {} sumw2",
                contents.len(), sumw2.len())));
        }
        check_sumw2(&name, &sumw2)?;
        let entries = entries.unwrap_or_else(|| contents.iter().sum());
        let mut hist = Hist2D::new(name, edges_x, edges_y);
        restore(&mut hist.hist, contents, sumw2);
        hist.entries = entries;
        Ok(hist)
    }
}

impl From<Hist2D> for RawHist2D {
    fn from(h: Hist2D) -> Self {
        let (edges_x, edges_y) = h.hist.axes().as_tuple().clone();
        let contents = h.hist.values().map(Weighted::sum).collect();
        let sumw2    = h.hist.values().map(Weighted::variance).collect();
        Self { name: h.name, edges_x, edges_y, contents, sumw2: Some(sumw2), entries: Some(h.entries) }
    }
}

impl Hist2D {

    pub fn new(name: impl Into<String>, x: Edges, y: Edges) -> Self {
        Self { name: name.into(), hist: ndhistogram!(x, y; Weighted), entries: 0.0 }
    }

    pub fn x_axis(&self) -> &Edges { &self.hist.axes().as_tuple().0 }
    pub fn y_axis(&self) -> &Edges { &self.hist.axes().as_tuple().1 }

    pub fn entries(&self) -> f64 { self.entries }

    fn value(&self, ix: Bin, iy: Bin) -> Weighted {
        let nx = self.x_axis().num_bins();
        if ix >= nx || iy >= self.y_axis().num_bins() { return Weighted::default() }
        self.hist.value_at_index(ix + nx * iy).copied().unwrap_or_default()
    }

    pub fn fill(&mut self, x: f64, y: f64) { self.fill_with(x, y, 1.0) }

    pub fn fill_with(&mut self, x: f64, y: f64, weight: f64) {
        if self.hist.axes().index(&(x, y)).is_some() {
            Histogram::fill_with(&mut self.hist, &(x, y), weight);
            self.entries += 1.0;
        }
    }

    pub fn content(&self, ix: Bin, iy: Bin) -> f64 { self.value(ix, iy).sum() }

    /// Project onto the x axis, summing the y bins selected by `y_bins`
    /// (`..` selects all of them, flows included).
    pub fn projection_x(&self, name: impl Into<String>, y_bins: impl RangeBounds<Bin>) -> Hist1D {
        let (first, last) = resolve(y_bins, self.y_axis().num_bins());
        let mut out = Hist1D::new(name, self.x_axis().clone());
        for iy in first..=last {
            for ix in 0..self.x_axis().num_bins() {
                if let Some(sum) = out.hist.value_at_index_mut(ix) { *sum += &self.value(ix, iy) }
            }
        }
        out.entries = out.hist.values().map(Weighted::sum).sum();
        out
    }

    /// Project onto the y axis, summing the x bins selected by `x_bins`
    pub fn projection_y(&self, name: impl Into<String>, x_bins: impl RangeBounds<Bin>) -> Hist1D {
        let (first, last) = resolve(x_bins, self.x_axis().num_bins());
        let mut out = Hist1D::new(name, self.y_axis().clone());
        for iy in 0..self.y_axis().num_bins() {
            for ix in first..=last {
                if let Some(sum) = out.hist.value_at_index_mut(iy) { *sum += &self.value(ix, iy) }
            }
        }
        out.entries = out.hist.values().map(Weighted::sum).sum();
        out
    }
}

/// Turn bin-range bounds into an inclusive `(first, last)` pair within
/// `0..n_total`. An empty selection has `first > last`.
fn resolve(range: impl RangeBounds<Bin>, n_total: usize) -> (Bin, Bin) {
    let first = match range.start_bound() {
        Bound::Included(&b) => b,
        Bound::Excluded(&b) => b + 1,
        Bound::Unbounded    => 0,
    };
    let last = match range.end_bound() {
        Bound::Included(&b) => b.min(n_total - 1),
        Bound::Excluded(&0) => return (1, 0),
        Bound::Excluded(&b) => (b - 1).min(n_total - 1),
        Bound::Unbounded    => n_total - 1,
    };
    (first, last)
}

use serde::{Serialize, Deserialize};

pub type Count        = f64;
pub type Rate         = f64; // Hz
pub type CrossSection = f64; // pb
pub type Luminosity   = f64; // Hz / pb
pub type Ratio        = f64;

/// Bin index following the ROOT convention: 0 is underflow, `1..=n` are the
/// regular bins, `n + 1` is overflow.
pub type Bin = usize;

/// Value reported when a rate estimate rests on too few counts.
pub const SENTINEL: f64 = -99.0;

/// A point with asymmetric errors in both coordinates: efficiency graphs and
/// every plotted series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub ex_low: f64,
    pub ex_high: f64,
    pub y: f64,
    pub ey_low: f64,
    pub ey_high: f64,
}

impl Point {
    /// At the centre of `[low, high)`, with half-width x errors and symmetric y errors
    pub fn in_bin(low: f64, high: f64, y: Measurement) -> Self {
        let half = (high - low) / 2.0;
        Self { x: low + half, ex_low: half, ex_high: half, y: y.value, ey_low: y.error, ey_high: y.error }
    }
}

/// A value together with its (symmetric) statistical uncertainty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
}

impl Measurement {

    pub fn new(value: f64, error: f64) -> Self { Self { value, error } }

    pub fn zero() -> Self { Self::default() }

    pub fn sentinel() -> Self { Self::new(SENTINEL, SENTINEL) }

    pub fn is_sentinel(&self) -> bool { self.value == SENTINEL && self.error == SENTINEL }

    /// Linear scaling: both value and error are multiplied by `factor`
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.value * factor, self.error * factor.abs())
    }

    /// Sum of values, with errors combined in quadrature
    pub fn sum<I: IntoIterator<Item = Measurement>>(items: I) -> Self {
        let (value, error2) = items.into_iter()
            .fold((0.0, 0.0), |(v, e2), m| (v + m.value, e2 + m.error * m.error));
        Self::new(value, error2.sqrt())
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} +/- {}", self.value, self.error)
    }
}

#[cfg(test)]
mod test_measurement {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn quadrature_sum() {
        let total = Measurement::sum([Measurement::new(1.0, 3.0), Measurement::new(2.0, 4.0)]);
        assert_float_eq!(total.value, 3.0, abs <= 1e-12);
        assert_float_eq!(total.error, 5.0, abs <= 1e-12);
    }

    #[test]
    fn empty_sum_is_zero() {
        assert_eq!(Measurement::sum(Vec::new()), Measurement::zero());
    }

    #[test]
    fn scaling_keeps_error_positive() {
        let m = Measurement::new(2.0, 0.5).scaled(-2.0);
        assert_eq!(m, Measurement::new(-4.0, 1.0));
    }
}

//! Efficiency graphs: bin-by-bin ratio of a selected subset to its inclusive
//! superset, with asymmetric binomial confidence intervals.

use log::debug;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::beta::inv_beta_reg;

use crate::axis::Edges;
use crate::error::{Error, Result};
use crate::histogram::Hist1D;
use crate::io::HistogramSource;
use crate::types::{Point, Ratio};

pub use crate::config::{EfficiencyDefinition, Source};

/// How the confidence interval on `k` passes out of `n` is estimated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Estimator {
    /// Exact frequentist interval from Beta quantiles
    #[default]
    ClopperPearson,
    /// Central interval of the Beta(k+1, n-k+1) posterior of a uniform prior
    Bayesian,
    /// Gaussian approximation, clipped to [0, 1]
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyGraph {
    pub name: String,
    /// Threshold on the triggering quantity, for projected numerators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub points: Vec<Point>,
}

impl EfficiencyGraph {
    pub fn without_x_errors(mut self) -> Self {
        for p in &mut self.points {
            p.ex_low  = 0.0;
            p.ex_high = 0.0;
        }
        self
    }
}

/// `p`-quantile of Beta(a, b): the inverse of the regularized incomplete beta function
fn beta_quantile(a: f64, b: f64, p: f64) -> Result<f64> {
    if !(a > 0.0 && b > 0.0 && a.is_finite() && b.is_finite() && (0.0..=1.0).contains(&p)) {
        return Err(Error::Efficiency(format!("no {p}-quantile for Beta({a}, {b})")));
    }
    Ok(inv_beta_reg(a, b, p))
}

/// `(efficiency, lower bound, upper bound)` for `k` passes out of `n > 0`
/// trials, at confidence level `cl`.
pub fn interval(k: f64, n: f64, estimator: Estimator, cl: f64) -> Result<(Ratio, Ratio, Ratio)> {
    let eff = k / n;
    let alpha = 1.0 - cl;
    let (low, high) = match estimator {
        Estimator::ClopperPearson => (
            if k > 0.0 { beta_quantile(k, n - k + 1.0, alpha / 2.0)? } else { 0.0 },
            if k < n   { beta_quantile(k + 1.0, n - k, 1.0 - alpha / 2.0)? } else { 1.0 },
        ),
        // At the boundaries the central interval would exclude the estimate:
        // use the one-sided interval instead
        Estimator::Bayesian => {
            let (a, b) = (k + 1.0, n - k + 1.0);
            if      k <= 0.0 { (0.0, beta_quantile(a, b, cl)?) }
            else if k >= n   { (beta_quantile(a, b, alpha)?, 1.0) }
            else             { (beta_quantile(a, b, alpha / 2.0)?, beta_quantile(a, b, 1.0 - alpha / 2.0)?) }
        }
        Estimator::Normal => {
            let z = Normal::new(0.0, 1.0)
                .map_err(|e| Error::Efficiency(e.to_string()))?
                .inverse_cdf(1.0 - alpha / 2.0);
            let delta = z * (eff * (1.0 - eff) / n).sqrt();
            ((eff - delta).max(0.0), (eff + delta).min(1.0))
        }
    };
    Ok((eff, low.min(eff), high.max(eff)))
}

/// Divide `num` by `den` bin by bin.
///
/// Bins with an empty denominator produce no point. Points sit at bin
/// centres with half-bin-width horizontal errors.
///
/// # Errors
/// Different binnings, a confidence level outside (0, 1), or a numerator
/// which is not a subset of the denominator.
pub fn divide(num: &Hist1D, den: &Hist1D, estimator: Estimator, cl: f64) -> Result<EfficiencyGraph> {
    if num.axis() != den.axis() {
        return Err(Error::Incompatible(format!("`{}` and `{}` have different binning", num.name, den.name)));
    }
    if !(cl > 0.0 && cl < 1.0) {
        return Err(Error::Efficiency(format!("confidence level {cl} is not in (0, 1)")));
    }
    let axis = den.axis();
    let mut points = Vec::with_capacity(den.n_bins());
    for bin in 1..=den.n_bins() {
        let (k, n) = (num.content(bin), den.content(bin));
        let tolerance = 1e-9 * n.abs().max(1.0);
        if k < -tolerance || k > n + tolerance {
            return Err(Error::Efficiency(format!(
                "bin {bin} of `{}`: {k} passing out of {n} total", num.name)));
        }
        if n <= 0.0 { continue }
        let (y, low, high) = interval(k.clamp(0.0, n), n, estimator, cl)?;
        let half = axis.width(bin) / 2.0;
        points.push(Point {
            x: axis.centre(bin), ex_low: half, ex_high: half,
            y, ey_low: y - low, ey_high: high - y,
        });
    }
    Ok(EfficiencyGraph { name: num.name.clone(), threshold: None, points })
}

/// The graphs of one definition for one file: one per threshold, or a
/// single one if the definition has no thresholds.
pub fn build(source: &dyn HistogramSource, def: &EfficiencyDefinition, edges: &Edges) -> Result<Vec<EfficiencyGraph>> {
    def.validate()?;
    let name_for = |t: Option<f64>| match t {
        Some(t) => format!("{}_{t}", def.name),
        None    => def.name.clone(),
    };
    let thresholds: Vec<Option<f64>> = if def.thresholds.is_empty() {
        vec![None]
    } else {
        def.thresholds.iter().copied().map(Some).collect()
    };

    let mut graphs = Vec::with_capacity(thresholds.len());
    for threshold in thresholds {
        let name = name_for(threshold);
        let (num, den) = match def.source {
            Source::H1 => (source.h1(&def.numerator)?, source.h1(&def.denominator)?),
            Source::Projection => {
                let num2 = source.h2(&def.numerator)?;
                let num = match threshold {
                    Some(t) => num2.projection_y(name.as_str(), num2.x_axis().find_bin(t)..),
                    None    => num2.projection_y(name.as_str(), ..),
                };
                (num, source.h2(&def.denominator)?.projection_y(format!("{name}_den"), ..))
            }
        };
        let mut num = num.rebin(edges);
        num.name = name;
        let den = den.rebin(edges);
        let graph = divide(&num, &den, def.estimator, def.cl)?;
        debug!("{}: {} points", graph.name, graph.points.len());
        let graph = EfficiencyGraph { threshold, ..graph };
        graphs.push(if def.zero_x_errors { graph.without_x_errors() } else { graph });
    }
    Ok(graphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn hist(contents: &[f64]) -> Hist1D {
        let n = contents.len();
        let mut sumw = vec![0.0];
        sumw.extend_from_slice(contents);
        sumw.push(0.0);
        Hist1D::from_parts("h", Edges::uniform(n, 0.0, 10.0 * n as f64).unwrap(),
                           sumw.clone(), sumw, contents.iter().sum()).unwrap()
    }

    #[test]
    fn skip_empty_denominator() {
        let g = divide(&hist(&[1.0, 0.0, 5.0]), &hist(&[2.0, 0.0, 10.0]), Estimator::ClopperPearson, 0.683).unwrap();
        assert_eq!(g.points.len(), 2);
        assert_eq!(g.points[0].x, 5.0);
        assert_eq!(g.points[1].x, 25.0);
        assert_eq!(g.points[1].ex_low, 5.0);
        assert_eq!(g.points[1].y, 0.5);
    }

    #[test]
    fn numerator_must_be_subset() {
        let result = divide(&hist(&[3.0]), &hist(&[2.0]), Estimator::ClopperPearson, 0.683);
        assert!(matches!(result, Err(Error::Efficiency(_))));
    }

    #[test]
    fn binning_must_match() {
        let result = divide(&hist(&[1.0]), &hist(&[1.0, 1.0]), Estimator::Normal, 0.683);
        assert!(matches!(result, Err(Error::Incompatible(_))));
    }

    #[test]
    fn clopper_pearson_reference_values() {
        // k = 0: upper limit is 1 - (alpha/2)^(1/n)
        let (eff, low, high) = interval(0.0, 10.0, Estimator::ClopperPearson, 0.683).unwrap();
        assert_eq!((eff, low), (0.0, 0.0));
        assert_float_eq!(high, 1.0 - (0.317_f64 / 2.0).powf(0.1), abs <= 1e-6);
        // k = n: lower limit is (alpha/2)^(1/n)
        let (eff, low, high) = interval(10.0, 10.0, Estimator::ClopperPearson, 0.683).unwrap();
        assert_eq!((eff, high), (1.0, 1.0));
        assert_float_eq!(low, (0.317_f64 / 2.0).powf(0.1), abs <= 1e-6);
    }

    #[rstest(/**/ k,    n,   expected_low,        expected_high,
             // Beta quantiles at (1 - 0.683) / 2 and (1 + 0.683) / 2
             case(1.0,  2.0, 0.082_666_908_914_761, 0.917_333_091_085_239),
             case(3.0, 10.0, 0.141_609_285_810_926, 0.508_362_076_487_068),
    )]
    fn clopper_pearson_inside(k: f64, n: f64, expected_low: f64, expected_high: f64) {
        let (_, low, high) = interval(k, n, Estimator::ClopperPearson, 0.683).unwrap();
        assert_float_eq!(low , expected_low , abs <= 1e-6);
        assert_float_eq!(high, expected_high, abs <= 1e-6);
    }

    #[test]
    fn beta_quantile_rejects_bad_parameters() {
        assert!(beta_quantile(0.0, 1.0, 0.5).is_err());
        assert!(beta_quantile(1.0, 1.0, 1.5).is_err());
        assert_float_eq!(beta_quantile(1.0, 1.0, 0.25).unwrap(), 0.25, abs <= 1e-12);
    }

    #[test]
    fn normal_approximation() {
        let (eff, low, high) = interval(50.0, 100.0, Estimator::Normal, 0.6826894921370859).unwrap();
        assert_eq!(eff, 0.5);
        assert_float_eq!(high - eff, 0.05, abs <= 1e-6);
        assert_float_eq!(eff - low , 0.05, abs <= 1e-6);
    }

    #[rstest(/**/ estimator,
             case(Estimator::ClopperPearson),
             case(Estimator::Bayesian),
             case(Estimator::Normal),
    )]
    fn interval_contains_estimate(estimator: Estimator) {
        for (k, n) in [(0.0, 1.0), (1.0, 1.0), (3.0, 7.0), (99.0, 100.0), (0.5, 2.5)] {
            let (eff, low, high) = interval(k, n, estimator, 0.683).unwrap();
            assert!(0.0 <= low && low <= eff && eff <= high && high <= 1.0,
                    "{estimator:?} k={k} n={n}: {low} {eff} {high}");
        }
    }

    #[test]
    fn bad_confidence_level() {
        assert!(divide(&hist(&[1.0]), &hist(&[2.0]), Estimator::Bayesian, 1.0).is_err());
    }

    #[test]
    fn zero_x_errors() {
        let g = divide(&hist(&[1.0]), &hist(&[2.0]), Estimator::ClopperPearson, 0.683).unwrap().without_x_errors();
        assert_eq!((g.points[0].ex_low, g.points[0].ex_high), (0.0, 0.0));
    }
}

//! Type-II (errors-in-both-variables) linear regression.
//!
//! Both `x` and `y` are noisy, so a single y-on-x regression attenuates the
//! slope. We run the within-direction regression both ways and combine:
//!
//! - reduced major axis: signed geometric mean of `a` (y on x) and `1/b'`
//!   (x on y, inverted)
//! - major axis: principal axis of the centred second moments
//! - arithmetic mean: slope between the means of the lower and upper halves
//!
//! The strategy is validated once at construction; invalid pairings never
//! reach the numerics.

use serde::{Deserialize, Serialize};

use crate::domain::{CombineMethod, WithinMethod};
use crate::error::{AppError, ensure_finite, ensure_same_len};
use crate::math::stats::{mean, median, pearson};
use crate::math::{ols, simple_design, wls};

/// Huber tuning constant.
pub const HUBER_T: f64 = 1.345;
const IRLS_MAX_ITER: usize = 50;
const IRLS_TOL: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct Type2Strategy {
    within: WithinMethod,
    combine: CombineMethod,
    intercept: bool,
    /// Per-observation weights for the y-on-x and x-on-y regressions.
    weights: Option<(Vec<f64>, Vec<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type2Result {
    pub method: CombineMethod,
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
    pub std_slope: Option<f64>,
    pub std_intercept: Option<f64>,
    pub predictions: Vec<f64>,
}

impl Type2Strategy {
    pub fn new(within: WithinMethod, combine: CombineMethod, intercept: bool) -> Result<Self, AppError> {
        if combine != CombineMethod::ReducedMajorAxis {
            if within != WithinMethod::Ols {
                return Err(AppError::config(format!(
                    "{} combination supports only OLS within-direction fits, got {within:?}",
                    combine.display_name()
                )));
            }
            if !intercept {
                return Err(AppError::config(format!(
                    "{} combination requires an intercept",
                    combine.display_name()
                )));
            }
        }
        Ok(Self {
            within,
            combine,
            intercept,
            weights: None,
        })
    }

    /// Weights for the two directional WLS fits.
    pub fn with_weights(mut self, y_on_x: Vec<f64>, x_on_y: Vec<f64>) -> Self {
        self.weights = Some((y_on_x, x_on_y));
        self
    }

    pub fn fit(&self, x: &[f64], y: &[f64]) -> Result<Type2Result, AppError> {
        ensure_same_len("x", x.len(), "y", y.len())?;
        ensure_finite("x", x)?;
        ensure_finite("y", y)?;
        if x.len() < 3 {
            return Err(AppError::invalid(format!(
                "type-II regression needs at least 3 points, got {}",
                x.len()
            )));
        }

        let result = match self.combine {
            CombineMethod::ReducedMajorAxis => self.reduced_major_axis(x, y)?,
            CombineMethod::MajorAxis => major_axis(x, y)?,
            CombineMethod::ArithmeticMean => arithmetic_mean(x, y)?,
        };
        tracing::debug!(
            method = self.combine.display_name(),
            slope = result.slope,
            intercept = result.intercept,
            r = result.r,
            "type-II regression"
        );
        Ok(result)
    }

    /// Slope of `dep` regressed on `indep` with the within-direction method.
    fn directional_slope(&self, indep: &[f64], dep: &[f64], weights: Option<&[f64]>) -> Result<f64, AppError> {
        let design = simple_design(indep, self.intercept);
        let beta = match self.within {
            WithinMethod::Ols => ols(&design, dep)?,
            WithinMethod::Wls => {
                let w = weights.ok_or_else(|| AppError::config("WLS requires per-observation weights"))?;
                ensure_same_len("weights", w.len(), "observations", dep.len())?;
                wls(&design, dep, w)?
            }
            WithinMethod::Rlm => huber_irls(indep, dep, self.intercept)?,
        };
        Ok(beta[beta.len() - 1])
    }

    fn reduced_major_axis(&self, x: &[f64], y: &[f64]) -> Result<Type2Result, AppError> {
        let (w_yx, w_xy) = match &self.weights {
            Some((a, b)) => (Some(a.as_slice()), Some(b.as_slice())),
            None => (None, None),
        };
        let a = self.directional_slope(x, y, w_yx)?;
        let b_raw = self.directional_slope(y, x, w_xy)?;
        if a == 0.0 || b_raw == 0.0 {
            return Err(AppError::numerical("directional regression has zero slope"));
        }
        let b = 1.0 / b_raw;
        if a.signum() != b.signum() {
            return Err(AppError::numerical(format!(
                "directional regressions disagree in sign (y on x {a}, inverted x on y {b})"
            )));
        }

        let slope = a.signum() * (a * b).sqrt();
        let intercept = match (self.intercept, self.within) {
            (false, _) => 0.0,
            (true, WithinMethod::Ols) => mean(y) - slope * mean(x),
            (true, _) => median(y) - slope * median(x),
        };
        let r = a.signum() * (a / b).sqrt();
        let predictions: Vec<f64> = x.iter().map(|v| slope * v + intercept).collect();

        let n = x.len() as f64;
        let sum_x: f64 = x.iter().sum();
        let sum_x2: f64 = x.iter().map(|v| v * v).sum();
        let den = n * sum_x2 - sum_x * sum_x;
        if den <= 0.0 {
            return Err(AppError::numerical("predictor has no spread"));
        }
        let s2 = y
            .iter()
            .zip(&predictions)
            .map(|(yi, pi)| (yi - pi) * (yi - pi))
            .sum::<f64>()
            / (n - 2.0);
        let std_intercept = if self.intercept {
            (sum_x2 * s2 / den).sqrt()
        } else {
            0.0
        };

        Ok(Type2Result {
            method: CombineMethod::ReducedMajorAxis,
            slope,
            intercept,
            r,
            std_slope: Some((n * s2 / den).sqrt()),
            std_intercept: Some(std_intercept),
            predictions,
        })
    }
}

fn major_axis(x: &[f64], y: &[f64]) -> Result<Type2Result, AppError> {
    let xm = mean(x);
    let ym = mean(y);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        sxx += (xi - xm) * (xi - xm);
        syy += (yi - ym) * (yi - ym);
        sxy += (xi - xm) * (yi - ym);
    }
    if sxy == 0.0 || sxx == 0.0 || syy == 0.0 {
        return Err(AppError::numerical("major axis is undefined for uncorrelated data"));
    }

    let diff = syy - sxx;
    let slope = (diff + (diff * diff + 4.0 * sxy * sxy).sqrt()) / (2.0 * sxy);
    let intercept = ym - slope * xm;
    let r = sxy / (sxx * syy).sqrt();

    let n = x.len() as f64;
    let std_slope = std_from_variance((slope / r).powi(2) * (1.0 - r * r) / n);
    let sigx = (sxx / (n - 1.0)).sqrt();
    let sigy = (syy / (n - 1.0)).sqrt();
    let i1 = (sigy - sigx * slope).powi(2);
    let i2 = 2.0 * sigx * sigy + (xm * xm * slope * (1.0 + r)) / (r * r);
    let std_intercept = std_from_variance((i1 + (1.0 - r) * slope * i2) / n);

    Ok(Type2Result {
        method: CombineMethod::MajorAxis,
        slope,
        intercept,
        r,
        std_slope,
        std_intercept,
        predictions: x.iter().map(|v| slope * v + intercept).collect(),
    })
}

/// Standard error from a variance estimate; `None` when the estimate is
/// negative or not finite.
fn std_from_variance(variance: f64) -> Option<f64> {
    (variance.is_finite() && variance >= 0.0).then(|| variance.sqrt())
}

fn arithmetic_mean(x: &[f64], y: &[f64]) -> Result<Type2Result, AppError> {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(std::cmp::Ordering::Equal));
    let half = x.len() / 2;
    let lower = &order[..half];
    let upper = &order[x.len() - half..];

    let avg = |idx: &[usize], v: &[f64]| idx.iter().map(|&i| v[i]).sum::<f64>() / idx.len() as f64;
    let dx = avg(upper, x) - avg(lower, x);
    if dx == 0.0 {
        return Err(AppError::numerical("halves share the same mean predictor"));
    }
    let slope = (avg(upper, y) - avg(lower, y)) / dx;
    let intercept = mean(y) - slope * mean(x);

    Ok(Type2Result {
        method: CombineMethod::ArithmeticMean,
        slope,
        intercept,
        r: pearson(x, y),
        std_slope: None,
        std_intercept: None,
        predictions: x.iter().map(|v| slope * v + intercept).collect(),
    })
}

/// Huber weights from residuals with MAD scale; `None` when the scale vanishes.
fn huber_weights(residuals: &[f64]) -> Option<Vec<f64>> {
    let centre = median(residuals);
    let abs_dev: Vec<f64> = residuals.iter().map(|r| (r - centre).abs()).collect();
    let scale = median(&abs_dev) / 0.6745;
    if scale.is_nan() || scale <= 1e-12 {
        return None;
    }
    let cutoff = HUBER_T * scale;
    Some(
        residuals
            .iter()
            .map(|r| if r.abs() <= cutoff { 1.0 } else { cutoff / r.abs() })
            .collect(),
    )
}

/// Huber-T M-estimator of `y` on `x` by iteratively reweighted least squares.
pub fn huber_irls(x: &[f64], y: &[f64], intercept: bool) -> Result<Vec<f64>, AppError> {
    let design = simple_design(x, intercept);
    let mut beta = ols(&design, y)?;
    for _ in 0..IRLS_MAX_ITER {
        let residuals: Vec<f64> = (0..y.len())
            .map(|i| y[i] - design.row(i).iter().zip(&beta).map(|(d, b)| d * b).sum::<f64>())
            .collect();
        let Some(weights) = huber_weights(&residuals) else {
            break;
        };
        let next = wls(&design, y, &weights)?;
        let change = next
            .iter()
            .zip(&beta)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        beta = next;
        if change <= IRLS_TOL * (1.0 + beta.iter().map(|b| b.abs()).fold(0.0, f64::max)) {
            break;
        }
    }
    Ok(beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.7 + 1.0).collect();
        let y = x.iter().map(|v| 2.5 * v - 1.0).collect();
        (x, y)
    }

    #[test]
    fn reduced_major_axis_recovers_noiseless_line_for_every_within_method() {
        let (x, y) = line();
        for within in [WithinMethod::Ols, WithinMethod::Wls, WithinMethod::Rlm] {
            let strategy = Type2Strategy::new(within, CombineMethod::ReducedMajorAxis, true)
                .unwrap()
                .with_weights(vec![1.0; x.len()], vec![2.0; x.len()]);
            let res = strategy.fit(&x, &y).unwrap();
            assert!((res.slope - 2.5).abs() < 1e-9, "{within:?}: {}", res.slope);
            assert!((res.intercept + 1.0).abs() < 1e-9, "{within:?}: {}", res.intercept);
            assert!((res.r - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn major_axis_and_arithmetic_mean_recover_line() {
        let (x, y) = line();
        for combine in [CombineMethod::MajorAxis, CombineMethod::ArithmeticMean] {
            let res = Type2Strategy::new(WithinMethod::Ols, combine, true)
                .unwrap()
                .fit(&x, &y)
                .unwrap();
            assert!((res.slope - 2.5).abs() < 1e-9, "{combine:?}");
            assert!((res.intercept + 1.0).abs() < 1e-9, "{combine:?}");
        }
    }

    #[test]
    fn arithmetic_mean_reports_no_standard_errors() {
        let (x, y) = line();
        let res = Type2Strategy::new(WithinMethod::Ols, CombineMethod::ArithmeticMean, true)
            .unwrap()
            .fit(&x, &y)
            .unwrap();
        assert_eq!(res.std_slope, None);
        assert_eq!(res.std_intercept, None);
    }

    #[test]
    fn invalid_pairings_are_rejected_at_construction() {
        assert!(Type2Strategy::new(WithinMethod::Rlm, CombineMethod::MajorAxis, true).is_err());
        assert!(Type2Strategy::new(WithinMethod::Ols, CombineMethod::ArithmeticMean, false).is_err());
        assert!(Type2Strategy::new(WithinMethod::Wls, CombineMethod::ReducedMajorAxis, false).is_ok());
    }

    #[test]
    fn wls_without_weights_is_a_config_error() {
        let (x, y) = line();
        let err = Type2Strategy::new(WithinMethod::Wls, CombineMethod::ReducedMajorAxis, true)
            .unwrap()
            .fit(&x, &y)
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rma_slope_is_geometric_mean_of_directional_slopes() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.2, 1.9, 3.4, 3.8, 5.1];
        let res = Type2Strategy::new(WithinMethod::Ols, CombineMethod::ReducedMajorAxis, true)
            .unwrap()
            .fit(&x, &y)
            .unwrap();
        let ols_slope = ols(&simple_design(&x, true), &y).unwrap()[1];
        assert!((res.slope - ols_slope / res.r).abs() < 1e-9);
        assert!((res.r - pearson(&x, &y)).abs() < 1e-9);
        assert!(res.std_slope.unwrap() > 0.0);
    }

    #[test]
    fn directional_slopes_of_opposite_sign_are_a_numerical_error() {
        // Rising first half, falling second half; each direction's weights
        // pick out one half.
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 1.0, 2.0, 2.0, 1.0, 0.0];
        let rising = vec![1.0, 1.0, 1.0, 1e-6, 1e-6, 1e-6];
        let falling = vec![1e-6, 1e-6, 1e-6, 1.0, 1.0, 1.0];
        let err = Type2Strategy::new(WithinMethod::Wls, CombineMethod::ReducedMajorAxis, true)
            .unwrap()
            .with_weights(rising, falling)
            .fit(&x, &y)
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("disagree in sign"), "{err}");
    }

    #[test]
    fn negative_variance_estimate_gives_no_standard_error() {
        assert_eq!(std_from_variance(-7e-14), None);
        assert_eq!(std_from_variance(f64::NAN), None);
        assert_eq!(std_from_variance(0.0), Some(0.0));
        assert_eq!(std_from_variance(4.0), Some(2.0));
    }

    #[test]
    fn major_axis_on_exact_descending_line_reports_no_negative_variance() {
        // Rounding pushes |r| just past 1 here, so both variance estimates
        // come out slightly negative.
        let res = Type2Strategy::new(WithinMethod::Ols, CombineMethod::MajorAxis, true)
            .unwrap()
            .fit(&[5.0, 4.0, 4.0], &[-2.0, 3.0, 3.0])
            .unwrap();
        assert!((res.slope + 5.0).abs() < 1e-9);
        assert_eq!(res.std_slope, None);
        assert_eq!(res.std_intercept, None);
    }

    #[test]
    fn huber_downweights_outlier() {
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.0 + 0.5 * v + if i % 2 == 0 { 0.05 } else { -0.05 })
            .collect();
        y[11] += 20.0;
        let robust = huber_irls(&x, &y, true).unwrap();
        let plain = ols(&simple_design(&x, true), &y).unwrap();
        assert!((robust[1] - 0.5).abs() < (plain[1] - 0.5).abs());
    }
}

//! Curve evaluation for Boothroyd / Klakow / Zhang.
//!
//! The fitter relies on a handful of primitive operations per model kind:
//! - evaluate `y(x)` in the direct or log domain
//! - parameter names and box constraints
//! - a cheap data-driven starting point for the nonlinear solver
//!
//! These are implemented here for each model kind.

use crate::domain::{FitDomain, ModelKind};
use crate::math::{Bounds, ols, simple_design};
use crate::math::stats::{median, quantile};

/// Smallest value accepted for strictly positive parameters (`c`, `C`).
pub const POSITIVE_FLOOR: f64 = 1e-12;

/// Boothroyd power law `c * x^k`.
pub fn boothroyd(x: f64, k: f64, c: f64) -> f64 {
    c * x.powf(k)
}

/// `log(c * x^k)`.
pub fn log_boothroyd(x: f64, k: f64, c: f64) -> f64 {
    k * x.ln() + c.ln()
}

/// Zhang saturating curve `1 / (exp(-(x+B)/C) + A)`.
pub fn zhang(x: f64, a: f64, b: f64, c: f64) -> f64 {
    1.0 / ((-(x + b) / c).exp() + a)
}

/// `log` of [`zhang`], computed as `-logaddexp(-(x+B)/C, log A)`.
pub fn log_zhang(x: f64, a: f64, b: f64, c: f64) -> f64 {
    -log_add_exp(-(x + b) / c, a.ln())
}

/// Closed-form inverse of [`zhang`]: the `x` at which the curve equals `y`.
///
/// Only meaningful for `0 < y < 1/A`; other inputs give NaN.
pub fn inv_zhang(y: f64, a: f64, b: f64, c: f64) -> f64 {
    c * (y / (1.0 - a * y)).ln() - b
}

fn log_add_exp(u: f64, v: f64) -> f64 {
    let hi = u.max(v);
    if hi == f64::NEG_INFINITY {
        return hi;
    }
    hi + (-(u - v).abs()).exp().ln_1p()
}

/// Parameter names in vector order.
pub fn param_names(model: ModelKind) -> &'static [&'static str] {
    match model {
        ModelKind::Boothroyd | ModelKind::Klakow => &["k", "c"],
        ModelKind::Zhang => &["A", "B", "C"],
    }
}

pub fn param_len(model: ModelKind) -> usize {
    param_names(model).len()
}

/// Box constraints used by the nonlinear fit.
pub fn bounds(model: ModelKind) -> Bounds {
    match model {
        ModelKind::Boothroyd | ModelKind::Klakow => Bounds {
            lower: vec![f64::NEG_INFINITY, POSITIVE_FLOOR],
            upper: vec![f64::INFINITY, f64::INFINITY],
        },
        ModelKind::Zhang => Bounds {
            lower: vec![1.0, f64::NEG_INFINITY, POSITIVE_FLOOR],
            upper: vec![f64::INFINITY, f64::INFINITY, f64::INFINITY],
        },
    }
}

/// Predict `y(x)` (or `log y(x)` for [`FitDomain::Log`]).
///
/// Returns NaN when `params` is shorter than `param_len(model)`.
pub(crate) fn predict(model: ModelKind, x: f64, params: &[f64], domain: FitDomain) -> f64 {
    if params.len() < param_len(model) {
        return f64::NAN;
    }
    match (model, domain) {
        (ModelKind::Boothroyd | ModelKind::Klakow, FitDomain::Direct) => {
            boothroyd(x, params[0], params[1])
        }
        (ModelKind::Boothroyd | ModelKind::Klakow, FitDomain::Log) => {
            log_boothroyd(x, params[0], params[1])
        }
        (ModelKind::Zhang, FitDomain::Direct) => zhang(x, params[0], params[1], params[2]),
        (ModelKind::Zhang, FitDomain::Log) => log_zhang(x, params[0], params[1], params[2]),
    }
}

/// Data-driven starting point for the nonlinear solver.
///
/// Both families linearise: `log y` is linear in `log x` for the power law,
/// and with `A = 1` the Zhang curve gives `log(1/y - 1) = -x/C - B/C`. We
/// solve those by OLS and fall back to neutral values when the linearisation
/// is not defined for the data.
pub fn initial_guess(model: ModelKind, x: &[f64], y: &[f64]) -> Vec<f64> {
    match model {
        ModelKind::Boothroyd | ModelKind::Klakow => {
            let usable = x.iter().zip(y).all(|(&a, &b)| a > 0.0 && b > 0.0);
            if usable {
                let lx: Vec<f64> = x.iter().map(|v| v.ln()).collect();
                let ly: Vec<f64> = y.iter().map(|v| v.ln()).collect();
                if let Ok(beta) = ols(&simple_design(&lx, true), &ly) {
                    return vec![beta[1], beta[0].exp().max(POSITIVE_FLOOR)];
                }
            }
            vec![-1.0, 1.0]
        }
        ModelKind::Zhang => {
            let spread = (quantile(x, 1.0) - quantile(x, 0.0)).abs();
            let fallback = vec![1.0, -median(x), (spread / 4.0).max(1.0)];
            let usable = y.iter().all(|&v| v > 0.0 && v < 1.0);
            if !usable {
                return fallback;
            }
            let z: Vec<f64> = y.iter().map(|v| (1.0 / v - 1.0).ln()).collect();
            match ols(&simple_design(x, true), &z) {
                Ok(beta) if beta[1] < 0.0 => {
                    let c = -1.0 / beta[1];
                    vec![1.0, -beta[0] * c, c.max(POSITIVE_FLOOR)]
                }
                _ => fallback,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_parameter_vector_predicts_nan() {
        assert!(predict(ModelKind::Zhang, 2.0, &[1.5, 0.0], FitDomain::Direct).is_nan());
        assert!(predict(ModelKind::Boothroyd, 2.0, &[-1.0], FitDomain::Log).is_nan());
        assert!((predict(ModelKind::Boothroyd, 2.0, &[-1.0, 1.0], FitDomain::Direct) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn log_forms_match_direct_forms() {
        for &x in &[0.5, 1.0, 3.0, 20.0] {
            let d = boothroyd(x, -1.3, 0.7);
            assert!((log_boothroyd(x, -1.3, 0.7) - d.ln()).abs() < 1e-12);
            let z = zhang(x, 1.5, -2.0, 0.8);
            assert!((log_zhang(x, 1.5, -2.0, 0.8) - z.ln()).abs() < 1e-12);
        }
    }

    #[test]
    fn log_zhang_stays_finite_far_in_the_tail() {
        // exp(-(x+B)/C) overflows here; the log-sum-exp form does not.
        let v = log_zhang(-2000.0, 1.0, 0.0, 1.0);
        assert!(v.is_finite());
        assert!((v + 2000.0).abs() < 1e-9);
    }

    #[test]
    fn zhang_inverse_round_trips() {
        let (a, b, c) = (1.25, -3.0, 1.7);
        for &y in &[0.05, 0.2, 0.5, 0.79] {
            let x = inv_zhang(y, a, b, c);
            assert!((zhang(x, a, b, c) - y).abs() < 1e-12, "y={y}");
        }
    }

    #[test]
    fn zhang_is_bounded_by_its_floor() {
        let a = 2.0;
        assert!(zhang(1e6, a, 0.0, 1.0) <= 1.0 / a);
    }

    #[test]
    fn boothroyd_guess_is_exact_on_power_law() {
        let x: Vec<f64> = (1..=8).map(|v| v as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| boothroyd(v, -0.8, 0.4)).collect();
        let g = initial_guess(ModelKind::Boothroyd, &x, &y);
        assert!((g[0] + 0.8).abs() < 1e-9);
        assert!((g[1] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn zhang_guess_is_exact_when_floor_is_one() {
        let x: Vec<f64> = (0..10).map(|v| v as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| zhang(v, 1.0, -4.0, 2.0)).collect();
        let g = initial_guess(ModelKind::Zhang, &x, &y);
        assert!((g[1] + 4.0).abs() < 1e-8, "{g:?}");
        assert!((g[2] - 2.0).abs() < 1e-8, "{g:?}");
    }
}

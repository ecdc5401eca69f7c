//! Unstructured nonlinear fit of a single curve family.
//!
//! Given:
//! - predictor values `x_i`
//! - observed error rates `y_i`
//! - a model kind and a fit domain (direct or log)
//!
//! we minimise `Σ (t_i - f(x_i; p))^2`, where `t = y` (direct) or `t = log y`
//! (log) and `f` is the matching model form, with the bounded
//! Levenberg–Marquardt solver. The model's box constraints (`c > 0`,
//! `A >= 1`, `C > 0`) are always applied.
//!
//! Optionally the series is first resampled onto an even grid so dense
//! regions of the predictor do not dominate the objective.

use crate::data::resample;
use crate::domain::{FitDomain, FitQuality, FitReport, ModelKind};
use crate::error::{AppError, ensure_finite, ensure_same_len};
use crate::fit::bootstrap::Refit;
use crate::math::{LmOptions, levenberg_marquardt};
use crate::models::{bounds, initial_guess, param_len, param_names, predict};

#[derive(Debug, Clone)]
pub struct CurveFitOptions {
    pub domain: FitDomain,
    /// Starting parameters; a data-driven guess is used when absent.
    pub init: Option<Vec<f64>>,
    /// Resample onto this many evenly spaced points before fitting.
    pub resample: Option<usize>,
    pub lm: LmOptions,
}

impl Default for CurveFitOptions {
    fn default() -> Self {
        Self {
            domain: FitDomain::Log,
            init: None,
            resample: None,
            lm: LmOptions::default(),
        }
    }
}

/// Result of [`fit_curve`].
#[derive(Debug, Clone)]
pub struct CurveFit {
    pub model: ModelKind,
    pub domain: FitDomain,
    pub params: Vec<f64>,
    pub quality: FitQuality,
    pub iterations: usize,
    /// Predictor values actually fitted (after optional resampling).
    pub x: Vec<f64>,
    /// Fit-domain targets matching `x` (`y` or `log y`).
    pub target: Vec<f64>,
}

impl CurveFit {
    /// Predicted error rate at `x` (always in the direct domain).
    pub fn predict(&self, x: f64) -> f64 {
        predict(self.model, x, &self.params, FitDomain::Direct)
    }

    pub fn report(&self) -> FitReport {
        let names: Vec<String> = param_names(self.model).iter().map(|s| s.to_string()).collect();
        let mut report = FitReport::point_estimates(
            format!("{} ({:?} domain)", self.model.display_name(), self.domain),
            &names,
            &self.params,
        );
        report.quality = Some(self.quality);
        report
    }

    /// The fitted problem, ready to be refit on perturbed targets.
    pub fn estimator(&self, lm: LmOptions) -> CurveEstimator {
        CurveEstimator {
            model: self.model,
            domain: self.domain,
            x: self.x.clone(),
            lm,
        }
    }
}

fn validate_support(model: ModelKind, domain: FitDomain, x: &[f64], y: &[f64]) -> Result<(), AppError> {
    if matches!(model, ModelKind::Boothroyd | ModelKind::Klakow) {
        if let Some(i) = x.iter().position(|&v| v <= 0.0) {
            return Err(AppError::invalid(format!(
                "power-law predictor must be positive (x[{i}] = {})",
                x[i]
            )));
        }
    }
    if domain == FitDomain::Log {
        if let Some(i) = y.iter().position(|&v| v <= 0.0) {
            return Err(AppError::invalid(format!(
                "log-domain fit needs positive outcomes (y[{i}] = {})",
                y[i]
            )));
        }
    }
    Ok(())
}

/// Fit `model` to `(x, y)`.
pub fn fit_curve(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    opts: &CurveFitOptions,
) -> Result<CurveFit, AppError> {
    ensure_same_len("x", x.len(), "y", y.len())?;
    ensure_finite("x", x)?;
    ensure_finite("y", y)?;

    let (x, y) = match opts.resample {
        Some(n) => {
            let r = resample(x, y, n)?;
            (r.x, r.y)
        }
        None => (x.to_vec(), y.to_vec()),
    };
    validate_support(model, opts.domain, &x, &y)?;

    let m = param_len(model);
    if x.len() < m {
        return Err(AppError::invalid(format!(
            "{} needs at least {m} observations, got {}",
            model.display_name(),
            x.len()
        )));
    }

    let target: Vec<f64> = match opts.domain {
        FitDomain::Direct => y.clone(),
        FitDomain::Log => y.iter().map(|v| v.ln()).collect(),
    };
    let init = match &opts.init {
        Some(p) if p.len() != m => {
            return Err(AppError::config(format!(
                "{} takes {m} parameters, initial guess has {}",
                model.display_name(),
                p.len()
            )));
        }
        Some(p) => p.clone(),
        None => initial_guess(model, &x, &y),
    };

    let estimator = CurveEstimator {
        model,
        domain: opts.domain,
        x,
        lm: opts.lm,
    };
    let res = estimator.solve(&target, &init)?;
    tracing::debug!(
        model = model.display_name(),
        iterations = res.1,
        params = ?res.0,
        "curve fit converged"
    );

    let quality = FitQuality::from_residuals(&estimator.residuals(&target, &res.0));
    Ok(CurveFit {
        model,
        domain: opts.domain,
        params: res.0,
        quality,
        iterations: res.1,
        x: estimator.x,
        target,
    })
}

/// A curve family bound to fixed predictor values.
#[derive(Debug, Clone)]
pub struct CurveEstimator {
    model: ModelKind,
    domain: FitDomain,
    x: Vec<f64>,
    lm: LmOptions,
}

impl CurveEstimator {
    fn residuals(&self, target: &[f64], params: &[f64]) -> Vec<f64> {
        self.x
            .iter()
            .zip(target)
            .map(|(&x, &t)| t - predict(self.model, x, params, self.domain))
            .collect()
    }

    fn solve(&self, target: &[f64], init: &[f64]) -> Result<(Vec<f64>, usize), AppError> {
        let res = levenberg_marquardt(
            |p| self.residuals(target, p),
            init,
            &bounds(self.model),
            &self.lm,
        )?;
        Ok((res.params, res.iterations))
    }
}

impl Refit for CurveEstimator {
    fn predict(&self, params: &[f64]) -> Vec<f64> {
        self.x
            .iter()
            .map(|&x| predict(self.model, x, params, self.domain))
            .collect()
    }

    fn refit(&self, target: &[f64], init: &[f64]) -> Result<Vec<f64>, AppError> {
        self.solve(target, init).map(|(p, _)| p)
    }
}

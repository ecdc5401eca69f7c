//! Wild bootstrap for fitted curves.
//!
//! Residual variance of WER fits is strongly heteroskedastic in log space:
//! near-zero at low error rates, large at high ones. Resampling pairs would
//! mix those regimes, so we keep every observation in place and perturb its
//! own residual instead:
//!
//! ```text
//! r   = t - f(x, w)
//! t*  = f(x, w) + r ⊙ z,   z_i ~ N(0, 1) independently per observation
//! w*  = refit(t*)
//! ```
//!
//! Replicates are independent, so they run in parallel. Replicate `i` seeds
//! its own RNG from `(seed, i)`, which makes the result identical for any
//! thread count.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::domain::{FitReport, Uncertainty};
use crate::error::{AppError, ensure_finite, ensure_same_len};
use crate::math::stats::{mean, quantile_sorted, sample_std, sort_floats};

/// A fitted problem that can be evaluated and refit on a new target vector.
///
/// Implementors hold the predictor/design data; targets are in the fit
/// domain (e.g. `log y` for log-domain fits).
pub trait Refit: Sync {
    fn predict(&self, params: &[f64]) -> Vec<f64>;
    fn refit(&self, target: &[f64], init: &[f64]) -> Result<Vec<f64>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapOptions {
    pub replicates: usize,
    /// Two-sided confidence level, e.g. `0.95`.
    pub level: f64,
    pub seed: u64,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            replicates: 2000,
            level: 0.95,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSummary {
    pub uncertainties: Vec<Uncertainty>,
    pub replicates: usize,
    pub level: f64,
}

impl BootstrapSummary {
    /// Copy the per-coefficient summaries into `report` (same order).
    pub fn attach_to(&self, report: &mut FitReport) {
        for (coef, u) in report.coefficients.iter_mut().zip(&self.uncertainties) {
            coef.uncertainty = Some(*u);
        }
        report.level = Some(self.level);
        report.replicates = Some(self.replicates);
    }
}

/// SplitMix64 mix of a base seed and a replicate counter.
pub fn replicate_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn validate(opts: &BootstrapOptions) -> Result<(), AppError> {
    if opts.replicates < 2 {
        return Err(AppError::config(format!(
            "bootstrap needs at least 2 replicates, got {}",
            opts.replicates
        )));
    }
    if !(opts.level > 0.0 && opts.level < 1.0) {
        return Err(AppError::config(format!(
            "confidence level {} is outside (0, 1)",
            opts.level
        )));
    }
    Ok(())
}

/// Draw `opts.replicates` wild-bootstrap parameter vectors.
pub fn wild_bootstrap_replicates<M: Refit>(
    model: &M,
    params: &[f64],
    target: &[f64],
    opts: &BootstrapOptions,
) -> Result<Vec<Vec<f64>>, AppError> {
    validate(opts)?;
    let fitted = model.predict(params);
    ensure_same_len("target", target.len(), "fitted values", fitted.len())?;
    ensure_finite("fitted values", &fitted)?;
    let residuals: Vec<f64> = target.iter().zip(&fitted).map(|(t, f)| t - f).collect();

    tracing::debug!(
        replicates = opts.replicates,
        n = target.len(),
        seed = opts.seed,
        "running wild bootstrap"
    );

    (0..opts.replicates)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(replicate_seed(opts.seed, i as u64));
            let mut synthetic = Vec::with_capacity(fitted.len());
            for (f, r) in fitted.iter().zip(&residuals) {
                let z: f64 = StandardNormal.sample(&mut rng);
                synthetic.push(f + r * z);
            }
            model.refit(&synthetic, params)
        })
        .collect()
}

/// Standard error, bias and bias-corrected percentile interval per parameter.
pub fn summarize(
    estimate: &[f64],
    replicates: &[Vec<f64>],
    level: f64,
) -> Result<Vec<Uncertainty>, AppError> {
    if replicates.len() < 2 {
        return Err(AppError::config("bootstrap summary needs at least 2 replicates"));
    }
    if let Some(bad) = replicates.iter().find(|r| r.len() != estimate.len()) {
        return Err(AppError::invalid(format!(
            "replicate has {} parameters, estimate has {}",
            bad.len(),
            estimate.len()
        )));
    }
    let alpha = 1.0 - level;

    Ok(estimate
        .iter()
        .enumerate()
        .map(|(j, &w)| {
            let mut column: Vec<f64> = replicates.iter().map(|r| r[j]).collect();
            let bias = mean(&column) - w;
            let std_err = sample_std(&column);
            sort_floats(&mut column);
            Uncertainty {
                std_err,
                bias,
                ci_low: quantile_sorted(&column, alpha / 2.0) - bias,
                ci_high: quantile_sorted(&column, 1.0 - alpha / 2.0) - bias,
            }
        })
        .collect())
}

/// Replicates plus summary in one call; the replicate set is dropped here.
pub fn wild_bootstrap<M: Refit>(
    model: &M,
    params: &[f64],
    target: &[f64],
    opts: &BootstrapOptions,
) -> Result<BootstrapSummary, AppError> {
    let replicates = wild_bootstrap_replicates(model, params, target, opts)?;
    Ok(BootstrapSummary {
        uncertainties: summarize(params, &replicates, opts.level)?,
        replicates: replicates.len(),
        level: opts.level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `t = w0 + w1 * x`, refit by closed-form OLS.
    struct Line {
        x: Vec<f64>,
    }

    impl Refit for Line {
        fn predict(&self, p: &[f64]) -> Vec<f64> {
            self.x.iter().map(|x| p[0] + p[1] * x).collect()
        }

        fn refit(&self, t: &[f64], _init: &[f64]) -> Result<Vec<f64>, AppError> {
            let design = crate::math::simple_design(&self.x, true);
            crate::math::ols(&design, t)
        }
    }

    #[test]
    fn fewer_than_two_replicates_is_rejected() {
        let line = Line { x: vec![0.0, 1.0, 2.0] };
        let opts = BootstrapOptions {
            replicates: 1,
            ..BootstrapOptions::default()
        };
        let err = wild_bootstrap(&line, &[0.0, 1.0], &[0.0, 1.0, 2.0], &opts).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn perfect_fit_has_zero_spread() {
        let line = Line { x: vec![0.0, 1.0, 2.0, 3.0] };
        let t = [1.0, 3.0, 5.0, 7.0];
        let opts = BootstrapOptions {
            replicates: 50,
            ..BootstrapOptions::default()
        };
        let s = wild_bootstrap(&line, &[1.0, 2.0], &t, &opts).unwrap();
        for u in &s.uncertainties {
            assert!(u.std_err < 1e-9);
            assert!(u.bias.abs() < 1e-9);
        }
        assert!((s.uncertainties[1].ci_low - 2.0).abs() < 1e-9);
    }

    #[test]
    fn results_do_not_depend_on_scheduling() {
        let line = Line {
            x: (0..20).map(|i| i as f64).collect(),
        };
        let t: Vec<f64> = line
            .x
            .iter()
            .enumerate()
            .map(|(i, x)| 0.5 + 0.3 * x + if i % 2 == 0 { 0.2 } else { -0.2 })
            .collect();
        let params = line.refit(&t, &[]).unwrap();
        let opts = BootstrapOptions {
            replicates: 64,
            level: 0.9,
            seed: 11,
        };
        let a = wild_bootstrap_replicates(&line, &params, &t, &opts).unwrap();
        let b = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(|| wild_bootstrap_replicates(&line, &params, &t, &opts).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn interval_is_shifted_by_bias() {
        let estimate = [1.0];
        let replicates: Vec<Vec<f64>> = (0..=100).map(|i| vec![1.5 + i as f64 / 100.0]).collect();
        let u = summarize(&estimate, &replicates, 0.9).unwrap();
        assert!((u[0].bias - 1.0).abs() < 1e-12);
        assert!((u[0].ci_low - (1.55 - 1.0)).abs() < 1e-12);
        assert!((u[0].ci_high - (2.45 - 1.0)).abs() < 1e-12);
    }
}

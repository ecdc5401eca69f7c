//! Bounded Levenberg–Marquardt solver for small nonlinear least squares problems.
//!
//! We minimise `Σ r_i(p)^2` for a residual closure `r`. Each iteration solves
//! the damped system
//!
//! ```text
//! [    J    ]       [ -r ]
//! [ √λ · D  ]  δ  = [  0 ]
//! ```
//!
//! in the least squares sense (Marquardt scaling: `D = diag(‖J_j‖)`), projects
//! `p + δ` back onto the box constraints, and accepts the step only if the cost
//! decreases. The Jacobian is a forward difference that steps inward at an
//! upper bound.
//!
//! Termination:
//! - relative cost reduction of an accepted step `<= ftol`
//! - projected step length `<= xtol * (‖p‖ + xtol)`
//! - gradient `‖Jᵀr‖∞ <= gtol * (1 + cost)`
//!
//! Hitting `max_iter` without any of these is an error, never a partial result.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::ols::solve_least_squares;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e32;

/// Box constraints; use infinities for unbounded parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn unbounded(m: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; m],
            upper: vec![f64::INFINITY; m],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn project(&self, p: &mut [f64]) {
        for (j, v) in p.iter_mut().enumerate() {
            *v = v.clamp(self.lower[j], self.upper[j]);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub max_iter: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 500,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmResult {
    pub params: Vec<f64>,
    pub residuals: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn all_finite(r: &[f64]) -> bool {
    r.iter().all(|v| v.is_finite())
}

fn jacobian<F>(residual: &F, p: &[f64], r0: &[f64], bounds: &Bounds) -> Result<DMatrix<f64>, AppError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = r0.len();
    let m = p.len();
    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut probe = p.to_vec();
    for j in 0..m {
        let mut h = f64::EPSILON.sqrt() * p[j].abs().max(1.0);
        if p[j] + h > bounds.upper[j] {
            h = -h;
        }
        probe[j] = p[j] + h;
        let r1 = residual(&probe);
        probe[j] = p[j];
        if r1.len() != n || !all_finite(&r1) {
            return Err(AppError::numerical(format!(
                "non-finite residuals while differentiating parameter {j}"
            )));
        }
        for i in 0..n {
            jac[(i, j)] = (r1[i] - r0[i]) / h;
        }
    }
    Ok(jac)
}

/// Minimise `Σ residual(p)_i^2` starting from `init` within `bounds`.
pub fn levenberg_marquardt<F>(
    residual: F,
    init: &[f64],
    bounds: &Bounds,
    opts: &LmOptions,
) -> Result<LmResult, AppError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = init.len();
    if bounds.len() != m {
        return Err(AppError::config(format!(
            "{} bounds for {m} parameters",
            bounds.len()
        )));
    }
    if init.iter().any(|v| !v.is_finite()) {
        return Err(AppError::invalid("initial guess must be finite"));
    }

    let mut p = init.to_vec();
    bounds.project(&mut p);

    let mut r = residual(&p);
    if !all_finite(&r) {
        return Err(AppError::invalid(
            "initial guess gives non-finite residuals",
        ));
    }
    let n = r.len();
    if n < m {
        return Err(AppError::invalid(format!(
            "{n} observations cannot identify {m} parameters"
        )));
    }
    let mut sse = sum_sq(&r);
    let mut lambda = LAMBDA_INIT;

    for iter in 0..opts.max_iter {
        let jac = jacobian(&residual, &p, &r, bounds)?;
        let rv = DVector::from_column_slice(&r);
        let grad = jac.transpose() * &rv;
        if grad.amax() <= opts.gtol * (1.0 + sse) {
            tracing::debug!(iter, sse, "levenberg-marquardt converged (gradient)");
            return Ok(LmResult {
                params: p,
                residuals: r,
                sse,
                iterations: iter,
            });
        }

        let scale: Vec<f64> = (0..m)
            .map(|j| jac.column(j).norm().max(1e-12))
            .collect();
        let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();

        loop {
            let mut a = DMatrix::<f64>::zeros(n + m, m);
            a.view_mut((0, 0), (n, m)).copy_from(&jac);
            for j in 0..m {
                a[(n + j, j)] = lambda.sqrt() * scale[j];
            }
            let mut b = DVector::<f64>::zeros(n + m);
            for i in 0..n {
                b[i] = -r[i];
            }

            let Some(delta) = solve_least_squares(&a, &b) else {
                return Err(AppError::numerical("damped system is singular"));
            };

            let mut p_new: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
            bounds.project(&mut p_new);
            let step = p_new
                .iter()
                .zip(&p)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            if step <= opts.xtol * (p_norm + opts.xtol) {
                tracing::debug!(iter, sse, "levenberg-marquardt converged (step)");
                return Ok(LmResult {
                    params: p,
                    residuals: r,
                    sse,
                    iterations: iter,
                });
            }

            let r_new = residual(&p_new);
            let sse_new = sum_sq(&r_new);
            if all_finite(&r_new) && sse_new < sse {
                let reduction = (sse - sse_new) / sse.max(f64::MIN_POSITIVE);
                p = p_new;
                r = r_new;
                sse = sse_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if reduction <= opts.ftol || sse == 0.0 {
                    tracing::debug!(iter, sse, "levenberg-marquardt converged (cost)");
                    return Ok(LmResult {
                        params: p,
                        residuals: r,
                        sse,
                        iterations: iter + 1,
                    });
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(AppError::numerical(
                    "levenberg-marquardt could not reduce the cost",
                ));
            }
        }
    }

    Err(AppError::numerical(format!(
        "levenberg-marquardt did not converge in {} iterations",
        opts.max_iter
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exponential_decay() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = x.iter().map(|&t| 3.0 * (-0.7 * t).exp()).collect();
        let res = levenberg_marquardt(
            |p| x.iter().zip(&y).map(|(&t, &yi)| yi - p[0] * (-p[1] * t).exp()).collect(),
            &[1.0, 0.1],
            &Bounds::unbounded(2),
            &LmOptions::default(),
        )
        .unwrap();
        assert!((res.params[0] - 3.0).abs() < 1e-6, "{:?}", res.params);
        assert!((res.params[1] - 0.7).abs() < 1e-6, "{:?}", res.params);
    }

    #[test]
    fn respects_lower_bound() {
        // Unconstrained optimum is p = -2; the bound pins it at 0.
        let res = levenberg_marquardt(
            |p| vec![p[0] + 2.0, 0.5 * (p[0] + 2.0)],
            &[1.0],
            &Bounds {
                lower: vec![0.0],
                upper: vec![f64::INFINITY],
            },
            &LmOptions::default(),
        )
        .unwrap();
        assert!(res.params[0].abs() < 1e-9, "{:?}", res.params);
    }

    #[test]
    fn iteration_limit_is_an_error() {
        let opts = LmOptions {
            max_iter: 0,
            ..LmOptions::default()
        };
        let err = levenberg_marquardt(|p| vec![p[0] - 1.0, p[0] + 1.0], &[5.0], &Bounds::unbounded(1), &opts)
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}

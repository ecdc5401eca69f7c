//! Linear least squares solvers.
//!
//! Every linear problem in this crate is small and dense:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - Weighted problems scale rows by `sqrt(w_i)` and solve an ordinary problem.
//! - We use SVD so tall (more rows than columns) and near-singular design
//!   matrices are handled without panicking.
//!   (Nalgebra's `QR::solve` is intended for square systems.)
//! - The Levenberg–Marquardt solver reuses `solve_least_squares` for its damped
//!   normal equations by stacking the damping rows under the Jacobian.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ordinary least squares on a row-major design.
pub fn ols(design: &DMatrix<f64>, y: &[f64]) -> Result<Vec<f64>, AppError> {
    if design.nrows() != y.len() {
        return Err(AppError::invalid(format!(
            "design has {} rows but outcome has {} values",
            design.nrows(),
            y.len()
        )));
    }
    if design.nrows() < design.ncols() {
        return Err(AppError::invalid(format!(
            "{} observations cannot identify {} coefficients",
            design.nrows(),
            design.ncols()
        )));
    }
    let yv = DVector::from_column_slice(y);
    solve_least_squares(design, &yv)
        .map(|b| b.iter().copied().collect())
        .ok_or_else(|| AppError::numerical("least squares system is singular"))
}

/// Weighted least squares; weights must be finite and non-negative.
pub fn wls(design: &DMatrix<f64>, y: &[f64], weights: &[f64]) -> Result<Vec<f64>, AppError> {
    if weights.len() != y.len() {
        return Err(AppError::invalid(format!(
            "{} weights for {} observations",
            weights.len(),
            y.len()
        )));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(AppError::invalid("weights must be finite and non-negative"));
    }
    let mut xw = design.clone();
    let mut yw = Vec::with_capacity(y.len());
    for (i, (&yi, &wi)) in y.iter().zip(weights).enumerate() {
        let sw = wi.sqrt();
        for j in 0..xw.ncols() {
            xw[(i, j)] *= sw;
        }
        yw.push(yi * sw);
    }
    ols(&xw, &yw)
}

/// Design matrix `[1, x]` (with intercept) or `[x]` (through the origin).
pub fn simple_design(x: &[f64], intercept: bool) -> DMatrix<f64> {
    if intercept {
        DMatrix::from_fn(x.len(), 2, |i, j| if j == 0 { 1.0 } else { x[i] })
    } else {
        DMatrix::from_fn(x.len(), 1, |i, _| x[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn wls_ignores_zero_weight_outlier() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 100.0];
        let beta = wls(&simple_design(&x, true), &y, &[1.0, 1.0, 1.0, 0.0]).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ols_rejects_underdetermined_design() {
        let design = simple_design(&[1.0], true);
        assert!(ols(&design, &[1.0]).is_err());
    }
}

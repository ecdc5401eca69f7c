//! Natural cubic interpolating spline.
//!
//! Second derivatives `M_i` at the knots solve the tridiagonal system
//!
//! ```text
//! h_{i-1} M_{i-1} + 2 (h_{i-1} + h_i) M_i + h_i M_{i+1}
//!     = 6 ((y_{i+1} - y_i) / h_i - (y_i - y_{i-1}) / h_{i-1})
//! ```
//!
//! with `M_0 = M_{n-1} = 0`. Two knots degenerate to linear interpolation.
//! Outside `[x_0, x_{n-1}]` the end polynomials are extrapolated.

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    m: Vec<f64>,
}

impl CubicSpline {
    /// Build a natural spline through knots with strictly increasing `x`.
    pub fn natural(x: &[f64], y: &[f64]) -> Result<Self, AppError> {
        let n = x.len();
        if n != y.len() {
            return Err(AppError::invalid("spline knots: x and y differ in length"));
        }
        if n < 2 {
            return Err(AppError::invalid("spline needs at least 2 knots"));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AppError::invalid("spline knots must be strictly increasing"));
        }

        let mut m = vec![0.0; n];
        if n > 2 {
            // Thomas algorithm over the interior knots 1..n-1.
            let k = n - 2;
            let mut diag = vec![0.0; k];
            let mut upper = vec![0.0; k];
            let mut rhs = vec![0.0; k];
            for i in 1..n - 1 {
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                diag[i - 1] = 2.0 * (h0 + h1);
                upper[i - 1] = h1;
                rhs[i - 1] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
            }
            for i in 1..k {
                let lower = x[i + 1] - x[i];
                let w = lower / diag[i - 1];
                diag[i] -= w * upper[i - 1];
                rhs[i] -= w * rhs[i - 1];
            }
            m[k] = rhs[k - 1] / diag[k - 1];
            for i in (0..k - 1).rev() {
                m[i + 1] = (rhs[i] - upper[i] * m[i + 2]) / diag[i];
            }
        }

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    pub fn eval(&self, t: f64) -> f64 {
        let n = self.x.len();
        let i = self
            .x
            .partition_point(|&xi| xi <= t)
            .saturating_sub(1)
            .min(n - 2);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_knots() {
        let x = [0.0, 1.0, 2.5, 4.0, 5.0];
        let y = [1.0, -1.0, 0.5, 2.0, 0.0];
        let s = CubicSpline::natural(&x, &y).unwrap();
        for (&xi, &yi) in x.iter().zip(&y) {
            assert!((s.eval(xi) - yi).abs() < 1e-12);
        }
    }

    #[test]
    fn reproduces_straight_lines() {
        let x = [0.0, 1.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 1.0).collect();
        let s = CubicSpline::natural(&x, &y).unwrap();
        assert!((s.eval(2.0) - 3.0).abs() < 1e-12);
        assert!((s.eval(0.5) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_repeated_knots() {
        assert!(CubicSpline::natural(&[0.0, 0.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
    }
}

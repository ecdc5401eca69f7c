//! Even resampling of scattered `(x, y)` observations.
//!
//! Fitting directly on raw points over-weights densely sampled regions of the
//! predictor. We regularise by interpolating a natural cubic spline through
//! the deduplicated points and sampling it on an even grid.

use crate::error::{AppError, ensure_finite, ensure_same_len};
use crate::math::CubicSpline;

/// Evenly spaced resampling of `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Stable-sort by `x`, keep the first `y` per unique `x`.
pub fn sort_dedup(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut xs: Vec<f64> = Vec::with_capacity(x.len());
    let mut ys: Vec<f64> = Vec::with_capacity(y.len());
    for i in order {
        if xs.last() == Some(&x[i]) {
            continue;
        }
        xs.push(x[i]);
        ys.push(y[i]);
    }
    (xs, ys)
}

/// Spline-resample `(x, y)` onto `n` evenly spaced points over `[min x, max x]`.
pub fn resample(x: &[f64], y: &[f64], n: usize) -> Result<Resampled, AppError> {
    ensure_same_len("x", x.len(), "y", y.len())?;
    ensure_finite("x", x)?;
    ensure_finite("y", y)?;
    if n < 2 {
        return Err(AppError::invalid("resampling needs a target count of at least 2"));
    }

    let (xs, ys) = sort_dedup(x, y);
    if xs.len() < 2 {
        return Err(AppError::invalid(format!(
            "resampling needs at least 2 distinct x values, got {}",
            xs.len()
        )));
    }

    let spline = CubicSpline::natural(&xs, &ys)?;
    let lo = xs[0];
    let hi = xs[xs.len() - 1];
    let step = (hi - lo) / (n as f64 - 1.0);

    let grid: Vec<f64> = (0..n)
        .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
        .collect();
    let values = grid.iter().map(|&t| spline.eval(t)).collect();

    tracing::debug!(points = x.len(), distinct = xs.len(), n, "resampled series");
    Ok(Resampled { x: grid, y: values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_keep_first_y_in_input_order() {
        let (xs, ys) = sort_dedup(&[2.0, 1.0, 2.0, 0.0], &[20.0, 10.0, 99.0, 0.0]);
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
        assert_eq!(ys, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn grid_is_even_and_spans_the_range() {
        let x = [3.0, 1.0, 2.0, 5.0];
        let y = [9.0, 1.0, 4.0, 25.0];
        let out = resample(&x, &y, 9).unwrap();
        assert_eq!(out.x[0], 1.0);
        assert_eq!(out.x[8], 5.0);
        for w in out.x.windows(2) {
            assert!((w[1] - w[0] - 0.5).abs() < 1e-12);
        }
        assert!((out.y[0] - 1.0).abs() < 1e-12);
        assert!((out.y[8] - 25.0).abs() < 1e-12);
    }

    #[test]
    fn single_distinct_x_is_rejected() {
        assert!(resample(&[1.0, 1.0], &[0.1, 0.2], 5).is_err());
    }

    #[test]
    fn non_finite_input_is_rejected() {
        assert!(resample(&[1.0, f64::NAN], &[0.1, 0.2], 5).is_err());
    }
}

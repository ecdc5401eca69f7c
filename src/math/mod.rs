//! Mathematical utilities: least squares (linear and nonlinear), splines, statistics.

pub mod lm;
pub mod ols;
pub mod spline;
pub mod stats;

pub use lm::*;
pub use ols::*;
pub use spline::*;

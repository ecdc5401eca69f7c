//! Data preparation: turn per-observation tables into fit-ready series.
//!
//! - `aggregate`: length-weighted group means
//! - `binning`: value / rank binning with quantile trimming
//! - `resample`: spline resampling onto an even grid

pub mod aggregate;
pub mod binning;
pub mod resample;

pub use aggregate::*;
pub use binning::*;
pub use resample::*;

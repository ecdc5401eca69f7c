//! Fitting engines and inference.
//!
//! Responsibilities:
//!
//! - unstructured nonlinear curve fits (`curve`)
//! - per-bin structured power-law fits through explicit design matrices
//!   (`design`, `structured`)
//! - wild-bootstrap uncertainty for any refittable estimator (`bootstrap`)
//! - errors-in-both-variables linear regression (`type2`)

pub mod bootstrap;
pub mod curve;
pub mod design;
pub mod structured;
pub mod type2;

pub use bootstrap::*;
pub use curve::*;
pub use design::*;
pub use structured::*;
pub use type2::*;

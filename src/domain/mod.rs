//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the in-memory table model (`Table`, `Record`, `Value`)
//! - method and model selection enums (`ModelKind`, `FitDomain`, `WithinMethod`, ...)
//! - fit outputs (`FitReport`, `CoefficientEstimate`, `FitQuality`)

pub mod table;
pub mod types;

pub use table::*;
pub use types::*;

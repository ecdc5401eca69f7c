//! Input/output helpers (the only file access in the crate).
//!
//! - CSV ingest into tables (`ingest`)
//! - table / report exports as CSV or JSON (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;

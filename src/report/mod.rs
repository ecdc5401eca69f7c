//! Reporting: terminal formatting of fits, bins and tables.

pub mod format;

pub use format::*;

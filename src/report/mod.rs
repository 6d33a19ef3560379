//! Reporting utilities: formatted terminal output for `track` and `inspect`.
//!
//! We keep formatting code in one place so the pipeline stays free of
//! presentation concerns.

pub mod format;

pub use format::*;

//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the parsed accuracy report (`AccuracyReport`, `ReportKey`)
//! - parameters loaded from `params.yaml` (`Params`, `TrainParams`, ...)
//! - per-epoch values and pipeline flags (`EpochStep`, `PipelineOptions`)

pub mod types;

pub use types::*;

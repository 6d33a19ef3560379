//! `spamtrack` library crate.
//!
//! The binary (`spamtrack`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - tracking backends can be reused by other tools in the workflow
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod replay;
pub mod report;
pub mod tracking;

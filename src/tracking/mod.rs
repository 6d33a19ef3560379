//! Experiment tracking.
//!
//! Everything the pipeline emits goes through [`MetricEmitter`]. Concrete
//! backends additionally implement [`TrackingBackend`] so that a
//! [`RunLifecycle`] can open and close runs on them.
//!
//! - `config`: explicit tracking configuration (URI, experiment, run name, ...)
//! - `fanout`: best-effort delivery to several emitters
//! - `lifecycle`: per-backend run state and scoped open/close
//! - `local`: DVCLive-style experiment directory
//! - `remote`: MLflow REST client

use crate::domain::RunStatus;
use crate::error::AppError;

pub mod config;
pub mod fanout;
pub mod lifecycle;
pub mod local;
pub mod remote;

pub use config::TrackingConfig;
pub use fanout::FanOut;
pub use lifecycle::{BackendSummary, LifecycleReport, Run, RunLifecycle, RunState};
pub use local::LocalBackend;
pub use remote::MlflowBackend;

/// Sink for run parameters and metrics.
pub trait MetricEmitter {
    /// Short name used in logs and summaries.
    fn name(&self) -> &str;

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), AppError>;

    /// Record a metric value.
    ///
    /// `step` indexes a time series on backends that support it. Backends
    /// without stepped metrics ignore it and append at their own cursor.
    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<(), AppError>;

    /// Advance the backend's step cursor, if it has one.
    fn next_step(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

/// A backend that hosts runs.
pub trait TrackingBackend: MetricEmitter {
    fn start_run(&mut self, run_name: &str) -> Result<(), AppError>;

    /// Finalize the active run.
    fn end_run(&mut self, status: RunStatus) -> Result<(), AppError>;
}

impl<T: MetricEmitter + ?Sized> MetricEmitter for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        (**self).log_param(key, value)
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<(), AppError> {
        (**self).log_metric(key, value, step)
    }

    fn next_step(&mut self) -> Result<(), AppError> {
        (**self).next_step()
    }
}

//! Run lifecycle across one or more tracking backends.
//!
//! Each backend gets its own [`Run`], which moves through
//! `Unopened -> Open -> Closed`. A [`RunLifecycle`] owns the runs for one
//! pipeline invocation and closes all of them on the way out, innermost first,
//! whether the body succeeded, failed, or unwound.

use crate::domain::RunStatus;
use crate::error::AppError;
use crate::tracking::{FanOut, MetricEmitter, TrackingBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Unopened,
    Open,
    Closed(RunStatus),
}

/// One tracking session on one backend.
pub struct Run {
    backend: Box<dyn TrackingBackend>,
    state: RunState,
}

impl Run {
    pub fn new(backend: Box<dyn TrackingBackend>) -> Self {
        Self {
            backend,
            state: RunState::Unopened,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == RunState::Open
    }

    pub fn open(&mut self, run_name: &str) -> Result<(), AppError> {
        if self.state != RunState::Unopened {
            return Err(AppError::backend(format!(
                "{}: run cannot be reopened (state {:?}).",
                self.backend.name(),
                self.state
            )));
        }
        self.backend.start_run(run_name)?;
        self.state = RunState::Open;
        Ok(())
    }

    /// Close the run. Closing a run that is not open is a no-op.
    ///
    /// The run counts as closed even if the backend reports an error while
    /// finalizing; the error is returned for reporting.
    pub fn close(&mut self, status: RunStatus) -> Result<(), AppError> {
        if self.state != RunState::Open {
            return Ok(());
        }
        self.state = RunState::Closed(status);
        self.backend.end_run(status)
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AppError::backend(format!(
                "{}: no open run (state {:?}).",
                self.backend.name(),
                self.state
            )))
        }
    }
}

impl MetricEmitter for Run {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        self.ensure_open()?;
        self.backend.log_param(key, value)
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<(), AppError> {
        self.ensure_open()?;
        self.backend.log_metric(key, value, step)
    }

    fn next_step(&mut self) -> Result<(), AppError> {
        self.ensure_open()?;
        self.backend.next_step()
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        if let Err(err) = self.close(RunStatus::Killed) {
            tracing::warn!(backend = self.backend.name(), "closing run on drop failed: {err}");
        }
    }
}

/// Per-backend outcome of a lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSummary {
    pub backend: String,
    /// Error raised while opening the run; the backend was then left out.
    pub open_error: Option<String>,
    /// Deliveries that failed while the run was open.
    pub failures: u64,
    pub status: Option<RunStatus>,
    pub close_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleReport {
    pub run_name: String,
    pub backends: Vec<BackendSummary>,
}

impl LifecycleReport {
    pub fn opened(&self) -> usize {
        self.backends.iter().filter(|b| b.open_error.is_none()).count()
    }
}

/// Runs opened together for one pipeline invocation.
///
/// Acts as the pipeline's [`MetricEmitter`], fanning out to every open run.
pub struct RunLifecycle {
    run_name: String,
    runs: FanOut<Run>,
    /// Backends whose run failed to open, with the reason.
    skipped: Vec<(String, String)>,
    report: Option<LifecycleReport>,
}

impl RunLifecycle {
    /// Open a run named `run_name` on every backend, in order.
    ///
    /// A backend that fails to open is reported and dropped; the others
    /// proceed.
    pub fn open(backends: Vec<Box<dyn TrackingBackend>>, run_name: &str) -> Self {
        let mut runs = FanOut::new(Vec::with_capacity(backends.len()));
        let mut skipped = Vec::new();

        for backend in backends {
            let mut run = Run::new(backend);
            match run.open(run_name) {
                Ok(()) => {
                    tracing::info!(backend = run.name(), run = run_name, "run opened");
                    runs.push(run);
                }
                Err(err) => {
                    tracing::warn!(backend = run.name(), "failed to open run: {err}");
                    skipped.push((run.name().to_string(), err.to_string()));
                }
            }
        }

        Self {
            run_name: run_name.to_string(),
            runs,
            skipped,
            report: None,
        }
    }

    /// Open runs, execute `body`, then close every run.
    ///
    /// Runs end `Finished` when `body` returns `Ok` and `Failed` otherwise. The
    /// body's error is returned after all runs are closed.
    pub fn scoped<T, F>(
        backends: Vec<Box<dyn TrackingBackend>>,
        run_name: &str,
        body: F,
    ) -> Result<(T, LifecycleReport), AppError>
    where
        F: FnOnce(&mut RunLifecycle) -> Result<T, AppError>,
    {
        let mut lifecycle = Self::open(backends, run_name);
        match body(&mut lifecycle) {
            Ok(value) => {
                let report = lifecycle.close(RunStatus::Finished);
                Ok((value, report))
            }
            Err(err) => {
                lifecycle.close(RunStatus::Failed);
                Err(err)
            }
        }
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Number of runs that are currently open.
    pub fn open_runs(&self) -> usize {
        self.runs.targets().iter().filter(|r| r.is_open()).count()
    }

    pub fn states(&self) -> Vec<(&str, RunState)> {
        self.runs
            .targets()
            .iter()
            .map(|r| (r.name(), r.state()))
            .collect()
    }

    /// Close every open run with `status`, innermost (last opened) first.
    ///
    /// Calling this again returns the first report unchanged.
    pub fn close(&mut self, status: RunStatus) -> LifecycleReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let mut closed = Vec::with_capacity(self.runs.len());
        for run in self.runs.targets_mut().iter_mut().rev() {
            let close_error = run.close(status).err().map(|e| {
                tracing::warn!(backend = run.name(), "failed to close run: {e}");
                e.to_string()
            });
            let final_status = match run.state() {
                RunState::Closed(s) => Some(s),
                _ => None,
            };
            closed.push((final_status, close_error));
        }
        closed.reverse();

        let mut backends: Vec<BackendSummary> = self
            .skipped
            .iter()
            .map(|(name, reason)| BackendSummary {
                backend: name.clone(),
                open_error: Some(reason.clone()),
                failures: 0,
                status: None,
                close_error: None,
            })
            .collect();

        for ((name, failures), (status, close_error)) in self.runs.failures().into_iter().zip(closed) {
            backends.push(BackendSummary {
                backend: name.to_string(),
                open_error: None,
                failures,
                status,
                close_error,
            });
        }

        tracing::info!(run = %self.run_name, status = status.label(), "runs closed");

        let report = LifecycleReport {
            run_name: self.run_name.clone(),
            backends,
        };
        self.report = Some(report.clone());
        report
    }
}

impl MetricEmitter for RunLifecycle {
    fn name(&self) -> &str {
        &self.run_name
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        self.runs.log_param(key, value)
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<(), AppError> {
        self.runs.log_metric(key, value, step)
    }

    fn next_step(&mut self) -> Result<(), AppError> {
        self.runs.next_step()
    }
}

impl Drop for RunLifecycle {
    fn drop(&mut self) {
        if self.report.is_none() {
            self.close(RunStatus::Killed);
        }
    }
}

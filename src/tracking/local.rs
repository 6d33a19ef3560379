//! Local experiment log, laid out the way DVCLive lays out its directory.
//!
//! ```text
//! <dir>/
//!   params.yaml               logged parameters
//!   metrics.json              latest value of every metric, plus "step"
//!   run.json                  run name, status, start/end time
//!   plots/metrics/<name>.tsv  one row per logged value: timestamp, step, value
//! ```
//!
//! The backend keeps its own step cursor: the step passed to `log_metric` is
//! ignored and values are appended at the current cursor, which only moves on
//! `next_step`.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::RunStatus;
use crate::error::AppError;
use crate::tracking::{MetricEmitter, TrackingBackend};

const PLOTS_DIR: &str = "plots/metrics";

#[derive(Debug, Clone, Serialize)]
struct RunRecord {
    run_name: String,
    status: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    steps: u64,
}

pub struct LocalBackend {
    dir: PathBuf,
    step: u64,
    params: BTreeMap<String, String>,
    latest: BTreeMap<String, f64>,
    run: Option<RunRecord>,
}

impl LocalBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            step: 0,
            params: BTreeMap::new(),
            latest: BTreeMap::new(),
            run: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current step cursor.
    pub fn step(&self) -> u64 {
        self.step
    }

    fn plots_dir(&self) -> PathBuf {
        self.dir.join(PLOTS_DIR)
    }

    fn active_run(&self) -> Result<&RunRecord, AppError> {
        self.run
            .as_ref()
            .ok_or_else(|| AppError::backend("local: no active run."))
    }

    fn write_params(&self) -> Result<(), AppError> {
        let path = self.dir.join("params.yaml");
        let yaml = serde_yaml::to_string(&self.params)
            .map_err(|e| AppError::backend(format!("local: failed to encode params: {e}")))?;
        fs::write(&path, yaml).map_err(|e| io_error("write", &path, e))
    }

    fn write_metrics(&self) -> Result<(), AppError> {
        let mut summary = serde_json::Map::new();
        summary.insert("step".to_string(), self.step.into());
        for (key, value) in &self.latest {
            summary.insert(key.clone(), serde_json::json!(value));
        }

        let path = self.dir.join("metrics.json");
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| AppError::backend(format!("local: failed to encode metrics: {e}")))?;
        fs::write(&path, json).map_err(|e| io_error("write", &path, e))
    }

    fn write_run(&self, record: &RunRecord) -> Result<(), AppError> {
        let path = self.dir.join("run.json");
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| AppError::backend(format!("local: failed to encode run record: {e}")))?;
        fs::write(&path, json).map_err(|e| io_error("write", &path, e))
    }

    fn append_row(&self, key: &str, value: f64) -> Result<(), AppError> {
        let path = self.plots_dir().join(format!("{key}.tsv"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("create", parent, e))?;
        }

        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error("open", &path, e))?;

        if is_new {
            let column = key.rsplit('/').next().unwrap_or(key);
            writeln!(file, "timestamp\tstep\t{column}").map_err(|e| io_error("write", &path, e))?;
        }
        writeln!(
            file,
            "{}\t{}\t{}",
            Utc::now().timestamp_millis(),
            self.step,
            value
        )
        .map_err(|e| io_error("write", &path, e))
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::backend(format!("local: failed to {action} '{}': {err}", path.display()))
}

impl MetricEmitter for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        self.active_run()?;
        self.params.insert(key.to_string(), value.to_string());
        self.write_params()
    }

    fn log_metric(&mut self, key: &str, value: f64, _step: Option<u64>) -> Result<(), AppError> {
        self.active_run()?;
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AppError::backend(format!("local: invalid metric name '{key}'.")));
        }
        self.append_row(key, value)?;
        self.latest.insert(key.to_string(), value);
        Ok(())
    }

    fn next_step(&mut self) -> Result<(), AppError> {
        self.active_run()?;
        self.write_metrics()?;
        self.step += 1;
        Ok(())
    }
}

impl TrackingBackend for LocalBackend {
    fn start_run(&mut self, run_name: &str) -> Result<(), AppError> {
        if self.run.is_some() {
            return Err(AppError::backend("local: a run is already active."));
        }

        fs::create_dir_all(&self.dir).map_err(|e| io_error("create", &self.dir, e))?;

        // Each run starts a fresh history.
        let plots = self.plots_dir();
        if plots.exists() {
            fs::remove_dir_all(&plots).map_err(|e| io_error("clear", &plots, e))?;
        }
        fs::create_dir_all(&plots).map_err(|e| io_error("create", &plots, e))?;

        self.step = 0;
        self.params.clear();
        self.latest.clear();

        let record = RunRecord {
            run_name: run_name.to_string(),
            status: "running".to_string(),
            started_at: Utc::now(),
            ended_at: None,
            steps: 0,
        };
        self.write_run(&record)?;
        self.run = Some(record);

        tracing::debug!(dir = %self.dir.display(), "local run started");
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<(), AppError> {
        let mut record = self.active_run()?.clone();
        self.run = None;

        record.status = status.label().to_string();
        record.ended_at = Some(Utc::now());
        record.steps = self.step;

        let metrics = self.write_metrics();
        self.write_run(&record)?;
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn writes_dvclive_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::new(dir.path().join("dvclive"));

        backend.start_run("spam_run").unwrap();
        backend.log_param("epochs", "2").unwrap();
        for epoch in 0..2u64 {
            backend.log_metric("train_loss", 2.0 - epoch as f64, Some(epoch)).unwrap();
            backend.next_step().unwrap();
        }
        backend.end_run(RunStatus::Finished).unwrap();

        let root = dir.path().join("dvclive");
        let params: BTreeMap<String, String> =
            serde_yaml::from_str(&fs::read_to_string(root.join("params.yaml")).unwrap()).unwrap();
        assert_eq!(params.get("epochs").map(String::as_str), Some("2"));

        let metrics = read_json(&root.join("metrics.json"));
        assert_eq!(metrics["step"], 2);
        assert_eq!(metrics["train_loss"], 1.0);

        let tsv = fs::read_to_string(root.join("plots/metrics/train_loss.tsv")).unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], "timestamp\tstep\ttrain_loss");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("\t0\t2"));
        assert!(lines[2].ends_with("\t1\t1"));

        let run = read_json(&root.join("run.json"));
        assert_eq!(run["run_name"], "spam_run");
        assert_eq!(run["status"], "finished");
        assert_eq!(run["steps"], 2);
        assert!(!run["ended_at"].is_null());
    }

    #[test]
    fn ignores_caller_step_and_uses_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::new(dir.path());
        backend.start_run("r").unwrap();

        backend.log_metric("acc", 0.5, Some(40)).unwrap();
        backend.log_metric("acc", 0.6, None).unwrap();
        assert_eq!(backend.step(), 0);

        let tsv = fs::read_to_string(dir.path().join("plots/metrics/acc.tsv")).unwrap();
        assert!(tsv.lines().skip(1).all(|l| l.split('\t').nth(1) == Some("0")));
    }

    #[test]
    fn new_run_clears_previous_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::new(dir.path());

        backend.start_run("first").unwrap();
        backend.log_metric("acc", 0.5, None).unwrap();
        backend.end_run(RunStatus::Finished).unwrap();

        backend.start_run("second").unwrap();
        assert_eq!(backend.step(), 0);
        assert!(!dir.path().join("plots/metrics/acc.tsv").exists());
        backend.end_run(RunStatus::Failed).unwrap();

        let run = read_json(&dir.path().join("run.json"));
        assert_eq!(run["run_name"], "second");
        assert_eq!(run["status"], "failed");
    }

    #[test]
    fn requires_active_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::new(dir.path());
        assert!(backend.log_metric("acc", 0.5, None).is_err());
        assert!(backend.next_step().is_err());
        assert!(backend.end_run(RunStatus::Finished).is_err());
    }

    #[test]
    fn nested_metric_names_use_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::new(dir.path());
        backend.start_run("r").unwrap();
        backend.log_metric("train/loss", 0.25, None).unwrap();
        assert!(backend.log_metric("../escape", 1.0, None).is_err());

        let tsv = fs::read_to_string(dir.path().join("plots/metrics/train/loss.tsv")).unwrap();
        assert!(tsv.starts_with("timestamp\tstep\tloss\n"));
    }
}

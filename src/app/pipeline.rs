//! Shared tracking pipeline.
//!
//! One pipeline covers every variant of the workflow (local only, local +
//! remote, with or without the GB metric, optional or mandatory accuracy):
//! params -> accuracy report -> open runs -> log inputs -> replay -> close runs

use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::domain::{AccuracyReport, Params, PipelineOptions, ReportKey};
use crate::error::AppError;
use crate::io::{load_params, read_report};
use crate::replay::{ReplaySummary, replay_epochs};
use crate::tracking::{
    LifecycleReport, LocalBackend, MetricEmitter, MlflowBackend, RunLifecycle, TrackingBackend,
    TrackingConfig,
};

pub const SUMMARY_RF: &str = "rf_accuracy";
pub const SUMMARY_GB: &str = "gb_accuracy";

/// Everything a `spamtrack track` invocation needs.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub params_path: PathBuf,
    pub report_path: PathBuf,
    pub options: PipelineOptions,
    pub tracking: TrackingConfig,
    /// Seed for the loss noise; entropy when absent.
    pub seed: Option<u64>,
}

/// All outputs of a single tracking run.
#[derive(Debug, Clone)]
pub struct TrackOutput {
    pub params: Params,
    pub report: AccuracyReport,
    pub replay: ReplaySummary,
    pub lifecycle: LifecycleReport,
}

/// Load inputs, build the configured backends, and run the pipeline.
pub fn run_track(config: &TrackConfig) -> Result<TrackOutput, AppError> {
    let (params, report) = load_inputs(config)?;
    let backends = build_backends(config);
    run_track_with_backends(config, params, report, backends)
}

/// Load and validate the parameters and accuracy report.
///
/// Parameter errors are fatal. A missing report only becomes fatal when the
/// RF accuracy is mandatory.
pub fn load_inputs(config: &TrackConfig) -> Result<(Params, AccuracyReport), AppError> {
    let params = load_params(&config.params_path)?;
    let report = read_report(&config.report_path);

    if config.options.mandatory_accuracy {
        report.require_rf()?;
    }
    if report.is_empty() {
        tracing::warn!("accuracy report is empty; replaying zero accuracies");
    }

    Ok((params, report))
}

/// Backends selected by the pipeline options.
///
/// The local log is always present. A remote backend that cannot even be
/// constructed is reported and skipped.
pub fn build_backends(config: &TrackConfig) -> Vec<Box<dyn TrackingBackend>> {
    let mut backends: Vec<Box<dyn TrackingBackend>> =
        vec![Box::new(LocalBackend::new(config.tracking.local_dir.clone()))];

    if config.options.enable_remote_backend {
        match MlflowBackend::new(&config.tracking) {
            Ok(remote) => backends.push(Box::new(remote)),
            Err(err) => tracing::warn!("remote tracking disabled: {err}"),
        }
    }

    backends
}

/// Run the pipeline against an explicit set of backends.
pub fn run_track_with_backends(
    config: &TrackConfig,
    params: Params,
    report: AccuracyReport,
    backends: Vec<Box<dyn TrackingBackend>>,
) -> Result<TrackOutput, AppError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (replay, lifecycle) =
        RunLifecycle::scoped(backends, &config.tracking.run_name, |emitter| {
            log_inputs(emitter, &params, &report, &config.options)?;
            replay_epochs(&params.train, &report, &config.options, emitter, &mut rng)
        })?;

    Ok(TrackOutput {
        params,
        report,
        replay,
        lifecycle,
    })
}

/// Log parameters and the unstepped summary accuracies.
fn log_inputs<E: MetricEmitter + ?Sized>(
    emitter: &mut E,
    params: &Params,
    report: &AccuracyReport,
    options: &PipelineOptions,
) -> Result<(), AppError> {
    for (key, value) in params.tracked() {
        emitter.log_param(&key, &value)?;
    }

    emitter.log_metric(SUMMARY_RF, report.base_or_zero(ReportKey::Default), None)?;
    if options.enable_gb_metric {
        emitter.log_metric(SUMMARY_GB, report.base_or_zero(ReportKey::Gb), None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RunStatus, TrainParams};
    use crate::replay::{METRIC_GB, METRIC_LOSS, METRIC_RF};
    use crate::tracking::testing::{Event, Recorder};

    fn config(dir: &std::path::Path, options: PipelineOptions) -> TrackConfig {
        TrackConfig {
            params_path: dir.join("params.yaml"),
            report_path: dir.join("predictions.txt"),
            options,
            tracking: TrackingConfig {
                local_dir: dir.join("dvclive"),
                ..TrackingConfig::default()
            },
            seed: Some(7),
        }
    }

    fn params(epochs: u32) -> Params {
        Params {
            train: TrainParams { epochs },
            data: None,
            model: None,
        }
    }

    #[test]
    fn logs_inputs_then_replays() {
        let dir = tempfile::tempdir().unwrap();
        let rec = Recorder::new("rec");
        let out = run_track_with_backends(
            &config(dir.path(), PipelineOptions::default()),
            params(3),
            AccuracyReport::new(Some(0.9), Some(0.8)),
            vec![Box::new(rec.clone())],
        )
        .unwrap();

        let events = rec.events();
        assert_eq!(events[0], Event::Start("spam_classification_run".to_string()));
        assert_eq!(events[1], Event::Param("epochs".to_string(), "3".to_string()));
        assert_eq!(events[2], Event::Metric(SUMMARY_RF.to_string(), 0.9, None));
        assert_eq!(events[3], Event::Metric(SUMMARY_GB.to_string(), 0.8, None));
        assert_eq!(events.last(), Some(&Event::End(RunStatus::Finished)));

        assert_eq!(rec.metrics(METRIC_RF).len(), 3);
        assert_eq!(rec.metrics(METRIC_GB).len(), 3);
        assert_eq!(rec.metrics(METRIC_LOSS).len(), 3);
        assert_eq!(out.replay.steps, 3);
        assert_eq!(out.lifecycle.opened(), 1);
    }

    #[test]
    fn failing_backend_does_not_stop_local_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let local = Recorder::new("local");
        let mut remote = Recorder::new("remote");
        remote.fail_metrics = true;

        let out = run_track_with_backends(
            &config(dir.path(), PipelineOptions::default()),
            params(2),
            AccuracyReport::new(Some(0.5), None),
            vec![Box::new(local.clone()), Box::new(remote)],
        )
        .unwrap();

        assert_eq!(local.metrics(METRIC_LOSS).len(), 2);
        let remote = out
            .lifecycle
            .backends
            .iter()
            .find(|b| b.backend == "remote")
            .unwrap();
        // 2 summary metrics + 2 epochs x 3 metrics.
        assert_eq!(remote.failures, 8);
        assert_eq!(remote.status, Some(RunStatus::Finished));
    }

    #[test]
    fn mandatory_accuracy_fails_before_any_run_opens() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("params.yaml"), "train:\n  epochs: 2\n").unwrap();
        std::fs::write(dir.path().join("predictions.txt"), "Model Accuracy GB: 0.8\n").unwrap();

        let options = PipelineOptions {
            mandatory_accuracy: true,
            ..PipelineOptions::default()
        };
        let err = run_track(&config(dir.path(), options)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(!dir.path().join("dvclive").exists());
    }

    #[test]
    fn missing_params_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_track(&config(dir.path(), PipelineOptions::default())).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_report_still_tracks_locally() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("params.yaml"), "train:\n  epochs: 4\n").unwrap();

        let out = run_track(&config(dir.path(), PipelineOptions::default())).unwrap();
        assert!(out.report.is_empty());
        assert_eq!(out.replay.last.unwrap().rf_metric, 0.0);

        let metrics: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("dvclive/metrics.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(metrics["step"], 4);
        assert_eq!(metrics[METRIC_RF], 0.0);
    }

    #[test]
    fn unreachable_remote_does_not_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("params.yaml"), "train:\n  epochs: 2\n").unwrap();
        std::fs::write(
            dir.path().join("predictions.txt"),
            "Model Accuracy RF: 0.97\nModel Accuracy GB: 0.95\n",
        )
        .unwrap();

        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut cfg = config(
            dir.path(),
            PipelineOptions {
                enable_remote_backend: true,
                ..PipelineOptions::default()
            },
        );
        cfg.tracking.tracking_uri = format!("http://127.0.0.1:{port}");
        cfg.tracking.timeout = std::time::Duration::from_secs(2);

        let out = run_track(&cfg).unwrap();
        assert_eq!(out.lifecycle.opened(), 1);
        let mlflow = out
            .lifecycle
            .backends
            .iter()
            .find(|b| b.backend == "mlflow")
            .unwrap();
        assert!(mlflow.open_error.is_some());
        assert!(dir.path().join("dvclive/plots/metrics/train_loss.tsv").exists());
    }
}

//! Shared domain types.
//!
//! These types are intentionally small and immutable once built: the report and
//! parameters are read once at process start, and an `EpochStep` lives for a
//! single loop iteration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The fixed set of accuracies an evaluation report can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportKey {
    /// Random Forest (the "default" model of the workflow).
    Default,
    /// Gradient Boosting.
    Gb,
}

impl ReportKey {
    pub const ALL: [ReportKey; 2] = [ReportKey::Default, ReportKey::Gb];

    /// Key under which the value is exposed (`"default"` / `"gb"`).
    pub fn key(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Gb => "gb",
        }
    }

    /// Literal label that precedes the value in the report text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "Model Accuracy RF: ",
            Self::Gb => "Model Accuracy GB: ",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Default => "Random Forest",
            Self::Gb => "Gradient Boosting",
        }
    }
}

/// Base accuracies extracted from an evaluation report.
///
/// Either value may be absent when its label is not present in the text.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccuracyReport {
    rf: Option<f64>,
    gb: Option<f64>,
}

impl AccuracyReport {
    pub fn new(rf: Option<f64>, gb: Option<f64>) -> Self {
        Self { rf, gb }
    }

    pub fn get(&self, key: ReportKey) -> Option<f64> {
        match key {
            ReportKey::Default => self.rf,
            ReportKey::Gb => self.gb,
        }
    }

    pub fn rf(&self) -> Option<f64> {
        self.rf
    }

    pub fn gb(&self) -> Option<f64> {
        self.gb
    }

    /// Base accuracy used by the replay loop; a missing value counts as `0`.
    pub fn base_or_zero(&self, key: ReportKey) -> f64 {
        self.get(key).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.rf.is_none() && self.gb.is_none()
    }

    /// Random Forest accuracy for pipelines that cannot proceed without it.
    pub fn require_rf(&self) -> Result<f64, AppError> {
        self.rf.ok_or_else(|| {
            AppError::parse(format!(
                "Accuracy report has no '{}' value.",
                ReportKey::Default.label().trim_end()
            ))
        })
    }

    /// Present values keyed by their string key.
    pub fn entries(&self) -> BTreeMap<&'static str, f64> {
        ReportKey::ALL
            .into_iter()
            .filter_map(|k| self.get(k).map(|v| (k.key(), v)))
            .collect()
    }
}

/// Training parameters that drive the replay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrainParams {
    /// Number of replayed epochs; always positive.
    pub epochs: u32,
}

/// Optional `data` section of the parameters document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataParams {
    pub target_column: Option<String>,
    pub test_size: Option<f64>,
    pub random_state: Option<u64>,
}

/// Hyperparameters of one estimator in the `model` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatorParams {
    pub n_estimators: Option<u32>,
    pub random_state: Option<u64>,
    pub max_depth: Option<u32>,
}

/// Optional `model` section of the parameters document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub random_forest: Option<EstimatorParams>,
    pub gradient_boosting: Option<EstimatorParams>,
}

/// Everything loaded from the parameters document.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub train: TrainParams,
    pub data: Option<DataParams>,
    pub model: Option<ModelParams>,
}

impl Params {
    /// Flatten the parameters into `(key, value)` pairs for run tracking.
    ///
    /// `epochs` always comes first; optional sections follow with dotted keys.
    pub fn tracked(&self) -> Vec<(String, String)> {
        let mut out = vec![("epochs".to_string(), self.train.epochs.to_string())];

        if let Some(data) = &self.data {
            push_opt(&mut out, "data.target_column", data.target_column.as_ref());
            push_opt(&mut out, "data.test_size", data.test_size.as_ref());
            push_opt(&mut out, "data.random_state", data.random_state.as_ref());
        }

        if let Some(model) = &self.model {
            for (prefix, est) in [
                ("model.random_forest", &model.random_forest),
                ("model.gradient_boosting", &model.gradient_boosting),
            ] {
                let Some(est) = est else { continue };
                push_opt(&mut out, &format!("{prefix}.n_estimators"), est.n_estimators.as_ref());
                push_opt(&mut out, &format!("{prefix}.random_state"), est.random_state.as_ref());
                push_opt(&mut out, &format!("{prefix}.max_depth"), est.max_depth.as_ref());
            }
        }

        out
    }
}

fn push_opt<T: ToString>(out: &mut Vec<(String, String)>, key: &str, value: Option<&T>) {
    if let Some(v) = value {
        out.push((key.to_string(), v.to_string()));
    }
}

/// One replayed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochStep {
    pub index: u32,
    /// `(index + 1) / epochs`; exactly `1.0` on the last step.
    pub progress: f64,
    pub rf_metric: f64,
    pub gb_metric: f64,
    pub loss: f64,
}

/// Feature flags covering the variants of the tracking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Also track the run on the remote tracking server.
    pub enable_remote_backend: bool,
    /// Emit `train_gb_accuracy` alongside the RF metric.
    pub enable_gb_metric: bool,
    /// Fail (exit status 3) when the RF accuracy is missing from the report.
    pub mandatory_accuracy: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enable_remote_backend: false,
            enable_gb_metric: true,
            mandatory_accuracy: false,
        }
    }
}

/// Terminal status recorded when a run is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    pub fn mlflow_name(self) -> &'static str {
        match self {
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Killed => "killed",
        }
    }
}

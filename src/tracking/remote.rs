//! MLflow tracking server integration (REST API 2.0).

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::RunStatus;
use crate::error::AppError;
use crate::tracking::{MetricEmitter, TrackingBackend, TrackingConfig};

const API_PREFIX: &str = "api/2.0/mlflow";

pub struct MlflowBackend {
    client: Client,
    base_url: String,
    experiment_name: String,
    experiment_id: Option<String>,
    run_id: Option<String>,
}

impl MlflowBackend {
    pub fn new(config: &TrackingConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::backend(format!("mlflow: failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.tracking_uri.trim_end_matches('/').to_string(),
            experiment_name: config.experiment_name.clone(),
            experiment_id: None,
            run_id: None,
        })
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{API_PREFIX}/{path}", self.base_url)
    }

    fn active_run(&self) -> Result<String, AppError> {
        self.run_id
            .clone()
            .ok_or_else(|| AppError::backend("mlflow: no active run."))
    }

    fn post<B, R>(&self, path: &str, body: &B) -> Result<R, AppError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .map_err(|e| AppError::backend(format!("mlflow: {path} request failed: {e}")))?;

        decode(path, resp)
    }

    /// Look the experiment up by name, creating it when it does not exist.
    fn resolve_experiment(&mut self) -> Result<String, AppError> {
        if let Some(id) = &self.experiment_id {
            return Ok(id.clone());
        }

        let path = "experiments/get-by-name";
        let resp = self
            .client
            .get(self.endpoint(path))
            .query(&[("experiment_name", self.experiment_name.as_str())])
            .send()
            .map_err(|e| AppError::backend(format!("mlflow: {path} request failed: {e}")))?;

        let id = if resp.status() == StatusCode::NOT_FOUND {
            tracing::info!(experiment = %self.experiment_name, "creating mlflow experiment");
            let created: CreateExperimentResponse = self.post(
                "experiments/create",
                &CreateExperimentRequest {
                    name: &self.experiment_name,
                },
            )?;
            created.experiment_id
        } else {
            let found: GetExperimentResponse = decode(path, resp)?;
            found.experiment.experiment_id
        };

        self.experiment_id = Some(id.clone());
        Ok(id)
    }
}

fn decode<R: DeserializeOwned>(path: &str, resp: reqwest::blocking::Response) -> Result<R, AppError> {
    let status = resp.status();
    if !status.is_success() {
        let detail = resp.text().unwrap_or_default();
        return Err(AppError::backend(format!(
            "mlflow: {path} failed with status {status}: {}",
            detail.trim()
        )));
    }
    resp.json()
        .map_err(|e| AppError::backend(format!("mlflow: failed to parse {path} response: {e}")))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Serialize)]
struct CreateExperimentRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Debug, Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Debug, Serialize)]
struct RunTag<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    experiment_id: &'a str,
    run_name: &'a str,
    start_time: i64,
    tags: Vec<RunTag<'a>>,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: RunPayload,
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
}

#[derive(Debug, Serialize)]
struct LogParamRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct LogMetricRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: f64,
    timestamp: i64,
    step: u64,
}

#[derive(Debug, Serialize)]
struct UpdateRunRequest<'a> {
    run_id: &'a str,
    status: &'a str,
    end_time: i64,
}

/// Log endpoints answer with an empty object.
#[derive(Debug, Deserialize)]
struct Empty {}

impl MetricEmitter for MlflowBackend {
    fn name(&self) -> &str {
        "mlflow"
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        let run_id = self.active_run()?;
        let _: Empty = self.post(
            "runs/log-parameter",
            &LogParamRequest {
                run_id: &run_id,
                key,
                value,
            },
        )?;
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<(), AppError> {
        let run_id = self.active_run()?;
        let _: Empty = self.post(
            "runs/log-metric",
            &LogMetricRequest {
                run_id: &run_id,
                key,
                value,
                timestamp: now_millis(),
                step: step.unwrap_or(0),
            },
        )?;
        Ok(())
    }
}

impl TrackingBackend for MlflowBackend {
    fn start_run(&mut self, run_name: &str) -> Result<(), AppError> {
        if self.run_id.is_some() {
            return Err(AppError::backend("mlflow: a run is already active."));
        }

        let experiment_id = self.resolve_experiment()?;
        let created: CreateRunResponse = self.post(
            "runs/create",
            &CreateRunRequest {
                experiment_id: &experiment_id,
                run_name,
                start_time: now_millis(),
                tags: vec![RunTag {
                    key: "mlflow.runName",
                    value: run_name,
                }],
            },
        )?;

        tracing::debug!(run_id = %created.run.info.run_id, "mlflow run created");
        self.run_id = Some(created.run.info.run_id);
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<(), AppError> {
        let run_id = self.active_run()?;
        self.run_id = None;
        let _: serde_json::Value = self.post(
            "runs/update",
            &UpdateRunRequest {
                run_id: &run_id,
                status: status.mlflow_name(),
                end_time: now_millis(),
            },
        )?;
        Ok(())
    }
}

//! Tracking configuration.
//!
//! Built once per process and handed to backend constructors; nothing here is
//! global.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TRACKING_URI: &str = "http://localhost:5000";
pub const DEFAULT_EXPERIMENT: &str = "spam_classification";
pub const DEFAULT_RUN_NAME: &str = "spam_classification_run";
pub const DEFAULT_LOCAL_DIR: &str = "dvclive";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Base URL of the MLflow tracking server.
    pub tracking_uri: String,
    pub experiment_name: String,
    pub run_name: String,
    /// Directory of the local experiment log.
    pub local_dir: PathBuf,
    /// Per-request timeout for the remote backend.
    pub timeout: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
            run_name: DEFAULT_RUN_NAME.to_string(),
            local_dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TrackingConfig {
    /// Defaults overridden by `MLFLOW_TRACKING_URI`, `MLFLOW_EXPERIMENT_NAME`
    /// and `MLFLOW_RUN_NAME` (a `.env` file is honored).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = non_empty("MLFLOW_TRACKING_URI") {
            config.tracking_uri = uri;
        }
        if let Some(name) = non_empty("MLFLOW_EXPERIMENT_NAME") {
            config.experiment_name = name;
        }
        if let Some(name) = non_empty("MLFLOW_RUN_NAME") {
            config.run_name = name;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let config = TrackingConfig::from_lookup(|key| match key {
            "MLFLOW_TRACKING_URI" => Some("http://mlflow:5000".to_string()),
            "MLFLOW_EXPERIMENT_NAME" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.tracking_uri, "http://mlflow:5000");
        assert_eq!(config.experiment_name, DEFAULT_EXPERIMENT);
        assert_eq!(config.run_name, DEFAULT_RUN_NAME);
        assert_eq!(config.local_dir, PathBuf::from("dvclive"));
    }
}

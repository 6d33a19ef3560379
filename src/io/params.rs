//! Parameters document (`params.yaml`) loading.
//!
//! Only `train.epochs` is required. The `data` and `model` sections written by
//! the training stage are optional and are carried along for run tracking.

use std::path::Path;

use serde::Deserialize;

use crate::domain::{DataParams, ModelParams, Params, TrainParams};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct ParamsDocument {
    train: Option<TrainSection>,
    data: Option<DataParams>,
    model: Option<ModelParams>,
}

#[derive(Debug, Deserialize)]
struct TrainSection {
    epochs: Option<serde_yaml::Value>,
}

/// Load the training parameters only.
pub fn load_train_params(path: &Path) -> Result<TrainParams, AppError> {
    load_params(path).map(|p| p.train)
}

/// Load and validate the full parameters document.
pub fn load_params(path: &Path) -> Result<Params, AppError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::config(format!("Parameters file '{}' not found.", path.display()))
        } else {
            AppError::config(format!(
                "Failed to read parameters file '{}': {e}",
                path.display()
            ))
        }
    })?;

    parse_params(&contents)
        .map_err(|e| AppError::config(format!("{} ({})", e, path.display())))
}

/// Parse a parameters document from YAML text.
pub fn parse_params(contents: &str) -> Result<Params, AppError> {
    let doc: ParamsDocument = serde_yaml::from_str(contents)
        .map_err(|e| AppError::config(format!("Invalid parameters document: {e}")))?;

    let train = doc
        .train
        .ok_or_else(|| AppError::config("Parameters document has no 'train' section."))?;
    let epochs = validate_epochs(train.epochs.as_ref())?;

    Ok(Params {
        train: TrainParams { epochs },
        data: doc.data,
        model: doc.model,
    })
}

fn validate_epochs(value: Option<&serde_yaml::Value>) -> Result<u32, AppError> {
    let value = value.ok_or_else(|| AppError::config("Missing 'train.epochs'."))?;

    let epochs = value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            AppError::config(format!(
                "'train.epochs' must be a positive integer, got {}.",
                describe_value(value)
            ))
        })?;

    Ok(epochs)
}

fn describe_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::String(s) => format!("'{s}'"),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "an unsupported value".to_string()),
    }
}

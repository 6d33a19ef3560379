//! Command-line parsing for the spam-classification tracking pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline itself; `app` turns these arguments into a `TrackConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "spamtrack",
    version,
    about = "Replay spam-classifier accuracies into experiment tracking backends"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay the accuracy report across epochs and log it to the tracking backends.
    Track(TrackArgs),
    /// Print the parsed parameters and accuracy report without tracking anything.
    Inspect(InputArgs),
}

/// Input files shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Parameters document with a `train.epochs` entry.
    #[arg(long, value_name = "YAML", default_value = "params.yaml")]
    pub params: PathBuf,

    /// Accuracy report written by the evaluation step.
    #[arg(long, value_name = "TXT", default_value = "models/predictions.txt")]
    pub report: PathBuf,
}

/// Options for `spamtrack track`.
#[derive(Debug, Args, Clone)]
pub struct TrackArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Also log the run to the remote MLflow tracking server.
    #[arg(long)]
    pub remote: bool,

    /// Do not emit the Gradient Boosting metrics.
    #[arg(long)]
    pub no_gb: bool,

    /// Fail with exit status 3 when the RF accuracy is missing from the report.
    #[arg(long)]
    pub require_accuracy: bool,

    /// MLflow tracking server URI (falls back to MLFLOW_TRACKING_URI).
    #[arg(long, value_name = "URI")]
    pub tracking_uri: Option<String>,

    /// MLflow experiment name (falls back to MLFLOW_EXPERIMENT_NAME).
    #[arg(long)]
    pub experiment: Option<String>,

    /// Run name used on every backend (falls back to MLFLOW_RUN_NAME).
    #[arg(long)]
    pub run_name: Option<String>,

    /// Directory of the local experiment log.
    #[arg(long, value_name = "DIR")]
    pub local_dir: Option<PathBuf>,

    /// Timeout for each request to the remote server, in seconds.
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Seed for the loss noise (random when omitted).
    #[arg(long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_defaults() {
        let cli = Cli::parse_from(["spamtrack", "track"]);
        let Command::Track(args) = cli.command else {
            panic!("expected track");
        };
        assert_eq!(args.input.params, PathBuf::from("params.yaml"));
        assert_eq!(args.input.report, PathBuf::from("models/predictions.txt"));
        assert!(!args.remote && !args.no_gb && !args.require_accuracy);
        assert_eq!(args.timeout_secs, 10);
        assert_eq!(args.seed, None);
    }

    #[test]
    fn track_flags() {
        let cli = Cli::parse_from([
            "spamtrack",
            "track",
            "--remote",
            "--no-gb",
            "--require-accuracy",
            "--tracking-uri",
            "http://mlflow:5000",
            "--seed",
            "3",
        ]);
        let Command::Track(args) = cli.command else {
            panic!("expected track");
        };
        assert!(args.remote && args.no_gb && args.require_accuracy);
        assert_eq!(args.tracking_uri.as_deref(), Some("http://mlflow:5000"));
        assert_eq!(args.seed, Some(3));
    }

    #[test]
    fn inspect_paths() {
        let cli = Cli::parse_from(["spamtrack", "inspect", "--report", "out/report.txt"]);
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.report, PathBuf::from("out/report.txt"));
    }
}

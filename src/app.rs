//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the tracking configuration (flags, then environment)
//! - runs the tracking pipeline
//! - prints the run summary

use std::time::Duration;

use clap::Parser;

use crate::cli::{Command, InputArgs, TrackArgs};
use crate::domain::PipelineOptions;
use crate::error::AppError;
use crate::tracking::TrackingConfig;

pub mod pipeline;

use pipeline::TrackConfig;

/// Entry point for the `spamtrack` binary.
pub fn run() -> Result<(), AppError> {
    // A bare `spamtrack` (or `spamtrack --remote ...`) means `spamtrack track`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Track(args) => handle_track(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_track(args: TrackArgs) -> Result<(), AppError> {
    let config = track_config_from_args(&args, TrackingConfig::from_env());
    tracing::info!(
        params = %config.params_path.display(),
        report = %config.report_path.display(),
        remote = config.options.enable_remote_backend,
        "starting tracking run"
    );

    let output = pipeline::run_track(&config)?;
    println!("{}", crate::report::format_track_summary(&output, &config));
    Ok(())
}

fn handle_inspect(args: InputArgs) -> Result<(), AppError> {
    let params = crate::io::load_params(&args.params)?;
    let report = crate::io::read_report(&args.report);
    println!("{}", crate::report::format_inputs(&params, &report));
    Ok(())
}

/// Merge CLI flags over an environment-derived tracking configuration.
pub fn track_config_from_args(args: &TrackArgs, env: TrackingConfig) -> TrackConfig {
    let mut tracking = env;
    if let Some(uri) = &args.tracking_uri {
        tracking.tracking_uri = uri.clone();
    }
    if let Some(name) = &args.experiment {
        tracking.experiment_name = name.clone();
    }
    if let Some(name) = &args.run_name {
        tracking.run_name = name.clone();
    }
    if let Some(dir) = &args.local_dir {
        tracking.local_dir = dir.clone();
    }
    tracking.timeout = Duration::from_secs(args.timeout_secs);

    TrackConfig {
        params_path: args.input.params.clone(),
        report_path: args.input.report.clone(),
        options: PipelineOptions {
            enable_remote_backend: args.remote,
            enable_gb_metric: !args.no_gb,
            mandatory_accuracy: args.require_accuracy,
        },
        tracking,
        seed: args.seed,
    }
}

/// Rewrite argv so `spamtrack` defaults to `spamtrack track`.
///
/// Rules:
/// - `spamtrack`                      -> `spamtrack track`
/// - `spamtrack --remote ...`         -> `spamtrack track --remote ...`
/// - `spamtrack --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("track".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "track".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_track() {
        assert_eq!(rewrite_args(argv(&["spamtrack"])), argv(&["spamtrack", "track"]));
        assert_eq!(
            rewrite_args(argv(&["spamtrack", "--remote"])),
            argv(&["spamtrack", "track", "--remote"])
        );
        assert_eq!(
            rewrite_args(argv(&["spamtrack", "--help"])),
            argv(&["spamtrack", "--help"])
        );
        assert_eq!(
            rewrite_args(argv(&["spamtrack", "inspect"])),
            argv(&["spamtrack", "inspect"])
        );
    }

    #[test]
    fn flags_override_environment() {
        let cli = crate::cli::Cli::parse_from(argv(&[
            "spamtrack",
            "track",
            "--run-name",
            "nightly",
            "--local-dir",
            "out/live",
            "--no-gb",
            "--timeout-secs",
            "3",
        ]));
        let Command::Track(args) = cli.command else {
            panic!("expected track");
        };

        let env = TrackingConfig {
            tracking_uri: "http://env:5000".to_string(),
            ..TrackingConfig::default()
        };
        let config = track_config_from_args(&args, env);

        assert_eq!(config.tracking.tracking_uri, "http://env:5000");
        assert_eq!(config.tracking.run_name, "nightly");
        assert_eq!(config.tracking.local_dir, PathBuf::from("out/live"));
        assert_eq!(config.tracking.timeout, Duration::from_secs(3));
        assert!(!config.options.enable_gb_metric);
        assert!(!config.options.enable_remote_backend);
    }
}

//! Terminal output formatting.

use crate::app::pipeline::{TrackConfig, TrackOutput};
use crate::domain::{AccuracyReport, Params, ReportKey};
use crate::tracking::BackendSummary;

/// Format the summary printed after `spamtrack track`.
pub fn format_track_summary(output: &TrackOutput, config: &TrackConfig) -> String {
    let mut out = String::new();

    out.push_str("=== spamtrack - accuracy replay ===\n");
    out.push_str(&format!("Run: {}\n", output.lifecycle.run_name));
    out.push_str(&format!("Params: {}\n", config.params_path.display()));
    out.push_str(&format!("Report: {}\n", config.report_path.display()));
    out.push_str(&format!("Epochs: {}\n", output.params.train.epochs));
    out.push('\n');

    out.push_str("Base accuracies:\n");
    out.push_str(&format_accuracies(&output.report));
    out.push('\n');

    if let Some(last) = &output.replay.last {
        out.push_str(&format!(
            "Final step: epoch={} progress={:.3} rf={:.4} gb={:.4} loss={:.4}\n",
            last.index, last.progress, last.rf_metric, last.gb_metric, last.loss
        ));
        if !config.options.enable_gb_metric {
            out.push_str("  (gb metric not emitted)\n");
        }
        out.push('\n');
    }

    out.push_str("Backends:\n");
    out.push_str(&format_backends(&output.lifecycle.backends));

    out
}

/// Format the parsed inputs printed by `spamtrack inspect`.
pub fn format_inputs(params: &Params, report: &AccuracyReport) -> String {
    let mut out = String::new();

    out.push_str("Parameters:\n");
    for (key, value) in params.tracked() {
        out.push_str(&format!("  {key:<36} {value}\n"));
    }
    out.push('\n');

    out.push_str("Base accuracies:\n");
    out.push_str(&format_accuracies(report));

    out
}

fn format_accuracies(report: &AccuracyReport) -> String {
    let mut out = String::new();
    for key in ReportKey::ALL {
        let value = match report.get(key) {
            Some(v) => format!("{v:.4}"),
            None => "missing (0 used)".to_string(),
        };
        out.push_str(&format!("  {:<8} {:<18} {value}\n", key.key(), key.display_name()));
    }
    out
}

fn format_backends(backends: &[BackendSummary]) -> String {
    if backends.is_empty() {
        return "  (none)\n".to_string();
    }

    let mut out = String::new();
    out.push_str(format!("  {:<10} {:<10} {:>8}  {}\n", "backend", "status", "failures", "note").trim_end());
    out.push('\n');

    for b in backends {
        let status = b.status.map(|s| s.label()).unwrap_or("skipped");
        let note = b
            .open_error
            .as_deref()
            .or(b.close_error.as_deref())
            .unwrap_or("");
        out.push_str(
            format!("  {:<10} {:<10} {:>8}  {}\n", b.backend, status, b.failures, note).trim_end(),
        );
        out.push('\n');
    }
    out
}

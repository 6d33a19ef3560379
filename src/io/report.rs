//! Accuracy report parsing.
//!
//! The upstream evaluation step writes a free-form text file; we only care
//! about the `Model Accuracy RF: <x.y>` and `Model Accuracy GB: <x.y>` lines.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{AccuracyReport, ReportKey};
use crate::error::AppError;

static RF_PATTERN: LazyLock<Regex> = LazyLock::new(|| label_pattern(ReportKey::Default));
static GB_PATTERN: LazyLock<Regex> = LazyLock::new(|| label_pattern(ReportKey::Gb));

fn label_pattern(key: ReportKey) -> Regex {
    let pattern = format!(r"{}(\d+\.\d+)", regex::escape(key.label()));
    Regex::new(&pattern).expect("report label pattern is a valid regex")
}

/// Parse base accuracies out of report text.
///
/// Each label is matched independently; an absent label leaves its key unset.
pub fn parse_report(text: &str) -> AccuracyReport {
    let rf = capture_value(&RF_PATTERN, text);
    let gb = capture_value(&GB_PATTERN, text);

    for (key, value) in [(ReportKey::Default, rf), (ReportKey::Gb, gb)] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                tracing::warn!(key = key.key(), value = v, "accuracy outside [0, 1]");
            }
        }
    }

    AccuracyReport::new(rf, gb)
}

fn capture_value(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Read the raw report text.
pub fn read_report_text(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::missing_file(format!("Accuracy report '{}' not found.", path.display()))
        } else {
            AppError::missing_file(format!(
                "Failed to read accuracy report '{}': {e}",
                path.display()
            ))
        }
    })
}

/// Read and parse a report file, falling back to an empty report.
///
/// A missing or unreadable file is reported as a warning; the pipeline then
/// continues with whatever defaults the empty report implies.
pub fn read_report(path: &Path) -> AccuracyReport {
    match read_report_text(path) {
        Ok(text) => parse_report(&text),
        Err(err) => {
            tracing::warn!(path = %path.display(), "{err}");
            AccuracyReport::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_both_labels() {
        let text = "Evaluation\nModel Accuracy RF: 0.9731\nModel Accuracy GB: 0.9512\n";
        let report = parse_report(text);
        assert_eq!(report.rf(), Some(0.9731));
        assert_eq!(report.gb(), Some(0.9512));
    }

    #[test]
    fn missing_gb_label_leaves_key_unset() {
        let report = parse_report("Model Accuracy RF: 0.87");
        assert_eq!(report.entries().into_iter().collect::<Vec<_>>(), vec![("default", 0.87)]);
        assert_eq!(report.gb(), None);
    }

    #[test]
    fn integer_values_do_not_match() {
        // The label must be followed by a decimal number.
        let report = parse_report("Model Accuracy RF: 1\nModel Accuracy GB: 0.5");
        assert_eq!(report.rf(), None);
        assert_eq!(report.gb(), Some(0.5));
    }

    #[test]
    fn labels_match_anywhere_in_text() {
        let text = "run 7 | Model Accuracy GB: 0.80 | Model Accuracy RF: 0.90 | done";
        let report = parse_report(text);
        assert_eq!(report.rf(), Some(0.90));
        assert_eq!(report.gb(), Some(0.80));
    }

    #[test]
    fn parsing_is_repeatable() {
        let text = "Model Accuracy RF: 0.91\nModel Accuracy GB: 0.88\n";
        assert_eq!(parse_report(text), parse_report(text));
    }

    #[test]
    fn unrelated_text_yields_empty_report() {
        assert!(parse_report("accuracy: 0.9\nModel Accuracy XGB: 0.7").is_empty());
    }

    #[test]
    fn missing_file_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = read_report(&dir.path().join("predictions.txt"));
        assert!(report.is_empty());
    }

    #[test]
    fn missing_file_error_kind() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_report_text(&dir.path().join("nope.txt")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MissingFile);
    }

    #[test]
    fn reads_report_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Model Accuracy RF: 0.95").unwrap();
        writeln!(file, "Model Accuracy GB: 0.93").unwrap();
        let report = read_report(file.path());
        assert_eq!(report, AccuracyReport::new(Some(0.95), Some(0.93)));
    }
}

//! Epoch replay.
//!
//! Replays the base accuracies from the evaluation report across `epochs`
//! synthetic steps. No model is trained here: accuracy grows linearly with
//! progress and the loss is `epochs - index - U`, `U ~ Uniform[0, 1)`.

use rand::Rng;

use crate::domain::{AccuracyReport, EpochStep, PipelineOptions, ReportKey, TrainParams};
use crate::error::AppError;
use crate::tracking::MetricEmitter;

pub const METRIC_RF: &str = "train_rf_accuracy";
pub const METRIC_GB: &str = "train_gb_accuracy";
pub const METRIC_LOSS: &str = "train_loss";

/// What a replay emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySummary {
    pub steps: u32,
    /// Values of the final step (`None` only if no step ran).
    pub last: Option<EpochStep>,
}

/// Compute a single step. `noise` must lie in `[0, 1)`.
pub fn epoch_step(index: u32, epochs: u32, report: &AccuracyReport, noise: f64) -> EpochStep {
    let progress = f64::from(index + 1) / f64::from(epochs);
    EpochStep {
        index,
        progress,
        rf_metric: report.base_or_zero(ReportKey::Default) * progress,
        gb_metric: report.base_or_zero(ReportKey::Gb) * progress,
        loss: f64::from(epochs) - f64::from(index) - noise,
    }
}

/// Emit one set of metrics per epoch.
///
/// Per step, in order: `train_rf_accuracy`, `train_gb_accuracy` (when
/// enabled), `train_loss`, all with `step = index`; then `next_step`.
pub fn replay_epochs<E, R>(
    params: &TrainParams,
    report: &AccuracyReport,
    options: &PipelineOptions,
    emitter: &mut E,
    rng: &mut R,
) -> Result<ReplaySummary, AppError>
where
    E: MetricEmitter + ?Sized,
    R: Rng,
{
    let epochs = params.epochs;
    let mut last = None;

    for index in 0..epochs {
        let step = epoch_step(index, epochs, report, rng.gen_range(0.0..1.0));
        let at = Some(u64::from(index));

        emitter.log_metric(METRIC_RF, step.rf_metric, at)?;
        if options.enable_gb_metric {
            emitter.log_metric(METRIC_GB, step.gb_metric, at)?;
        }
        emitter.log_metric(METRIC_LOSS, step.loss, at)?;
        emitter.next_step()?;

        tracing::debug!(
            epoch = index,
            progress = step.progress,
            loss = step.loss,
            "epoch replayed"
        );
        last = Some(step);
    }

    Ok(ReplaySummary {
        steps: epochs,
        last,
    })
}

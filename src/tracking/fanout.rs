//! Best-effort delivery to several emitters.
//!
//! Metrics are observational: one unreachable backend must not cost the others
//! their data. Every call is forwarded to every target; failures are logged and
//! counted per target, and the call itself still succeeds.

use crate::error::AppError;
use crate::tracking::MetricEmitter;

pub struct FanOut<E> {
    targets: Vec<E>,
    failures: Vec<u64>,
}

impl<E: MetricEmitter> FanOut<E> {
    pub fn new(targets: Vec<E>) -> Self {
        let failures = vec![0; targets.len()];
        Self { targets, failures }
    }

    pub fn push(&mut self, target: E) {
        self.targets.push(target);
        self.failures.push(0);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[E] {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut [E] {
        &mut self.targets
    }

    /// Failed deliveries per target, in target order.
    pub fn failures(&self) -> Vec<(&str, u64)> {
        self.targets
            .iter()
            .zip(&self.failures)
            .map(|(t, &n)| (t.name(), n))
            .collect()
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.iter().sum()
    }

    fn deliver<F>(&mut self, what: &str, mut call: F)
    where
        F: FnMut(&mut E) -> Result<(), AppError>,
    {
        for (target, failures) in self.targets.iter_mut().zip(self.failures.iter_mut()) {
            if let Err(err) = call(target) {
                *failures += 1;
                tracing::warn!(backend = target.name(), "{what} failed: {err}");
            }
        }
    }
}

impl<E: MetricEmitter> MetricEmitter for FanOut<E> {
    fn name(&self) -> &str {
        "fan-out"
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        self.deliver("log_param", |t| t.log_param(key, value));
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<(), AppError> {
        self.deliver("log_metric", |t| t.log_metric(key, value, step));
        Ok(())
    }

    fn next_step(&mut self) -> Result<(), AppError> {
        self.deliver("next_step", |t| t.next_step());
        Ok(())
    }
}

// Threshold evaluator - decides which alerts a reading triggers
use crate::application::threshold_store::ThresholdStore;
use crate::domain::alert::{AlertCandidate, Direction};
use crate::domain::reading::{Metric, Reading};
use crate::domain::threshold::{LevelBounds, Threshold};
use crate::domain::vat::Vat;
use std::sync::Arc;

const CONFIGURABLE: [Metric; 3] = [Metric::Ph, Metric::Temperatura, Metric::Humedad];

/// Pure decision function. Produces between 0 and 8 candidates.
///
/// pH, temperature and humidity are checked against the vat's `threshold`, if any.
/// Liquid level is always checked against `level`, independent of the threshold record.
/// A misconfigured `min > max` can fire both sides of a metric; that is not guarded here.
pub fn evaluate(
    reading: &Reading,
    vat: &Vat,
    threshold: Option<&Threshold>,
    level: LevelBounds,
) -> Vec<AlertCandidate> {
    let mut candidates = Vec::new();

    if let Some(threshold) = threshold {
        for metric in CONFIGURABLE {
            let (min, max) = threshold.bounds(metric);
            check(&mut candidates, metric, reading.value(metric), min, max);
        }
    }

    check(
        &mut candidates,
        Metric::NivelLiquido,
        reading.nivel_liquido,
        Some(level.low),
        Some(level.high),
    );

    if !candidates.is_empty() {
        tracing::debug!(
            "Reading {} on {} violates {} bound(s)",
            reading.id,
            vat.nombre,
            candidates.len()
        );
    }

    candidates
}

fn check(
    candidates: &mut Vec<AlertCandidate>,
    metric: Metric,
    value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) {
    let Some(value) = value else {
        return;
    };

    if let Some(max) = max {
        if value > max {
            candidates.push(AlertCandidate::new(metric, Direction::High, value, max));
        }
    }
    if let Some(min) = min {
        if value < min {
            candidates.push(AlertCandidate::new(metric, Direction::Low, value, min));
        }
    }
}

/// Evaluator bound to the live threshold store
#[derive(Clone)]
pub struct Evaluator {
    thresholds: Arc<ThresholdStore>,
    level: LevelBounds,
}

impl Evaluator {
    pub fn new(thresholds: Arc<ThresholdStore>, level: LevelBounds) -> Self {
        Self { thresholds, level }
    }

    /// Reads the threshold at call time, never a copy taken earlier
    pub fn evaluate(&self, reading: &Reading, vat: &Vat) -> Vec<AlertCandidate> {
        let threshold = self.thresholds.get(&vat.id);
        evaluate(reading, vat, threshold.as_ref(), self.level)
    }
}

// Per-vat alerting bounds (umbrales_tina)
use crate::domain::reading::Metric;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("{metric} min {min} is greater than max {max}")]
    InvertedRange { metric: Metric, min: f64, max: f64 },
}

/// Bounds for one vat. Every field is optional; an unset bound never fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub tina_id: String,
    pub ph_min: Option<f64>,
    pub ph_max: Option<f64>,
    pub temperatura_min: Option<f64>,
    pub temperatura_max: Option<f64>,
    pub humedad_min: Option<f64>,
    pub humedad_max: Option<f64>,
}

impl Threshold {
    #[cfg(test)]
    pub fn new(tina_id: impl Into<String>) -> Self {
        Self {
            tina_id: tina_id.into(),
            ..Default::default()
        }
    }

    /// `(min, max)` for a configurable metric; liquid level has no per-vat bounds
    pub fn bounds(&self, metric: Metric) -> (Option<f64>, Option<f64>) {
        match metric {
            Metric::Ph => (self.ph_min, self.ph_max),
            Metric::Temperatura => (self.temperatura_min, self.temperatura_max),
            Metric::Humedad => (self.humedad_min, self.humedad_max),
            Metric::NivelLiquido => (None, None),
        }
    }

    /// Checked when thresholds are written. Equal bounds are accepted.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for metric in [Metric::Ph, Metric::Temperatura, Metric::Humedad] {
            if let (Some(min), Some(max)) = self.bounds(metric) {
                if min > max {
                    return Err(ThresholdError::InvertedRange { metric, min, max });
                }
            }
        }
        Ok(())
    }
}

/// Liquid-level bounds. Not stored per vat; defaults are fixed at 95/10.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LevelBounds {
    pub high: f64,
    pub low: f64,
}

impl LevelBounds {
    pub const HIGH: f64 = 95.0;
    pub const LOW: f64 = 10.0;
}

impl Default for LevelBounds {
    fn default() -> Self {
        Self {
            high: Self::HIGH,
            low: Self::LOW,
        }
    }
}

// Report summary domain models
use crate::domain::reading::{Metric, Reading};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary statistics of one metric for one vat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub label: &'static str,
    pub unit: &'static str,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub samples: usize,
}

impl MetricSummary {
    /// `None` when no reading reports the metric
    pub fn from_readings<'a, I>(metric: Metric, readings: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Reading>,
    {
        let values: Vec<f64> = readings
            .into_iter()
            .filter_map(|r| r.value(metric))
            .collect();

        if values.is_empty() {
            return None;
        }

        let sum: f64 = values.iter().sum();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        Some(Self {
            metric,
            label: metric.label(),
            unit: metric.unit(),
            average: sum / values.len() as f64,
            max,
            min,
            samples: values.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VatReport {
    pub tina_id: String,
    pub tina_nombre: String,
    pub metrics: Vec<MetricSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub vat_count: usize,
    pub metric_count: usize,
    pub reading_count: usize,
    pub vats: Vec<VatReport>,
}

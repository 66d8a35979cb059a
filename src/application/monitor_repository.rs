// Repository trait for the hosted backend (vats, thresholds, readings, alerts)
use crate::domain::alert::{Alert, AlertState, NewAlert};
use crate::domain::reading::Reading;
use crate::domain::threshold::Threshold;
use crate::domain::vat::Vat;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// An alert row joined with the name of the vat it references, if that vat still exists
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRow {
    pub alert: Alert,
    pub tina_nombre: Option<String>,
}

#[async_trait]
pub trait MonitorRepository: Send + Sync {
    /// All vats with a non-null sensor assignment
    async fn list_vats_with_sensor(&self) -> anyhow::Result<Vec<Vat>>;

    async fn get_vat(&self, vat_id: &str) -> anyhow::Result<Option<Vat>>;

    /// Set or clear the sensor held by a vat
    async fn assign_sensor(&self, vat_id: &str, sensor_id: Option<&str>) -> anyhow::Result<()>;

    async fn list_thresholds(&self) -> anyhow::Result<Vec<Threshold>>;

    /// Insert or replace the threshold row for `threshold.tina_id`
    async fn upsert_threshold(&self, threshold: &Threshold) -> anyhow::Result<()>;

    /// Readings of the given sensors, newest first, at most `limit` rows
    async fn list_readings(&self, sensor_ids: &[String], limit: usize)
    -> anyhow::Result<Vec<Reading>>;

    /// Readings of the given sensors created or updated after `since`, oldest change first
    async fn list_readings_changed_since(
        &self,
        sensor_ids: &[String],
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Reading>>;

    async fn insert_alert(&self, alert: &NewAlert) -> anyhow::Result<Alert>;

    async fn get_alert(&self, alert_id: &str) -> anyhow::Result<Option<Alert>>;

    /// Move the alert to `state` only while its stored state is one of `from`.
    /// `Ok(false)` means no row matched: the alert is missing or already moved on.
    async fn update_alert_state(
        &self,
        alert_id: &str,
        state: AlertState,
        from: &[AlertState],
    ) -> anyhow::Result<bool>;

    /// Alerts newest first, joined with vat names
    async fn list_alerts(&self, limit: usize) -> anyhow::Result<Vec<AlertRow>>;
}

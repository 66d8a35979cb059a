// In-memory repository used by the application tests
use crate::application::monitor_repository::{AlertRow, MonitorRepository};
use crate::domain::alert::{Alert, AlertState, AlertType, NewAlert};
use crate::domain::reading::Reading;
use crate::domain::threshold::Threshold;
use crate::domain::vat::{Vat, VatState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListVats,
    GetVat,
    AssignSensor,
    ListThresholds,
    UpsertThreshold,
    ListReadings,
    ListReadingsChanged,
    InsertAlert,
    GetAlert,
    UpdateAlert,
    ListAlerts,
}

#[derive(Default)]
struct State {
    vats: Vec<Vat>,
    thresholds: Vec<Threshold>,
    readings: Vec<Reading>,
    alerts: Vec<Alert>,
    failing: HashSet<Op>,
    failing_types: HashSet<AlertType>,
    update_delays: HashMap<AlertState, Duration>,
    next_id: usize,
}

/// Cheap to clone; clones share the same tables
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vat(&self, id: &str, nombre: &str, sensor_id: Option<&str>) {
        self.state.lock().unwrap().vats.push(Vat {
            id: id.to_string(),
            nombre: nombre.to_string(),
            capacidad: 1000.0,
            estado: VatState::InUse,
            tipo_agave: None,
            sensor_id: sensor_id.map(String::from),
        });
    }

    pub fn add_threshold(&self, threshold: Threshold) {
        self.state.lock().unwrap().thresholds.push(threshold);
    }

    pub fn add_reading(&self, reading: Reading) {
        self.state.lock().unwrap().readings.push(reading);
    }

    pub fn add_alert(&self, alert: Alert) {
        self.state.lock().unwrap().alerts.push(alert);
    }

    pub fn fail(&self, op: Op) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.state.lock().unwrap().failing.remove(&op);
    }

    pub fn fail_alert_type(&self, alert_type: AlertType) {
        self.state.lock().unwrap().failing_types.insert(alert_type);
    }

    /// Hold writes moving an alert to `to` for `by` before they are applied
    pub fn delay_update(&self, to: AlertState, by: Duration) {
        self.state.lock().unwrap().update_delays.insert(to, by);
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state.lock().unwrap().alerts.clone()
    }

    pub fn thresholds(&self) -> Vec<Threshold> {
        self.state.lock().unwrap().thresholds.clone()
    }

    pub fn vat(&self, id: &str) -> Option<Vat> {
        self.state.lock().unwrap().vats.iter().find(|v| v.id == id).cloned()
    }

    fn check(&self, op: Op) -> anyhow::Result<()> {
        if self.state.lock().unwrap().failing.contains(&op) {
            anyhow::bail!("simulated backend failure in {:?}", op);
        }
        Ok(())
    }
}

#[async_trait]
impl MonitorRepository for InMemoryRepository {
    async fn list_vats_with_sensor(&self) -> anyhow::Result<Vec<Vat>> {
        self.check(Op::ListVats)?;
        let state = self.state.lock().unwrap();
        Ok(state.vats.iter().filter(|v| v.sensor_id.is_some()).cloned().collect())
    }

    async fn get_vat(&self, vat_id: &str) -> anyhow::Result<Option<Vat>> {
        self.check(Op::GetVat)?;
        Ok(self.vat(vat_id))
    }

    async fn assign_sensor(&self, vat_id: &str, sensor_id: Option<&str>) -> anyhow::Result<()> {
        self.check(Op::AssignSensor)?;
        let mut state = self.state.lock().unwrap();
        match state.vats.iter_mut().find(|v| v.id == vat_id) {
            Some(vat) => {
                vat.sensor_id = sensor_id.map(String::from);
                Ok(())
            }
            None => anyhow::bail!("vat {} does not exist", vat_id),
        }
    }

    async fn list_thresholds(&self) -> anyhow::Result<Vec<Threshold>> {
        self.check(Op::ListThresholds)?;
        Ok(self.thresholds())
    }

    async fn upsert_threshold(&self, threshold: &Threshold) -> anyhow::Result<()> {
        self.check(Op::UpsertThreshold)?;
        let mut state = self.state.lock().unwrap();
        state.thresholds.retain(|t| t.tina_id != threshold.tina_id);
        state.thresholds.push(threshold.clone());
        Ok(())
    }

    async fn list_readings(&self, sensor_ids: &[String], limit: usize) -> anyhow::Result<Vec<Reading>> {
        self.check(Op::ListReadings)?;
        let state = self.state.lock().unwrap();
        let mut readings: Vec<Reading> = state
            .readings
            .iter()
            .filter(|r| sensor_ids.contains(&r.sensor_id))
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        readings.truncate(limit);
        Ok(readings)
    }

    async fn list_readings_changed_since(
        &self,
        sensor_ids: &[String],
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Reading>> {
        self.check(Op::ListReadingsChanged)?;
        let state = self.state.lock().unwrap();
        let mut readings: Vec<Reading> = state
            .readings
            .iter()
            .filter(|r| sensor_ids.contains(&r.sensor_id) && r.last_change() > since)
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.last_change());
        Ok(readings)
    }

    async fn insert_alert(&self, alert: &NewAlert) -> anyhow::Result<Alert> {
        self.check(Op::InsertAlert)?;
        let mut state = self.state.lock().unwrap();
        if state.failing_types.contains(&alert.tipo_alerta) {
            anyhow::bail!("simulated insert failure for {}", alert.tipo_alerta);
        }
        state.next_id += 1;
        let stored = Alert {
            id: format!("alert-{}", state.next_id),
            tina_id: alert.tina_id.clone(),
            tipo_alerta: alert.tipo_alerta,
            valor_actual: alert.valor_actual,
            valor_umbral: alert.valor_umbral,
            mensaje: alert.mensaje.clone(),
            lectura_id: alert.lectura_id.clone(),
            estado: alert.estado,
            created_at: Utc::now(),
        };
        state.alerts.push(stored.clone());
        Ok(stored)
    }

    async fn get_alert(&self, alert_id: &str) -> anyhow::Result<Option<Alert>> {
        self.check(Op::GetAlert)?;
        let state = self.state.lock().unwrap();
        Ok(state.alerts.iter().find(|a| a.id == alert_id).cloned())
    }

    async fn update_alert_state(
        &self,
        alert_id: &str,
        next: AlertState,
        from: &[AlertState],
    ) -> anyhow::Result<bool> {
        self.check(Op::UpdateAlert)?;
        let delay = self.state.lock().unwrap().update_delays.get(&next).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        match state
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && from.contains(&a.estado))
        {
            Some(alert) => {
                alert.estado = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_alerts(&self, limit: usize) -> anyhow::Result<Vec<AlertRow>> {
        self.check(Op::ListAlerts)?;
        let state = self.state.lock().unwrap();
        let mut rows: Vec<AlertRow> = state
            .alerts
            .iter()
            .map(|alert| AlertRow {
                alert: alert.clone(),
                tina_nombre: state
                    .vats
                    .iter()
                    .find(|v| v.id == alert.tina_id)
                    .map(|v| v.nombre.clone()),
            })
            .collect();
        rows.sort_by(|a, b| b.alert.created_at.cmp(&a.alert.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

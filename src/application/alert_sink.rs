// Alert sink - persists candidates and drives the alert lifecycle
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::monitor_repository::MonitorRepository;
use crate::application::notification::NotificationCenter;
use crate::domain::alert::{Alert, AlertCandidate, AlertState, AlertType, NewAlert, TransitionError};
use crate::domain::reading::Reading;
use crate::domain::vat::Vat;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Repeat-alert handling. `None` writes one row per violating reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DedupPolicy {
    #[default]
    None,
    /// Skip a candidate when the same vat and alert type fired less than this long before,
    /// measured on reading timestamps
    Cooldown(Duration),
}

pub struct AlertSink {
    repository: Arc<dyn MonitorRepository>,
    notifications: NotificationCenter,
    dedup: DedupPolicy,
    last_fired: Mutex<HashMap<(String, AlertType), DateTime<Utc>>>,
}

impl AlertSink {
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        notifications: NotificationCenter,
        dedup: DedupPolicy,
    ) -> Self {
        Self {
            repository,
            notifications,
            dedup,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    /// Write one `activa` alert for the candidate. `Ok(None)` means the dedup policy held it back.
    pub async fn record(
        &self,
        candidate: &AlertCandidate,
        reading: &Reading,
        vat: &Vat,
    ) -> ServiceResult<Option<Alert>> {
        if self.suppressed(candidate, reading, vat) {
            tracing::info!(
                "Suppressed {} for {} (reading {}) within cooldown",
                candidate.alert_type,
                vat.nombre,
                reading.id
            );
            return Ok(None);
        }

        let new_alert = NewAlert {
            tina_id: vat.id.clone(),
            tipo_alerta: candidate.alert_type,
            valor_actual: candidate.value,
            valor_umbral: candidate.bound,
            mensaje: candidate.message(&vat.nombre),
            lectura_id: Some(reading.id.clone()),
            estado: AlertState::Activa,
        };

        match self.repository.insert_alert(&new_alert).await {
            Ok(alert) => {
                self.last_fired
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert((vat.id.clone(), candidate.alert_type), reading.created_at);
                self.notifications.alert_created(&alert);
                Ok(Some(alert))
            }
            Err(e) => {
                tracing::error!(
                    "Error inserting {} alert for {}: {:#}",
                    candidate.alert_type,
                    vat.nombre,
                    e
                );
                self.notifications
                    .error(format!("No se pudo registrar la alerta: {}", new_alert.mensaje));
                Err(e.into())
            }
        }
    }

    /// Record every candidate. A failed write is reported and the rest still go through.
    pub async fn record_all(
        &self,
        candidates: &[AlertCandidate],
        reading: &Reading,
        vat: &Vat,
    ) -> Vec<Alert> {
        let mut recorded = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Ok(Some(alert)) = self.record(candidate, reading, vat).await {
                recorded.push(alert);
            }
        }
        recorded
    }

    pub async fn mark_read(&self, alert_id: &str) -> ServiceResult<Alert> {
        let alert = self.transition(alert_id, AlertState::Leida).await?;
        self.notifications.info(
            "Alerta marcada como leída",
            "La alerta ha sido marcada como leída.",
        );
        Ok(alert)
    }

    pub async fn mark_resolved(&self, alert_id: &str) -> ServiceResult<Alert> {
        let alert = self.transition(alert_id, AlertState::Resuelta).await?;
        self.notifications
            .info("Alerta resuelta", "La alerta ha sido marcada como resuelta.");
        Ok(alert)
    }

    async fn transition(&self, alert_id: &str, next: AlertState) -> ServiceResult<Alert> {
        let current = match self.repository.get_alert(alert_id).await {
            Ok(Some(alert)) => alert,
            Ok(None) => {
                self.notifications.error("La alerta no existe.");
                return Err(ServiceError::NotFound(format!("alert {}", alert_id)));
            }
            Err(e) => {
                tracing::error!("Error fetching alert {}: {:#}", alert_id, e);
                self.notifications.error("No se pudo actualizar la alerta.");
                return Err(e.into());
            }
        };

        let estado = match current.estado.transition(next) {
            Ok(estado) => estado,
            Err(e) => {
                tracing::warn!("Rejected transition for alert {}: {}", alert_id, e);
                self.notifications.error("No se pudo actualizar la alerta.");
                return Err(e.into());
            }
        };

        let from = AlertState::predecessors(estado);
        match self
            .repository
            .update_alert_state(alert_id, estado, &from)
            .await
        {
            Ok(true) => Ok(Alert { estado, ..current }),
            Ok(false) => {
                // Another request moved the alert between our read and write
                let stored = match self.repository.get_alert(alert_id).await {
                    Ok(Some(alert)) => alert.estado,
                    _ => current.estado,
                };
                tracing::warn!(
                    "Alert {} changed to {} concurrently, {} rejected",
                    alert_id,
                    stored,
                    estado
                );
                self.notifications.error("No se pudo actualizar la alerta.");
                Err(TransitionError {
                    from: stored,
                    to: estado,
                }
                .into())
            }
            Err(e) => {
                tracing::error!("Error updating alert {}: {:#}", alert_id, e);
                self.notifications.error("No se pudo actualizar la alerta.");
                Err(e.into())
            }
        }
    }

    fn suppressed(&self, candidate: &AlertCandidate, reading: &Reading, vat: &Vat) -> bool {
        let DedupPolicy::Cooldown(window) = self.dedup else {
            return false;
        };

        let last_fired = self.last_fired.lock().unwrap_or_else(PoisonError::into_inner);
        match last_fired.get(&(vat.id.clone(), candidate.alert_type)) {
            Some(previous) => reading.created_at.signed_duration_since(*previous) < window,
            None => false,
        }
    }
}

// Vat configuration - sensor assignment and threshold upsert
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::monitor_repository::MonitorRepository;
use crate::application::notification::NotificationCenter;
use crate::application::threshold_store::ThresholdStore;
use crate::application::vat_registry::VatRegistry;
use crate::domain::threshold::Threshold;
use serde::Deserialize;
use std::sync::Arc;

/// Threshold values as submitted by the configuration form
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThresholdInput {
    pub ph_min: Option<f64>,
    pub ph_max: Option<f64>,
    pub temperatura_min: Option<f64>,
    pub temperatura_max: Option<f64>,
    pub humedad_min: Option<f64>,
    pub humedad_max: Option<f64>,
}

impl ThresholdInput {
    fn for_vat(&self, vat_id: &str) -> Threshold {
        Threshold {
            tina_id: vat_id.to_string(),
            ph_min: self.ph_min,
            ph_max: self.ph_max,
            temperatura_min: self.temperatura_min,
            temperatura_max: self.temperatura_max,
            humedad_min: self.humedad_min,
            humedad_max: self.humedad_max,
        }
    }
}

#[derive(Clone)]
pub struct VatConfigService {
    repository: Arc<dyn MonitorRepository>,
    vats: Arc<VatRegistry>,
    thresholds: Arc<ThresholdStore>,
    notifications: NotificationCenter,
}

impl VatConfigService {
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        vats: Arc<VatRegistry>,
        thresholds: Arc<ThresholdStore>,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            repository,
            vats,
            thresholds,
            notifications,
        }
    }

    /// Assign (or clear) the vat's sensor and, when a sensor is assigned, upsert its thresholds.
    pub async fn configure(
        &self,
        vat_id: &str,
        sensor_id: Option<&str>,
        input: &ThresholdInput,
    ) -> ServiceResult<()> {
        let vat = match self.repository.get_vat(vat_id).await {
            Ok(Some(vat)) => vat,
            Ok(None) => return Err(ServiceError::NotFound(format!("vat {}", vat_id))),
            Err(e) => return Err(self.write_failed(e)),
        };

        let threshold = input.for_vat(vat_id);
        if sensor_id.is_some() {
            threshold.validate()?;
        }

        if let Some(sensor_id) = sensor_id {
            let claimed = match self.repository.list_vats_with_sensor().await {
                Ok(vats) => vats,
                Err(e) => return Err(self.write_failed(e)),
            };
            if let Some(other) = claimed
                .iter()
                .find(|v| v.id != vat_id && v.holds_sensor(sensor_id))
            {
                return Err(ServiceError::SensorTaken {
                    sensor_id: sensor_id.to_string(),
                    vat_name: other.nombre.clone(),
                });
            }
        }

        if let Err(e) = self.repository.assign_sensor(vat_id, sensor_id).await {
            return Err(self.write_failed(e));
        }

        if sensor_id.is_some() {
            if let Err(e) = self.repository.upsert_threshold(&threshold).await {
                let err = self.write_failed(e);
                // The sensor assignment is already stored; keep the registry in step with it
                self.refresh().await;
                return Err(err);
            }
            self.thresholds.put(threshold);
        }

        tracing::info!("Configured vat {} with sensor {:?}", vat.nombre, sensor_id);
        self.notifications
            .info("Tina actualizada", "La tina ha sido actualizada exitosamente.");

        self.refresh().await;
        Ok(())
    }

    /// Reload the vat registry and threshold store. Failures are reported, not returned.
    pub async fn refresh(&self) {
        if let Err(e) = self.vats.load().await {
            tracing::error!("Error refreshing vats: {:#}", e);
            self.notifications.error("No se pudieron cargar las tinas.");
        }
        if let Err(e) = self.thresholds.load().await {
            tracing::error!("Error refreshing thresholds: {:#}", e);
            self.notifications.error("No se pudieron cargar los umbrales.");
        }
    }

    fn write_failed(&self, e: anyhow::Error) -> ServiceError {
        tracing::error!("Error saving vat configuration: {:#}", e);
        self.notifications.error("No se pudo guardar la tina.");
        ServiceError::Backend(e)
    }
}

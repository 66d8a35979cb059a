// Report service - per-vat, per-metric summary statistics
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::monitor_repository::MonitorRepository;
use crate::application::notification::NotificationCenter;
use crate::application::vat_registry::VatRegistry;
use crate::domain::reading::{Metric, Reading};
use crate::domain::report::{MetricSummary, Report, VatReport};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub vat_ids: Vec<String>,
    pub metrics: Vec<Metric>,
    /// Inclusive whole days (UTC); applied only when both ends are set
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportRequest {
    fn in_range(&self, reading: &Reading) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => {
                let day = reading.created_at.date_naive();
                day >= from && day <= to
            }
            _ => true,
        }
    }
}

#[derive(Clone)]
pub struct ReportService {
    repository: Arc<dyn MonitorRepository>,
    vats: Arc<VatRegistry>,
    notifications: NotificationCenter,
    reading_limit: usize,
}

impl ReportService {
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        vats: Arc<VatRegistry>,
        notifications: NotificationCenter,
        reading_limit: usize,
    ) -> Self {
        Self {
            repository,
            vats,
            notifications,
            reading_limit,
        }
    }

    pub async fn generate(&self, request: &ReportRequest) -> ServiceResult<Report> {
        if request.vat_ids.is_empty() || request.metrics.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "select at least one vat and one metric".to_string(),
            ));
        }

        let selected: Vec<_> = request
            .vat_ids
            .iter()
            .filter_map(|id| {
                let vat = self.vats.get(id);
                if vat.is_none() {
                    tracing::debug!("Report skips vat {} without sensor", id);
                }
                vat
            })
            .collect();

        let sensor_ids: Vec<String> = selected.iter().filter_map(|v| v.sensor_id.clone()).collect();

        let readings = if sensor_ids.is_empty() {
            Vec::new()
        } else {
            match self
                .repository
                .list_readings(&sensor_ids, self.reading_limit)
                .await
            {
                Ok(readings) => readings,
                Err(e) => {
                    tracing::error!("Error fetching readings for report: {:#}", e);
                    self.notifications
                        .error("No se pudo generar el reporte. Inténtalo nuevamente.");
                    return Err(e.into());
                }
            }
        };

        let readings: Vec<Reading> = readings
            .into_iter()
            .filter(|r| request.in_range(r))
            .collect();

        let vats = selected
            .iter()
            .map(|vat| {
                let own: Vec<&Reading> = readings
                    .iter()
                    .filter(|r| vat.holds_sensor(&r.sensor_id))
                    .collect();
                let metrics = request
                    .metrics
                    .iter()
                    .filter_map(|m| MetricSummary::from_readings(*m, own.iter().copied()))
                    .collect();
                VatReport {
                    tina_id: vat.id.clone(),
                    tina_nombre: vat.nombre.clone(),
                    metrics,
                }
            })
            .collect();

        Ok(Report {
            generated_at: Utc::now(),
            vat_count: selected.len(),
            metric_count: request.metrics.len(),
            reading_count: readings.len(),
            vats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::memory_repository::InMemoryRepository;
    use chrono::TimeZone;

    fn reading(id: &str, sensor: &str, day: u32, temp: f64, ph: Option<f64>) -> Reading {
        Reading {
            id: id.to_string(),
            sensor_id: sensor.to_string(),
            temperatura: Some(temp),
            ph,
            humedad: None,
            nivel_liquido: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, day, 23, 30, 0).unwrap(),
            updated_at: None,
        }
    }

    async fn service(repo: &InMemoryRepository) -> ReportService {
        let repository: Arc<dyn MonitorRepository> = Arc::new(repo.clone());
        let vats = Arc::new(VatRegistry::new(repository.clone()));
        vats.load().await.unwrap();
        ReportService::new(repository, vats, NotificationCenter::new(8), 1000)
    }

    fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.add_vat("t-1", "Tina-A", Some("s-1"));
        repo.add_vat("t-2", "Tina-B", Some("s-2"));
        repo.add_reading(reading("r-1", "s-1", 1, 20.0, Some(4.0)));
        repo.add_reading(reading("r-2", "s-1", 2, 30.0, None));
        repo.add_reading(reading("r-3", "s-1", 5, 40.0, None));
        repo.add_reading(reading("r-4", "s-2", 2, 10.0, None));
        repo
    }

    #[tokio::test]
    async fn test_summary_per_vat_and_metric() {
        let repo = seeded();
        let service = service(&repo).await;

        let report = service
            .generate(&ReportRequest {
                vat_ids: vec!["t-1".into()],
                metrics: vec![Metric::Temperatura, Metric::Ph, Metric::Humedad],
                from: None,
                to: None,
            })
            .await
            .unwrap();

        assert_eq!(report.reading_count, 3);
        assert_eq!(report.vats.len(), 1);
        let metrics = &report.vats[0].metrics;
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].metric, Metric::Temperatura);
        assert_eq!(metrics[0].average, 30.0);
        assert_eq!(metrics[0].samples, 3);
        assert_eq!(metrics[1].metric, Metric::Ph);
        assert_eq!(metrics[1].samples, 1);
    }

    #[tokio::test]
    async fn test_date_range_is_inclusive_whole_days() {
        let repo = seeded();
        let service = service(&repo).await;

        let report = service
            .generate(&ReportRequest {
                vat_ids: vec!["t-1".into(), "t-2".into()],
                metrics: vec![Metric::Temperatura],
                from: NaiveDate::from_ymd_opt(2025, 3, 1),
                to: NaiveDate::from_ymd_opt(2025, 3, 2),
            })
            .await
            .unwrap();

        assert_eq!(report.reading_count, 3);
        assert_eq!(report.vat_count, 2);
        assert_eq!(report.vats[0].metrics[0].max, 30.0);
        assert_eq!(report.vats[1].metrics[0].samples, 1);
    }

    #[tokio::test]
    async fn test_vat_count_skips_vats_without_sensor() {
        let repo = seeded();
        repo.add_vat("t-3", "Tina-C", None);
        let service = service(&repo).await;

        let report = service
            .generate(&ReportRequest {
                vat_ids: vec!["t-1".into(), "t-3".into(), "t-missing".into()],
                metrics: vec![Metric::Temperatura],
                from: None,
                to: None,
            })
            .await
            .unwrap();

        assert_eq!(report.vat_count, 1);
        assert_eq!(report.vat_count, report.vats.len());
    }

    #[tokio::test]
    async fn test_empty_selection_is_invalid() {
        let repo = seeded();
        let service = service(&repo).await;

        let result = service
            .generate(&ReportRequest {
                vat_ids: vec!["t-1".into()],
                metrics: vec![],
                from: None,
                to: None,
            })
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
    }
}

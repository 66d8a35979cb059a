// Reading ingest - resolves change-feed events to vats and drives evaluation
use crate::application::alert_sink::AlertSink;
use crate::application::evaluator::Evaluator;
use crate::application::monitor_repository::MonitorRepository;
use crate::application::notification::NotificationCenter;
use crate::application::threshold_store::ThresholdStore;
use crate::application::vat_registry::VatRegistry;
use crate::domain::alert::Alert;
use crate::domain::reading::{Reading, ReadingEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Source of reading insert/update events, delivered in order on one channel.
/// Dropping the receiver ends the subscription.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> mpsc::Receiver<ReadingEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_vats: usize,
    pub vats_with_data: usize,
    pub total_readings: usize,
}

pub struct ReadingIngest {
    repository: Arc<dyn MonitorRepository>,
    vats: Arc<VatRegistry>,
    thresholds: Arc<ThresholdStore>,
    evaluator: Evaluator,
    sink: Arc<AlertSink>,
    notifications: NotificationCenter,
    history: RwLock<Vec<Reading>>,
    history_limit: usize,
}

impl ReadingIngest {
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        vats: Arc<VatRegistry>,
        thresholds: Arc<ThresholdStore>,
        evaluator: Evaluator,
        sink: Arc<AlertSink>,
        notifications: NotificationCenter,
        history_limit: usize,
    ) -> Self {
        Self {
            repository,
            vats,
            thresholds,
            evaluator,
            sink,
            notifications,
            history: RwLock::new(Vec::new()),
            history_limit,
        }
    }

    /// Initial load of vats, thresholds and recent readings.
    /// Each failure is reported and the affected collection keeps its previous value.
    pub async fn bootstrap(&self) {
        if let Err(e) = self.vats.load().await {
            tracing::error!("Error fetching vats: {:#}", e);
            self.notifications
                .error("No se pudieron cargar los datos del dashboard.");
        }

        if let Err(e) = self.thresholds.load().await {
            tracing::error!("Error fetching thresholds: {:#}", e);
            self.notifications
                .error("No se pudieron cargar los umbrales. No se generarán alertas.");
        }

        let sensor_ids = self.vats.sensor_ids();
        if sensor_ids.is_empty() {
            return;
        }

        match self
            .repository
            .list_readings(&sensor_ids, self.history_limit)
            .await
        {
            Ok(readings) => {
                tracing::info!("Loaded {} recent readings", readings.len());
                *self.history.write().unwrap_or_else(PoisonError::into_inner) = readings;
            }
            Err(e) => {
                tracing::error!("Error fetching readings: {:#}", e);
                self.notifications
                    .error("No se pudieron cargar los datos del dashboard.");
            }
        }
    }

    /// Process one event: resolve its vat, evaluate, persist. Returns the alerts written.
    pub async fn handle_event(&self, event: ReadingEvent) -> Vec<Alert> {
        let reading = event.reading();

        let Some(vat) = self.vats.find_by_sensor(&reading.sensor_id) else {
            tracing::debug!(
                "Dropping reading {}: sensor {} is not assigned to any vat",
                reading.id,
                reading.sensor_id
            );
            return Vec::new();
        };

        self.remember(&event);
        if let ReadingEvent::Inserted(_) = event {
            self.notifications.info(
                "Nueva lectura",
                format!("Se registró una nueva lectura en {}", vat.nombre),
            );
        }

        let candidates = self.evaluator.evaluate(reading, &vat);
        if candidates.is_empty() {
            return Vec::new();
        }

        self.sink.record_all(&candidates, reading, &vat).await
    }

    /// Spawn the event loop. Events are handled one at a time in arrival order.
    pub fn start(self: &Arc<Self>, feed: &dyn ChangeFeed) -> IngestHandle {
        let mut events = feed.subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let ingest = Arc::clone(self);

        let task = tokio::spawn(async move {
            tracing::info!("Reading ingest started");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            ingest.handle_event(event).await;
                        }
                        None => {
                            tracing::warn!("Change feed closed");
                            break;
                        }
                    },
                }
            }
            tracing::info!("Reading ingest stopped");
        });

        IngestHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Latest insert or update seen among the cached readings
    pub fn latest_change(&self) -> Option<DateTime<Utc>> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Reading::last_change)
            .max()
    }

    /// Cached readings, newest first
    #[cfg(test)]
    pub fn recent_readings(&self) -> Vec<Reading> {
        self.history.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn stats(&self) -> DashboardStats {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        let vats = self.vats.all();

        let sensors_with_data: HashSet<&str> =
            history.iter().map(|r| r.sensor_id.as_str()).collect();
        let vats_with_data = vats
            .iter()
            .filter(|v| {
                v.sensor_id
                    .as_deref()
                    .is_some_and(|s| sensors_with_data.contains(s))
            })
            .count();

        DashboardStats {
            total_vats: vats.len(),
            vats_with_data,
            total_readings: history.len(),
        }
    }

    fn remember(&self, event: &ReadingEvent) {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            ReadingEvent::Inserted(reading) => {
                history.insert(0, reading.clone());
                history.truncate(self.history_limit);
            }
            ReadingEvent::Updated(reading) => {
                if let Some(slot) = history.iter_mut().find(|r| r.id == reading.id) {
                    *slot = reading.clone();
                }
            }
        }
    }
}

/// Scoped subscription. `stop` ends the loop; events still queued are discarded.
pub struct IngestHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl IngestHandle {
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::error!("Reading ingest task failed: {}", e);
        }
    }
}

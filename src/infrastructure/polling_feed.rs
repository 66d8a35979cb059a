// Polling change feed over the lectura table
use crate::application::ingest::ChangeFeed;
use crate::application::monitor_repository::MonitorRepository;
use crate::application::vat_registry::VatRegistry;
use crate::domain::reading::{Reading, ReadingEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

const CHANNEL_CAPACITY: usize = 256;

/// Polls for readings inserted or updated after a moving cursor.
/// Each `subscribe` starts its own poller; it stops when the receiver is dropped.
pub struct PollingChangeFeed {
    repository: Arc<dyn MonitorRepository>,
    vats: Arc<VatRegistry>,
    interval: Duration,
    since: DateTime<Utc>,
}

impl PollingChangeFeed {
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        vats: Arc<VatRegistry>,
        interval: Duration,
        since: DateTime<Utc>,
    ) -> Self {
        Self {
            repository,
            vats,
            interval,
            since,
        }
    }
}

/// A row created after the cursor is new; anything else that changed was updated.
fn classify(reading: Reading, since: DateTime<Utc>) -> ReadingEvent {
    if reading.created_at > since {
        ReadingEvent::Inserted(reading)
    } else {
        ReadingEvent::Updated(reading)
    }
}

impl ChangeFeed for PollingChangeFeed {
    fn subscribe(&self) -> mpsc::Receiver<ReadingEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let repository = self.repository.clone();
        let vats = self.vats.clone();
        let interval = self.interval;
        let mut since = self.since;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("Polling readings every {:?} from {}", interval, since);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                // Registry may change between polls
                let sensor_ids = vats.sensor_ids();
                if sensor_ids.is_empty() {
                    continue;
                }

                let readings = match repository
                    .list_readings_changed_since(&sensor_ids, since)
                    .await
                {
                    Ok(readings) => readings,
                    Err(e) => {
                        tracing::warn!("Error polling readings: {:#}", e);
                        continue;
                    }
                };

                if !readings.is_empty() {
                    tracing::debug!("Polled {} changed readings", readings.len());
                }

                let cursor = since;
                for reading in readings {
                    since = since.max(reading.last_change());
                    if tx.send(classify(reading, cursor)).await.is_err() {
                        tracing::debug!("Change feed receiver dropped");
                        return;
                    }
                }
            }
            tracing::debug!("Change feed poller stopped");
        });

        rx
    }
}

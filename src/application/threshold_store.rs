// Threshold store - latest loaded thresholds keyed by vat id
use crate::application::monitor_repository::MonitorRepository;
use crate::domain::threshold::Threshold;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared by reference with the evaluator so every lookup sees the latest snapshot.
/// Loads replace the whole map; a failed load keeps the previous one.
pub struct ThresholdStore {
    repository: Arc<dyn MonitorRepository>,
    snapshot: RwLock<HashMap<String, Threshold>>,
}

impl ThresholdStore {
    pub fn new(repository: Arc<dyn MonitorRepository>) -> Self {
        Self {
            repository,
            snapshot: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load(&self) -> anyhow::Result<HashMap<String, Threshold>> {
        let thresholds = self.repository.list_thresholds().await?;

        let map: HashMap<String, Threshold> = thresholds
            .into_iter()
            .map(|t| (t.tina_id.clone(), t))
            .collect();

        tracing::debug!("Loaded thresholds for {} vats", map.len());
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = map.clone();
        Ok(map)
    }

    /// `None` means the vat has no alerting configured
    pub fn get(&self, vat_id: &str) -> Option<Threshold> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(vat_id)
            .cloned()
    }

    /// Apply a threshold that was just written to the backend
    pub fn put(&self, threshold: Threshold) {
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(threshold.tina_id.clone(), threshold);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

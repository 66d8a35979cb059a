// Vat registry - vats currently holding a sensor
use crate::application::monitor_repository::MonitorRepository;
use crate::domain::vat::{self, Vat};
use std::sync::{Arc, PoisonError, RwLock};

pub struct VatRegistry {
    repository: Arc<dyn MonitorRepository>,
    vats: RwLock<Vec<Vat>>,
}

impl VatRegistry {
    pub fn new(repository: Arc<dyn MonitorRepository>) -> Self {
        Self {
            repository,
            vats: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the whole list. On error the previous list is kept.
    pub async fn load(&self) -> anyhow::Result<Vec<Vat>> {
        let vats = self.repository.list_vats_with_sensor().await?;
        tracing::debug!("Loaded {} vats with sensors", vats.len());
        *self.vats.write().unwrap_or_else(PoisonError::into_inner) = vats.clone();
        Ok(vats)
    }

    pub fn find_by_sensor(&self, sensor_id: &str) -> Option<Vat> {
        let vats = self.vats.read().unwrap_or_else(PoisonError::into_inner);
        vat::find_by_sensor(&vats, sensor_id).cloned()
    }

    pub fn get(&self, vat_id: &str) -> Option<Vat> {
        self.vats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|v| v.id == vat_id)
            .cloned()
    }

    pub fn all(&self) -> Vec<Vat> {
        self.vats.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn sensor_ids(&self) -> Vec<String> {
        self.vats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|v| v.sensor_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::memory_repository::InMemoryRepository;

    #[tokio::test]
    async fn test_only_vats_with_sensors_are_loaded() {
        let repo = InMemoryRepository::new();
        repo.add_vat("t-1", "Tina-A", Some("s-1"));
        repo.add_vat("t-2", "Tina-B", None);

        let registry = VatRegistry::new(Arc::new(repo));
        registry.load().await.unwrap();

        assert_eq!(registry.all().len(), 1);
        assert_eq!(registry.sensor_ids(), vec!["s-1".to_string()]);
        assert_eq!(registry.find_by_sensor("s-1").map(|v| v.nombre), Some("Tina-A".into()));
        assert!(registry.get("t-2").is_none());
    }
}

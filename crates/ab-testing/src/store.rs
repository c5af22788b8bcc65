//! Experiment persistence on top of the external key/value store.
//!
//! Layout: `<prefix>experiment:<id>` holds the serialized experiment,
//! `<prefix>experiments` is the set of known ids and
//! `<prefix>metrics:<id>:<arm>` the per-arm counters. Dates serialize as
//! ISO-8601 strings.

use {
    crate::{assignment::Arm, experiment::Experiment, metrics::VariantMetrics},
    kv_store::{Storage, StorageError},
    std::sync::Arc,
};

pub(crate) struct ExperimentStore {
    storage: Arc<dyn Storage>,
    prefix: String,
}

impl ExperimentStore {
    pub(crate) fn new(storage: Arc<dyn Storage>, prefix: String) -> Self {
        Self { storage, prefix }
    }

    fn experiment_key(&self, id: &str) -> String {
        format!("{}experiment:{id}", self.prefix)
    }

    fn experiments_set_key(&self) -> String {
        format!("{}experiments", self.prefix)
    }

    fn metrics_key(&self, id: &str, arm: Arm) -> String {
        format!("{}metrics:{id}:{}", self.prefix, arm.as_str())
    }

    pub(crate) async fn save_experiment(&self, experiment: &Experiment) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(experiment)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.storage
            .set(&self.experiment_key(&experiment.id), &serialized)
            .await?;
        self.storage
            .sadd(&self.experiments_set_key(), &experiment.id)
            .await
    }

    pub(crate) async fn load_experiment(
        &self,
        id: &str,
    ) -> Result<Option<Experiment>, StorageError> {
        let Some(serialized) = self.storage.get(&self.experiment_key(id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&serialized)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// Loads every stored experiment. Unreadable records are skipped with a
    /// warning rather than failing the whole load.
    pub(crate) async fn load_all(&self) -> Result<Vec<Experiment>, StorageError> {
        let ids = self.storage.smembers(&self.experiments_set_key()).await?;
        let mut experiments = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_experiment(&id).await {
                Ok(Some(experiment)) => experiments.push(experiment),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(id, ?err, "skipping unreadable experiment record")
                }
            }
        }
        Ok(experiments)
    }

    pub(crate) async fn save_metrics(
        &self,
        id: &str,
        arm: Arm,
        metrics: &VariantMetrics,
    ) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(metrics)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.storage.set(&self.metrics_key(id, arm), &serialized).await
    }

    pub(crate) async fn load_metrics(
        &self,
        id: &str,
        arm: Arm,
    ) -> Result<Option<VariantMetrics>, StorageError> {
        let Some(serialized) = self.storage.get(&self.metrics_key(id, arm)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&serialized)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

use {
    crate::{
        assignment::{self, Arm},
        config::AbTestingConfig,
        error::ExperimentError,
        experiment::{CreateExperiment, Experiment, ExperimentStatus},
        metrics::{ComputedMetrics, ExecutionOutcome, VariantMetrics},
        stats::{self, Proportion, Significance},
        store::ExperimentStore,
    },
    arc_swap::ArcSwap,
    chrono::Utc,
    kv_store::Storage,
    std::{
        collections::{HashMap, HashSet},
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    },
    tokio::task::JoinHandle,
};

/// Everything known about an experiment at a point in time.
#[derive(Clone, Debug)]
pub struct ExperimentSummary {
    pub experiment: Experiment,
    pub control: ComputedMetrics,
    pub variant: ComputedMetrics,
    pub significance: Significance,
    pub runtime: Duration,
    pub ready_for_conclusion: bool,
}

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "ab_testing")]
struct Metrics {
    /// Experiments currently in the running state.
    running_experiments: prometheus::IntGauge,

    /// Execution results recorded per experiment arm.
    #[metric(labels("arm"))]
    results_recorded: prometheus::IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}

/// Experiment lifecycle management plus the hot-path variant assignment.
///
/// Writes go through the in-memory experiment map with a write-through to
/// the external store; the hot path only ever touches an atomically swapped
/// read-only map of running experiments.
#[derive(Clone)]
pub struct AbTestingFramework(Arc<Inner>);

struct Inner {
    config: AbTestingConfig,
    store: ExperimentStore,
    /// All experiments known to this instance, any status.
    experiments: Mutex<HashMap<String, Experiment>>,
    /// Read-mostly snapshot of running experiments. Replaced wholesale so
    /// readers never observe a partially rebuilt map.
    running: ArcSwap<HashMap<String, Experiment>>,
    metrics: Mutex<HashMap<(String, Arm), VariantMetrics>>,
    dirty: Mutex<HashSet<(String, Arm)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
    store_degraded: AtomicBool,
}

impl AbTestingFramework {
    pub fn new(config: AbTestingConfig, storage: Arc<dyn Storage>) -> Self {
        let store = ExperimentStore::new(storage, config.store_prefix.clone());
        Self(Arc::new(Inner {
            config,
            store,
            experiments: Mutex::new(HashMap::new()),
            running: ArcSwap::from_pointee(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
            dirty: Mutex::new(HashSet::new()),
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            store_degraded: AtomicBool::new(false),
        }))
    }

    /// Loads persisted experiments and spawns the refresh and flush loops.
    pub async fn start(&self) {
        self.reload_from_store().await;

        let framework = self.clone();
        let refresh = tokio::spawn(async move {
            loop {
                tokio::time::sleep(framework.0.config.refresh_interval).await;
                if framework.0.stopped.load(Ordering::SeqCst) {
                    break;
                }
                framework.reload_from_store().await;
            }
        });
        let framework = self.clone();
        let flush = tokio::spawn(async move {
            loop {
                tokio::time::sleep(framework.0.config.flush_interval).await;
                if framework.0.stopped.load(Ordering::SeqCst) {
                    break;
                }
                framework.flush_metrics().await;
            }
        });
        self.0.tasks.lock().unwrap().extend([refresh, flush]);
    }

    /// Stops the background loops and flushes outstanding metrics once.
    pub async fn stop(&self) {
        self.0.stopped.store(true, Ordering::SeqCst);
        for task in self.0.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        self.flush_metrics().await;
    }

    pub async fn create_experiment(
        &self,
        params: CreateExperiment,
    ) -> Result<Experiment, ExperimentError> {
        self.ensure_active()?;
        let experiment = Experiment::create(params, Utc::now())?;
        self.0
            .experiments
            .lock()
            .unwrap()
            .insert(experiment.id.clone(), experiment.clone());
        self.persist(&experiment).await;
        self.rebuild_running();
        tracing::info!(id = %experiment.id, "created experiment");
        Ok(experiment)
    }

    pub async fn get_experiment(&self, id: &str) -> Option<Experiment> {
        if let Some(experiment) = self.0.experiments.lock().unwrap().get(id) {
            return Some(experiment.clone());
        }
        match self.0.store.load_experiment(id).await {
            Ok(Some(experiment)) => {
                self.0
                    .experiments
                    .lock()
                    .unwrap()
                    .insert(id.to_owned(), experiment.clone());
                Some(experiment)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::error!(id, ?err, "failed to load experiment from store");
                None
            }
        }
    }

    pub fn list_experiments(&self, status: Option<ExperimentStatus>) -> Vec<Experiment> {
        let mut experiments: Vec<_> = self
            .0
            .experiments
            .lock()
            .unwrap()
            .values()
            .filter(|experiment| status.is_none_or(|status| experiment.status == status))
            .cloned()
            .collect();
        experiments.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        experiments
    }

    pub async fn update_experiment_status(
        &self,
        id: &str,
        status: ExperimentStatus,
    ) -> Result<Experiment, ExperimentError> {
        self.ensure_active()?;
        let updated = {
            let mut experiments = self.0.experiments.lock().unwrap();
            let experiment = experiments
                .get_mut(id)
                .ok_or_else(|| ExperimentError::NotFound(id.to_owned()))?;
            experiment.transition_to(status, Utc::now())?;
            experiment.clone()
        };
        self.persist(&updated).await;
        self.rebuild_running();
        tracing::info!(id, ?status, "experiment status updated");
        Ok(updated)
    }

    /// Hot-path deterministic assignment. O(1), allocation free: one hash of
    /// the fingerprint and one lookup in the running-experiment snapshot.
    pub fn assign_variant(&self, experiment_id: &str, fingerprint: &str) -> Option<Arm> {
        if !self.0.config.enabled || self.0.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let running = self.0.running.load();
        let experiment = running.get(experiment_id)?;
        Some(assignment::assign(experiment.traffic_split, fingerprint))
    }

    /// Assigns the fingerprint for every running experiment whose filters
    /// match the opportunity.
    pub fn assign_all_variants(
        &self,
        fingerprint: &str,
        chain: Option<u64>,
        dex: Option<&str>,
    ) -> HashMap<String, Arm> {
        if !self.0.config.enabled || self.0.stopped.load(Ordering::SeqCst) {
            return HashMap::new();
        }
        self.0
            .running
            .load()
            .iter()
            .filter(|(_, experiment)| experiment.matches(chain, dex))
            .map(|(id, experiment)| {
                (
                    id.clone(),
                    assignment::assign(experiment.traffic_split, fingerprint),
                )
            })
            .collect()
    }

    /// Streams one execution outcome into the per-arm aggregator. The
    /// aggregate is flushed to the store by the background loop.
    pub fn record_result(
        &self,
        experiment_id: &str,
        arm: Arm,
        outcome: ExecutionOutcome,
        latency_ms: u64,
        mev_frontrun_detected: bool,
    ) -> Result<(), ExperimentError> {
        self.ensure_active()?;
        if !self.0.experiments.lock().unwrap().contains_key(experiment_id) {
            return Err(ExperimentError::NotFound(experiment_id.to_owned()));
        }
        let key = (experiment_id.to_owned(), arm);
        self.0
            .metrics
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .record(&outcome, latency_ms, mev_frontrun_detected, Utc::now());
        self.0.dirty.lock().unwrap().insert(key);
        Metrics::get()
            .results_recorded
            .with_label_values(&[arm.as_str()])
            .inc();
        Ok(())
    }

    pub async fn get_experiment_summary(&self, id: &str) -> Option<ExperimentSummary> {
        let experiment = self.get_experiment(id).await?;
        let control = self.arm_metrics(id, Arm::Control).await;
        let variant = self.arm_metrics(id, Arm::Variant).await;

        let significance = stats::calculate_significance(
            Proportion::new(control.success_count, control.sample_size()),
            Proportion::new(variant.success_count, variant.sample_size()),
            self.0.config.significance_threshold,
            experiment.min_sample_size,
        );
        let runtime = (experiment.ended_at.unwrap_or_else(Utc::now) - experiment.started_at)
            .to_std()
            .unwrap_or_default();
        let ready_for_conclusion = control.sample_size() >= experiment.min_sample_size
            && variant.sample_size() >= experiment.min_sample_size
            && significance.significant;

        Some(ExperimentSummary {
            experiment,
            control: control.computed(),
            variant: variant.computed(),
            significance,
            runtime,
            ready_for_conclusion,
        })
    }

    /// Whether the external store is currently unreachable and the framework
    /// degraded to in-memory-only operation.
    pub fn is_store_degraded(&self) -> bool {
        self.0.store_degraded.load(Ordering::SeqCst)
    }

    async fn arm_metrics(&self, id: &str, arm: Arm) -> VariantMetrics {
        if let Some(metrics) = self
            .0
            .metrics
            .lock()
            .unwrap()
            .get(&(id.to_owned(), arm))
        {
            return metrics.clone();
        }
        match self.0.store.load_metrics(id, arm).await {
            Ok(Some(metrics)) => {
                self.0
                    .metrics
                    .lock()
                    .unwrap()
                    .insert((id.to_owned(), arm), metrics.clone());
                metrics
            }
            Ok(None) => VariantMetrics::default(),
            Err(err) => {
                tracing::error!(id, arm = arm.as_str(), ?err, "failed to load metrics");
                VariantMetrics::default()
            }
        }
    }

    fn ensure_active(&self) -> Result<(), ExperimentError> {
        if self.0.stopped.load(Ordering::SeqCst) {
            return Err(ExperimentError::Stopped);
        }
        Ok(())
    }

    async fn persist(&self, experiment: &Experiment) {
        if let Err(err) = self.0.store.save_experiment(experiment).await {
            self.0.store_degraded.store(true, Ordering::SeqCst);
            tracing::error!(
                id = %experiment.id,
                ?err,
                "store unavailable, continuing in memory only"
            );
        } else {
            self.0.store_degraded.store(false, Ordering::SeqCst);
        }
    }

    async fn reload_from_store(&self) {
        match self.0.store.load_all().await {
            Ok(stored) => {
                self.0.store_degraded.store(false, Ordering::SeqCst);
                {
                    let mut experiments = self.0.experiments.lock().unwrap();
                    for experiment in stored {
                        experiments.insert(experiment.id.clone(), experiment);
                    }
                }
                self.rebuild_running();
            }
            Err(err) => {
                // Keep serving the previous snapshot.
                self.0.store_degraded.store(true, Ordering::SeqCst);
                tracing::error!(?err, "failed to refresh experiments from store");
            }
        }
    }

    /// Builds a complete fresh map of running experiments, then swaps it in
    /// atomically.
    fn rebuild_running(&self) {
        let running: HashMap<String, Experiment> = self
            .0
            .experiments
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, experiment)| experiment.status == ExperimentStatus::Running)
            .map(|(id, experiment)| (id.clone(), experiment.clone()))
            .collect();
        Metrics::get()
            .running_experiments
            .set(i64::try_from(running.len()).unwrap_or(i64::MAX));
        self.0.running.store(Arc::new(running));
    }

    async fn flush_metrics(&self) {
        let dirty: Vec<(String, Arm)> = self.0.dirty.lock().unwrap().drain().collect();
        if dirty.is_empty() {
            return;
        }
        let snapshot: Vec<_> = {
            let metrics = self.0.metrics.lock().unwrap();
            dirty
                .iter()
                .filter_map(|key| metrics.get(key).map(|value| (key.clone(), value.clone())))
                .collect()
        };
        for ((id, arm), metrics) in snapshot {
            if let Err(err) = self.0.store.save_metrics(&id, arm, &metrics).await {
                self.0.store_degraded.store(true, Ordering::SeqCst);
                tracing::error!(id, arm = arm.as_str(), ?err, "failed to flush metrics");
                self.0.dirty.lock().unwrap().insert((id, arm));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::stats::Recommendation,
        alloy_primitives::U256,
        kv_store::{InMemoryStorage, MockStorage, StorageError},
    };

    fn params(name: &str, split: f64) -> CreateExperiment {
        CreateExperiment {
            name: name.to_owned(),
            control_strategy: "baseline".to_owned(),
            variant_strategy: "aggressive".to_owned(),
            traffic_split: split,
            min_sample_size: 100,
            chain_filter: None,
            dex_filter: None,
        }
    }

    fn outcome(success: bool) -> ExecutionOutcome {
        ExecutionOutcome {
            success,
            profit: U256::from(100u64),
            gas_cost: U256::from(10u64),
        }
    }

    async fn framework() -> (AbTestingFramework, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let framework = AbTestingFramework::new(AbTestingConfig::default(), storage.clone());
        framework.start().await;
        (framework, storage)
    }

    #[tokio::test]
    async fn create_and_reload_round_trip() {
        let (framework, storage) = framework().await;
        let experiment = framework.create_experiment(params("reload", 0.3)).await.unwrap();

        // A second instance sharing the store sees the experiment.
        let second = AbTestingFramework::new(AbTestingConfig::default(), storage);
        second.start().await;
        let loaded = second.get_experiment(&experiment.id).await.unwrap();
        assert_eq!(loaded, experiment);
    }

    #[tokio::test]
    async fn assignment_requires_running_status() {
        let (framework, _) = framework().await;
        let experiment = framework.create_experiment(params("gate", 0.5)).await.unwrap();

        // Draft experiments assign nothing.
        assert_eq!(framework.assign_variant(&experiment.id, "opp-1"), None);

        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();
        assert!(framework.assign_variant(&experiment.id, "opp-1").is_some());

        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Paused)
            .await
            .unwrap();
        assert_eq!(framework.assign_variant(&experiment.id, "opp-1"), None);
    }

    #[tokio::test]
    async fn assignment_is_deterministic_across_instances() {
        let (framework, storage) = framework().await;
        let experiment = framework.create_experiment(params("stable", 0.1)).await.unwrap();
        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();

        let assignment = framework.assign_variant(&experiment.id, "opp-123-abc").unwrap();
        for _ in 0..3 {
            assert_eq!(
                framework.assign_variant(&experiment.id, "opp-123-abc"),
                Some(assignment)
            );
        }

        // A restarted instance assigns identically.
        let second = AbTestingFramework::new(AbTestingConfig::default(), storage);
        second.start().await;
        assert_eq!(
            second.assign_variant(&experiment.id, "opp-123-abc"),
            Some(assignment)
        );
    }

    #[tokio::test]
    async fn assign_all_respects_filters() {
        let (framework, _) = framework().await;
        let mut filtered = params("mainnet-only", 0.5);
        filtered.chain_filter = Some(1);
        let everywhere = framework.create_experiment(params("everywhere", 0.5)).await.unwrap();
        let mainnet = framework.create_experiment(filtered).await.unwrap();
        for id in [&everywhere.id, &mainnet.id] {
            framework
                .update_experiment_status(id, ExperimentStatus::Running)
                .await
                .unwrap();
        }

        let all = framework.assign_all_variants("opp-9", Some(1), None);
        assert_eq!(all.len(), 2);
        let polygon = framework.assign_all_variants("opp-9", Some(137), None);
        assert_eq!(polygon.len(), 1);
        assert!(polygon.contains_key(&everywhere.id));
    }

    #[tokio::test]
    async fn invalid_transitions_surface() {
        let (framework, _) = framework().await;
        let experiment = framework.create_experiment(params("t", 0.5)).await.unwrap();
        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();
        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Completed)
            .await
            .unwrap();

        assert!(matches!(
            framework
                .update_experiment_status(&experiment.id, ExperimentStatus::Running)
                .await,
            Err(ExperimentError::InvalidStatusTransition { .. })
        ));
        assert!(matches!(
            framework
                .update_experiment_status("missing", ExperimentStatus::Running)
                .await,
            Err(ExperimentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn summary_reaches_significance() {
        let (framework, _) = framework().await;
        let experiment = framework.create_experiment(params("sig", 0.5)).await.unwrap();
        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();

        for index in 0..100 {
            framework
                .record_result(&experiment.id, Arm::Control, outcome(index < 70), 50, false)
                .unwrap();
            framework
                .record_result(&experiment.id, Arm::Variant, outcome(index < 90), 40, false)
                .unwrap();
        }

        let summary = framework.get_experiment_summary(&experiment.id).await.unwrap();
        assert_eq!(summary.control.sample_size, 100);
        assert_eq!(summary.variant.sample_size, 100);
        assert!(summary.significance.significant);
        assert_eq!(
            summary.significance.recommendation,
            Recommendation::AdoptVariant
        );
        assert!(summary.ready_for_conclusion);
        assert!((summary.significance.effect_size - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn metrics_survive_restarts_via_flush() {
        let (framework, storage) = framework().await;
        let experiment = framework.create_experiment(params("persist", 0.5)).await.unwrap();
        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();
        framework
            .record_result(&experiment.id, Arm::Variant, outcome(true), 10, false)
            .unwrap();
        // stop() flushes outstanding metrics.
        framework.stop().await;

        let second = AbTestingFramework::new(AbTestingConfig::default(), storage);
        second.start().await;
        let summary = second.get_experiment_summary(&experiment.id).await.unwrap();
        assert_eq!(summary.variant.sample_size, 1);
    }

    #[tokio::test]
    async fn recording_for_unknown_experiment_fails() {
        let (framework, _) = framework().await;
        assert!(matches!(
            framework.record_result("missing", Arm::Control, outcome(true), 1, false),
            Err(ExperimentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stopped_framework_rejects_operations() {
        let (framework, _) = framework().await;
        framework.stop().await;
        assert!(matches!(
            framework.create_experiment(params("late", 0.5)).await,
            Err(ExperimentError::Stopped)
        ));
        assert_eq!(framework.assign_variant("any", "fp"), None);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_memory_only() {
        let mut storage = MockStorage::new();
        storage
            .expect_set()
            .returning(|_, _| Err(StorageError::Unavailable("down".to_owned())));
        storage
            .expect_sadd()
            .returning(|_, _| Err(StorageError::Unavailable("down".to_owned())));
        storage
            .expect_smembers()
            .returning(|_| Err(StorageError::Unavailable("down".to_owned())));
        storage
            .expect_get()
            .returning(|_| Err(StorageError::Unavailable("down".to_owned())));

        let framework =
            AbTestingFramework::new(AbTestingConfig::default(), Arc::new(storage));
        framework.start().await;

        // Creation still works in memory and the degradation is flagged.
        let experiment = framework.create_experiment(params("degraded", 0.5)).await.unwrap();
        assert!(framework.is_store_degraded());
        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();
        assert!(framework.assign_variant(&experiment.id, "opp").is_some());
    }

    #[tokio::test]
    async fn disabled_framework_assigns_nothing() {
        let config = AbTestingConfig {
            enabled: false,
            ..Default::default()
        };
        let framework = AbTestingFramework::new(config, Arc::new(InMemoryStorage::new()));
        framework.start().await;
        let experiment = framework.create_experiment(params("off", 1.0)).await.unwrap();
        framework
            .update_experiment_status(&experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();
        assert_eq!(framework.assign_variant(&experiment.id, "opp"), None);
        assert!(framework.assign_all_variants("opp", None, None).is_empty());
    }
}

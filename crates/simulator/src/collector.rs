use {
    crate::service::SimulationService,
    std::{sync::Arc, time::Duration},
};

/// Periodically snapshots provider health and aggregated counters into the
/// process-wide metrics registry.
pub struct MetricsCollector {
    pub service: Arc<SimulationService>,
    pub interval: Duration,
}

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "simulation")]
struct Metrics {
    /// Whether the provider currently counts as healthy.
    #[metric(labels("provider"))]
    provider_healthy: prometheus::IntGaugeVec,

    /// Success rate over the provider's trailing request window.
    #[metric(labels("provider"))]
    provider_success_rate: prometheus::GaugeVec,

    /// Rolling average latency of successful provider calls.
    #[metric(labels("provider"))]
    provider_average_latency_ms: prometheus::GaugeVec,

    /// Simulations dispatched to any provider.
    total_simulations: prometheus::IntGauge,

    /// Opportunities that skipped simulation per the tier policy.
    skipped_simulations: prometheus::IntGauge,

    /// Dispatches the service actually performed.
    performed_simulations: prometheus::IntGauge,

    /// Simulations predicting an on-chain revert.
    predicted_reverts: prometheus::IntGauge,

    /// Dispatches where every provider failed.
    simulation_errors: prometheus::IntGauge,

    /// Success rate across all providers.
    success_rate: prometheus::Gauge,

    /// Successful dispatches served by a fallback provider.
    fallback_used: prometheus::IntGauge,

    /// Results served from the cache.
    cache_hits: prometheus::IntGauge,

    /// Service condition (1 for the active status label, 0 otherwise).
    #[metric(labels("status"))]
    service_status: prometheus::IntGaugeVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}

impl MetricsCollector {
    pub fn new(service: Arc<SimulationService>) -> Self {
        Self {
            service,
            interval: Duration::from_secs(30),
        }
    }

    /// Spawns the collection loop. The loop never propagates errors and
    /// skips collection while the service is stopped.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if !self.service.is_stopped() {
                    collect(&self.service);
                }
                tokio::time::sleep(self.interval).await;
            }
        })
    }
}

fn collect(service: &SimulationService) {
    let metrics = Metrics::get();

    for (name, health) in service.providers_health() {
        metrics
            .provider_healthy
            .with_label_values(&[name])
            .set(i64::from(health.healthy));
        metrics
            .provider_success_rate
            .with_label_values(&[name])
            .set(health.success_rate);
        metrics
            .provider_average_latency_ms
            .with_label_values(&[name])
            .set(health.average_latency_ms);
    }

    let aggregated = service.aggregated_metrics();
    let as_gauge = |value: u64| i64::try_from(value).unwrap_or(i64::MAX);
    metrics
        .total_simulations
        .set(as_gauge(aggregated.total_simulations));
    metrics.skipped_simulations.set(as_gauge(aggregated.skipped));
    metrics
        .performed_simulations
        .set(as_gauge(aggregated.performed));
    metrics
        .predicted_reverts
        .set(as_gauge(aggregated.predicted_reverts));
    metrics.simulation_errors.set(as_gauge(aggregated.errors));
    metrics.success_rate.set(aggregated.success_rate);
    metrics.fallback_used.set(as_gauge(aggregated.fallback_used));
    metrics.cache_hits.set(as_gauge(aggregated.cache_hits));

    let status = service.status();
    for label in ["healthy", "degraded", "not_configured"] {
        metrics
            .service_status
            .with_label_values(&[label])
            .set(i64::from(label == status.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::config::SimulationConfig};

    #[test]
    fn collect_handles_empty_service() {
        let service = Arc::new(SimulationService::new(
            SimulationConfig::default(),
            Vec::new(),
        ));
        // Must never panic, even with nothing configured.
        collect(&service);
        assert_eq!(service.status().as_str(), "not_configured");
    }
}

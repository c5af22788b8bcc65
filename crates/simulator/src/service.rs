use {
    crate::{
        cache::SimulationCache,
        config::SimulationConfig,
        error::SimulationError,
        health::ProviderHealth,
        provider::SimulationProvider,
        request::{SimulationRequest, SimulationResult},
    },
    std::{
        collections::HashMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    },
};

/// How long a computed provider ordering stays valid.
const ORDERING_TTL: Duration = Duration::from_secs(1);

/// How much pre-flight simulation a candidate trade gets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationTier {
    /// Skip simulation entirely.
    None,
    /// Only the cheap local provider.
    Light,
    /// Full provider ordering with fallback.
    Full,
}

/// Coarse service condition derived from provider health.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    NotConfigured,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::NotConfigured => "not_configured",
        }
    }
}

/// Counters aggregated across the service and all its providers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatedMetrics {
    pub total_simulations: u64,
    pub skipped: u64,
    pub performed: u64,
    pub successful: u64,
    pub failed: u64,
    pub predicted_reverts: u64,
    pub success_rate: f64,
    pub fallback_used: u64,
    pub cache_hits: u64,
    /// Dispatches where every provider failed.
    pub errors: u64,
}

struct OrderingCache {
    /// Names of the enabled providers the ordering was computed for.
    key: Vec<&'static str>,
    computed_at: Instant,
    ordered: Vec<Arc<dyn SimulationProvider>>,
}

/// Dispatches simulation requests to the best available provider, falling
/// back through the rest on failure and caching successful results.
pub struct SimulationService {
    config: SimulationConfig,
    providers: Vec<Arc<dyn SimulationProvider>>,
    cache: Mutex<SimulationCache>,
    ordering: Mutex<Option<OrderingCache>>,
    stopped: AtomicBool,
    skipped: AtomicU64,
    performed: AtomicU64,
    cache_hits: AtomicU64,
    fallback_used: AtomicU64,
    errors: AtomicU64,
}

impl SimulationService {
    pub fn new(config: SimulationConfig, providers: Vec<Arc<dyn SimulationProvider>>) -> Self {
        let cache = SimulationCache::new(config.cache_ttl);
        Self {
            config,
            providers,
            cache: Mutex::new(cache),
            ordering: Mutex::new(None),
            stopped: AtomicBool::new(false),
            skipped: AtomicU64::new(0),
            performed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            fallback_used: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Simulates with the full provider ordering.
    pub async fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<SimulationResult, SimulationError> {
        self.simulate_with_tier(request, SimulationTier::Full).await
    }

    /// Simulates restricted to the providers the tier allows.
    pub async fn simulate_with_tier(
        &self,
        request: &SimulationRequest,
        tier: SimulationTier,
    ) -> Result<SimulationResult, SimulationError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SimulationError::ServiceStopped);
        }

        let key = request.cache_key();
        if let Some(hit) = self.cache.lock().unwrap().get(&key, Instant::now()) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            if let Some(provider) = self
                .providers
                .iter()
                .find(|provider| provider.name() == hit.provider)
            {
                provider.note_cache_hit();
            }
            return Ok(hit);
        }

        let mut providers = self.ordered_providers();
        if tier == SimulationTier::Light {
            providers.retain(|provider| provider.is_local());
        }
        if providers.is_empty() {
            return Err(SimulationError::NoProvidersAvailable);
        }

        self.performed.fetch_add(1, Ordering::Relaxed);
        let primary = &providers[0];
        let result = primary.simulate(request).await;
        // A predicted revert is still a successful simulation; only a
        // provider that produced no answer triggers fallback.
        if result.success {
            self.store(key, &result);
            return Ok(result);
        }
        if !self.config.enable_fallback {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return Ok(result);
        }

        tracing::warn!(
            provider = primary.name(),
            error = result.error.as_deref().unwrap_or_default(),
            "primary simulation provider failed, trying fallbacks"
        );
        let mut last = result;
        for provider in &providers[1..] {
            let result = provider.simulate(request).await;
            if result.success {
                provider.note_fallback_use();
                self.fallback_used.fetch_add(1, Ordering::Relaxed);
                self.store(key, &result);
                return Ok(result);
            }
            last = result;
        }
        // The result is already tagged with the identity of the last
        // provider that was tried.
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(provider = last.provider, "all simulation providers failed");
        Ok(last)
    }

    fn store(&self, key: String, result: &SimulationResult) {
        if result.success {
            self.cache
                .lock()
                .unwrap()
                .insert(key, result.clone(), Instant::now());
        }
    }

    /// The tier the policy assigns to an opportunity of this value and age.
    pub fn simulation_tier(
        &self,
        expected_profit_usd: f64,
        opportunity_age: Duration,
    ) -> SimulationTier {
        if self.config.bypass_for_time_critical
            && opportunity_age > self.config.time_critical_threshold
        {
            return SimulationTier::None;
        }
        if expected_profit_usd < self.config.no_simulation_threshold_usd {
            return SimulationTier::None;
        }
        if expected_profit_usd < self.config.light_simulation_threshold_usd {
            return SimulationTier::Light;
        }
        SimulationTier::Full
    }

    /// Fast-path check whether simulating is worth it at all. Scans for any
    /// enabled provider without computing an ordering.
    pub fn should_simulate(&self, expected_profit_usd: f64, opportunity_age: Duration) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        if !self.providers.iter().any(|provider| provider.is_enabled()) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.simulation_tier(expected_profit_usd, opportunity_age) {
            SimulationTier::None => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                false
            }
            SimulationTier::Light | SimulationTier::Full => true,
        }
    }

    /// Enabled providers, best score first. Recomputed at most once per
    /// second per enabled-provider set.
    pub fn ordered_providers(&self) -> Vec<Arc<dyn SimulationProvider>> {
        let enabled: Vec<_> = self
            .providers
            .iter()
            .filter(|provider| provider.is_enabled())
            .cloned()
            .collect();
        let key: Vec<_> = enabled.iter().map(|provider| provider.name()).collect();

        let mut ordering = self.ordering.lock().unwrap();
        if let Some(cached) = ordering.as_ref()
            && cached.key == key
            && cached.computed_at.elapsed() < ORDERING_TTL
        {
            return cached.ordered.clone();
        }

        let mut scored: Vec<_> = enabled
            .into_iter()
            .map(|provider| {
                let score = self.score(provider.as_ref());
                (provider, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let ordered: Vec<_> = scored.into_iter().map(|(provider, _)| provider).collect();

        *ordering = Some(OrderingCache {
            key,
            computed_at: Instant::now(),
            ordered: ordered.clone(),
        });
        ordered
    }

    /// Live provider score. Health dominates, then the trailing success
    /// rate, then latency; a configured priority position biases without
    /// overriding.
    fn score(&self, provider: &dyn SimulationProvider) -> f64 {
        let health = provider.health();
        let mut score = if health.healthy { 100.0 } else { 0.0 };
        score += health.success_rate * 50.0;
        score += if health.average_latency_ms > 0.0 {
            (3000.0 / health.average_latency_ms).min(30.0)
        } else {
            15.0
        };
        if let Some(index) = self
            .config
            .provider_priority
            .iter()
            .position(|name| name == provider.name())
        {
            score += 20.0 - 5.0 * index as f64;
        }
        score
    }

    pub fn providers_health(&self) -> HashMap<&'static str, ProviderHealth> {
        self.providers
            .iter()
            .map(|provider| (provider.name(), provider.health()))
            .collect()
    }

    pub fn aggregated_metrics(&self) -> AggregatedMetrics {
        let mut aggregated = AggregatedMetrics {
            skipped: self.skipped.load(Ordering::Relaxed),
            performed: self.performed.load(Ordering::Relaxed),
            fallback_used: self.fallback_used.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            ..Default::default()
        };
        for provider in &self.providers {
            let metrics = provider.metrics();
            aggregated.total_simulations += metrics.total_simulations;
            aggregated.successful += metrics.successful_simulations;
            aggregated.failed += metrics.failed_simulations;
            aggregated.predicted_reverts += metrics.predicted_reverts;
        }
        let finished = aggregated.successful + aggregated.failed;
        aggregated.success_rate = if finished == 0 {
            0.0
        } else {
            aggregated.successful as f64 / finished as f64
        };
        aggregated
    }

    pub fn status(&self) -> ServiceStatus {
        if !self.providers.iter().any(|provider| provider.is_enabled()) {
            return ServiceStatus::NotConfigured;
        }
        if self
            .providers
            .iter()
            .any(|provider| provider.is_enabled() && provider.health().healthy)
        {
            ServiceStatus::Healthy
        } else {
            ServiceStatus::Degraded
        }
    }

    /// Makes all subsequent operations fail with "service stopped".
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

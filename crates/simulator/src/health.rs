use {
    chrono::{DateTime, Utc},
    rolling_stats::{RollingAverage, SuccessRateWindow},
    std::sync::Mutex,
};

/// Consecutive failures after which a provider is considered unhealthy.
const UNHEALTHY_AFTER: u32 = 3;
/// Number of trailing request outcomes the success rate is computed over.
const SUCCESS_WINDOW: usize = 100;
/// Number of latency samples the rolling average is computed over.
const LATENCY_WINDOW: usize = 100;

/// Live health snapshot of one provider.
///
/// Providers start unhealthy with a zero success rate: "unknown" must never
/// look better than "validated".
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub average_latency_ms: f64,
    pub success_rate: f64,
}

/// Monotonic provider counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderMetrics {
    pub total_simulations: u64,
    pub successful_simulations: u64,
    pub failed_simulations: u64,
    pub predicted_reverts: u64,
    pub average_latency_ms: f64,
    pub fallback_used: u64,
    pub cache_hits: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Result of an explicit provider health probe.
#[derive(Clone, Debug, PartialEq)]
pub struct HealthCheck {
    pub healthy: bool,
    pub message: String,
}

/// Shared health/metrics bookkeeping every provider embeds.
///
/// The mutex only guards plain arithmetic and is never held across an await.
pub struct HealthTracker(Mutex<Inner>);

struct Inner {
    healthy: bool,
    last_check: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    last_error: Option<String>,
    latency: RollingAverage,
    window: SuccessRateWindow,
    metrics: ProviderMetrics,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self(Mutex::new(Inner {
            healthy: false,
            last_check: None,
            consecutive_failures: 0,
            last_error: None,
            latency: RollingAverage::new(LATENCY_WINDOW),
            window: SuccessRateWindow::new(SUCCESS_WINDOW),
            metrics: ProviderMetrics::default(),
        }))
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts an attempt. Called before dispatch so even early exits are
    /// accounted for.
    pub fn record_attempt(&self) {
        let mut inner = self.0.lock().unwrap();
        inner.metrics.total_simulations += 1;
        inner.metrics.last_updated = Some(Utc::now());
    }

    pub fn record_success(&self, latency_ms: u64, predicted_revert: bool) {
        let mut inner = self.0.lock().unwrap();
        inner.healthy = true;
        inner.consecutive_failures = 0;
        inner.last_check = Some(Utc::now());
        inner.last_error = None;
        inner.latency.update(latency_ms as f64);
        inner.window.record(true);
        inner.metrics.successful_simulations += 1;
        if predicted_revert {
            inner.metrics.predicted_reverts += 1;
        }
        inner.metrics.average_latency_ms = inner.latency.average();
        inner.metrics.last_updated = Some(Utc::now());
    }

    pub fn record_failure(&self, error: &str) {
        let mut inner = self.0.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= UNHEALTHY_AFTER {
            inner.healthy = false;
        }
        inner.last_check = Some(Utc::now());
        inner.last_error = Some(error.to_owned());
        inner.window.record(false);
        inner.metrics.failed_simulations += 1;
        inner.metrics.last_updated = Some(Utc::now());
    }

    pub fn record_fallback_use(&self) {
        let mut inner = self.0.lock().unwrap();
        inner.metrics.fallback_used += 1;
        inner.metrics.last_updated = Some(Utc::now());
    }

    pub fn record_cache_hit(&self) {
        let mut inner = self.0.lock().unwrap();
        inner.metrics.cache_hits += 1;
        inner.metrics.last_updated = Some(Utc::now());
    }

    pub fn health(&self) -> ProviderHealth {
        let inner = self.0.lock().unwrap();
        ProviderHealth {
            healthy: inner.healthy,
            last_check: inner.last_check,
            consecutive_failures: inner.consecutive_failures,
            last_error: inner.last_error.clone(),
            average_latency_ms: inner.latency.average(),
            success_rate: inner.window.rate(),
        }
    }

    pub fn metrics(&self) -> ProviderMetrics {
        self.0.lock().unwrap().metrics.clone()
    }

    /// Clears the monotonic counters. Health state (consecutive failures,
    /// rolling windows) is deliberately kept; resetting metrics must not make
    /// a failing provider look fresh.
    pub fn reset_metrics(&self) {
        let mut inner = self.0.lock().unwrap();
        inner.metrics = ProviderMetrics {
            last_updated: Some(Utc::now()),
            ..Default::default()
        };
    }
}

use {serde::Deserialize, std::time::Duration};

/// Tuning knobs of the simulation service. The defaults are the production
/// values; deployments override individual fields through their config file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulationConfig {
    /// Trades expected to make less than this (USD) skip simulation
    /// entirely.
    pub no_simulation_threshold_usd: f64,
    /// Trades below this (USD) only get the cheap local simulation.
    pub light_simulation_threshold_usd: f64,
    /// Opportunities older than this are too stale to spend a round trip on.
    #[serde(with = "humantime_serde")]
    pub time_critical_threshold: Duration,
    /// Whether stale opportunities bypass simulation altogether.
    pub bypass_for_time_critical: bool,
    /// Whether a failing primary provider falls through to the others.
    pub enable_fallback: bool,
    /// How long cached simulation results stay valid.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
    /// Provider names biased towards the front of the ordering. Position 0
    /// gets the largest boost; this biases the score, it never overrides it.
    pub provider_priority: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            no_simulation_threshold_usd: 50.0,
            light_simulation_threshold_usd: 500.0,
            time_critical_threshold: Duration::from_millis(2000),
            bypass_for_time_critical: true,
            enable_fallback: true,
            cache_ttl: Duration::from_secs(30),
            provider_priority: Vec::new(),
        }
    }
}

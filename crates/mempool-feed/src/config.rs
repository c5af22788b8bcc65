use {
    alloy_primitives::Address,
    serde::Deserialize,
    std::time::Duration,
    url::Url,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeedConfig {
    /// Websocket endpoint of the feed provider.
    pub url: Url,
    /// Opaque authentication string forwarded in the subscribe frame.
    pub auth_token: String,
    /// Chains to subscribe pending transactions for.
    pub chains: Vec<u64>,
    /// When set, only transactions to one of these routers are emitted.
    #[serde(default)]
    pub router_allowlist: Option<Vec<Address>>,
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl FeedConfig {
    pub(crate) fn connect_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(Duration::from_secs(10))
    }
}

/// Exponential backoff schedule for reconnection attempts.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReconnectConfig {
    #[serde(with = "humantime_serde")]
    pub base_interval: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 10,
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given 1-based attempt.
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1).min(16)).unwrap_or(16);
        self.base_interval.mul_f64(self.multiplier.powi(exponent))
    }
}

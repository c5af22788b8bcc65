use {serde::Deserialize, std::time::Duration};

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AbTestingConfig {
    /// A disabled framework assigns no variants at all.
    pub enabled: bool,
    /// Key prefix in the external store.
    pub store_prefix: String,
    /// How often the running-experiment cache is rebuilt.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// How often buffered metrics flush to the store.
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Two-tailed p-value below which a difference counts as significant.
    pub significance_threshold: f64,
}

impl Default for AbTestingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_prefix: "ab:".to_owned(),
            refresh_interval: Duration::from_secs(60),
            flush_interval: Duration::from_secs(10),
            significance_threshold: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AbTestingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.significance_threshold, 0.05);
    }
}

use {
    crate::error::ExperimentError,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Lifecycle of an experiment. Exactly one status holds at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl ExperimentStatus {
    /// Legal lifecycle transitions. Terminal statuses have none.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ExperimentStatus::*;
        matches!(
            (self, next),
            (Draft, Running)
                | (Draft, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Completed)
                | (Paused, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Parameters for creating a new experiment.
#[derive(Clone, Debug)]
pub struct CreateExperiment {
    pub name: String,
    pub control_strategy: String,
    pub variant_strategy: String,
    /// Fraction of eligible opportunities routed to the variant arm.
    pub traffic_split: f64,
    pub min_sample_size: u64,
    pub chain_filter: Option<u64>,
    pub dex_filter: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub control_strategy: String,
    pub variant_strategy: String,
    pub traffic_split: f64,
    pub min_sample_size: u64,
    pub started_at: DateTime<Utc>,
    /// Set when the experiment completes or gets cancelled.
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ExperimentStatus,
    pub chain_filter: Option<u64>,
    pub dex_filter: Option<String>,
}

impl Experiment {
    pub fn create(params: CreateExperiment, now: DateTime<Utc>) -> Result<Self, ExperimentError> {
        if !(0.0..=1.0).contains(&params.traffic_split) {
            return Err(ExperimentError::InvalidTrafficSplit(params.traffic_split));
        }
        Ok(Self {
            id: generate_id(&params.name, now),
            name: params.name,
            control_strategy: params.control_strategy,
            variant_strategy: params.variant_strategy,
            traffic_split: params.traffic_split,
            min_sample_size: params.min_sample_size,
            started_at: now,
            ended_at: None,
            status: ExperimentStatus::Draft,
            chain_filter: params.chain_filter,
            dex_filter: params.dex_filter,
        })
    }

    /// Moves the experiment to `next`, stamping the end time on terminal
    /// transitions.
    pub fn transition_to(
        &mut self,
        next: ExperimentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), ExperimentError> {
        if !self.status.can_transition_to(next) {
            return Err(ExperimentError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.ended_at = Some(now);
        }
        Ok(())
    }

    /// Whether an opportunity on this chain/DEX is eligible.
    pub fn matches(&self, chain: Option<u64>, dex: Option<&str>) -> bool {
        self.chain_filter.is_none_or(|filter| chain == Some(filter))
            && self
                .dex_filter
                .as_deref()
                .is_none_or(|filter| dex == Some(filter))
    }
}

/// Experiment id: lowercased name with every non-alphanumeric run collapsed
/// to one dash, suffixed with the creation timestamp in base 36.
fn generate_id(name: &str, now: DateTime<Utc>) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for character in name.chars() {
        if character.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(character.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("experiment");
    }
    format!("{slug}-{}", base36(now.timestamp_millis().max(0) as u64))
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut encoded = Vec::new();
    while value > 0 {
        encoded.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    encoded.reverse();
    String::from_utf8(encoded).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn id_is_slugged_and_timestamped() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let experiment = Experiment::create(params("Gas Boost v2!", 0.1), now).unwrap();
        assert_eq!(
            experiment.id,
            format!("gas-boost-v2-{}", base36(1_700_000_000_000))
        );
        assert_eq!(experiment.status, ExperimentStatus::Draft);
    }

    #[test]
    fn base36_round_numbers() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn traffic_split_is_validated() {
        let now = Utc::now();
        assert!(Experiment::create(params("x", -0.1), now).is_err());
        assert!(Experiment::create(params("x", 1.1), now).is_err());
        assert!(Experiment::create(params("x", 0.0), now).is_ok());
        assert!(Experiment::create(params("x", 1.0), now).is_ok());
    }

    #[test]
    fn legal_transitions() {
        use ExperimentStatus::*;
        let now = Utc::now();
        let mut experiment = Experiment::create(params("x", 0.5), now).unwrap();

        experiment.transition_to(Running, now).unwrap();
        experiment.transition_to(Paused, now).unwrap();
        experiment.transition_to(Running, now).unwrap();
        experiment.transition_to(Completed, now).unwrap();
        assert_eq!(experiment.ended_at, Some(now));
        assert!(experiment.started_at <= experiment.ended_at.unwrap());

        // Terminal statuses accept no further transitions.
        assert!(matches!(
            experiment.transition_to(Running, now),
            Err(ExperimentError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn skipping_draft_is_illegal() {
        use ExperimentStatus::*;
        let now = Utc::now();
        let mut experiment = Experiment::create(params("x", 0.5), now).unwrap();
        assert!(experiment.transition_to(Paused, now).is_err());
        assert!(experiment.transition_to(Completed, now).is_err());
    }

    #[test]
    fn filters() {
        let now = Utc::now();
        let mut experiment = Experiment::create(params("x", 0.5), now).unwrap();
        assert!(experiment.matches(Some(1), Some("uniswapV2")));

        experiment.chain_filter = Some(1);
        experiment.dex_filter = Some("uniswapV2".to_owned());
        assert!(experiment.matches(Some(1), Some("uniswapV2")));
        assert!(!experiment.matches(Some(137), Some("uniswapV2")));
        assert!(!experiment.matches(Some(1), Some("curve")));
        assert!(!experiment.matches(None, None));
    }

    #[test]
    fn serialization_uses_iso_dates() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let experiment = Experiment::create(params("x", 0.5), now).unwrap();
        let json = serde_json::to_string(&experiment).unwrap();
        assert!(json.contains("2023-11-14T22:13:20Z"), "{json}");
        let parsed: Experiment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, experiment);
    }
}

//! Remote-rich simulation through the Tenderly simulate API, including state
//! diff and log extraction.

use {
    super::SimulationProvider,
    crate::{
        health::{HealthCheck, HealthTracker, ProviderHealth, ProviderMetrics},
        request::{
            SimulationLog, SimulationPayload, SimulationRequest, SimulationResult, StateChange,
            TransactionSkeleton,
        },
        revert::decode_revert_reason,
    },
    alloy_primitives::{Address, B256, Bytes, hex},
    async_trait::async_trait,
    serde::Deserialize,
    std::time::{Duration, Instant},
    url::Url,
};

pub const NAME: &str = "tenderly";

#[derive(Clone, Debug)]
pub struct TenderlyConfig {
    /// Fully qualified simulate endpoint, e.g.
    /// `https://api.tenderly.co/api/v1/account/<user>/project/<project>/simulate`.
    pub url: Url,
    pub access_key: String,
    pub enabled: bool,
    pub timeout: Duration,
}

pub struct TenderlyProvider {
    config: TenderlyConfig,
    client: reqwest::Client,
    tracker: HealthTracker,
}

impl TenderlyProvider {
    pub fn new(config: TenderlyConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            tracker: HealthTracker::new(),
        }
    }

    async fn dispatch(&self, request: &SimulationRequest, tx: &TransactionSkeleton) -> SimulationResult {
        let started = Instant::now();
        let latency = |started: Instant| started.elapsed().as_millis() as u64;

        let mut body = serde_json::json!({
            "network_id": request.chain_id.to_string(),
            "from": tx.from,
            "to": tx.to,
            "input": tx.data,
            "value": tx.value.unwrap_or_default().to_string(),
            "gas": tx.gas_limit.unwrap_or(8_000_000),
            "save": false,
            "save_if_fails": false,
            "simulation_type": "quick",
        });
        if let Some(block) = request.block {
            body["block_number"] = block.into();
        }
        if let Some(overrides) = &request.state_overrides {
            body["state_objects"] = state_objects(overrides);
        }

        let response = self
            .client
            .post(self.config.url.clone())
            .header("X-Access-Key", &self.config.access_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                let error = "tenderly rate limited";
                tracing::warn!(provider = NAME, "rate limited");
                self.tracker.record_failure(error);
                return SimulationResult::failure(NAME, error, latency(started));
            }
            Ok(response) if !response.status().is_success() => {
                let error = format!("tenderly http status {}", response.status());
                self.tracker.record_failure(&error);
                return SimulationResult::failure(NAME, error, latency(started));
            }
            Ok(response) => response,
            Err(err) => {
                let error = if err.is_timeout() {
                    "tenderly request timed out".to_owned()
                } else {
                    format!("tenderly request failed: {err}")
                };
                self.tracker.record_failure(&error);
                return SimulationResult::failure(NAME, error, latency(started));
            }
        };

        let response: Response = match response.json().await {
            Ok(response) => response,
            Err(err) => {
                let error = format!("tenderly response malformed: {err}");
                self.tracker.record_failure(&error);
                return SimulationResult::failure(NAME, error, latency(started));
            }
        };

        let latency_ms = latency(started);
        let would_revert = !response.simulation.status;
        let info = response
            .transaction
            .and_then(|transaction| transaction.transaction_info);
        let output = info
            .as_ref()
            .and_then(|info| info.call_trace.as_ref())
            .and_then(|trace| trace.output.as_ref())
            .and_then(|output| hex::decode(output).ok());
        let revert_reason = would_revert.then(|| {
            response
                .simulation
                .error_message
                .clone()
                .unwrap_or_else(|| decode_revert_reason(output.as_deref().unwrap_or_default()))
        });

        self.tracker.record_success(latency_ms, would_revert);
        SimulationResult {
            would_revert,
            revert_reason,
            gas_used: response.simulation.gas_used,
            return_value: output.map(Bytes::from),
            state_changes: request.include_state_changes.then(|| {
                info.as_ref()
                    .and_then(|info| info.state_diff.as_ref())
                    .map(|diffs| diffs.iter().flat_map(state_changes).collect())
                    .unwrap_or_default()
            }),
            logs: request.include_logs.then(|| {
                info.as_ref()
                    .and_then(|info| info.logs.as_ref())
                    .map(|logs| logs.iter().filter_map(simulation_log).collect())
                    .unwrap_or_default()
            }),
            block_number: response.simulation.block_number,
            ..SimulationResult::ok(NAME, latency_ms)
        }
    }
}

#[async_trait]
impl SimulationProvider for TenderlyProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn simulate(&self, request: &SimulationRequest) -> SimulationResult {
        self.tracker.record_attempt();
        if !self.config.enabled {
            return SimulationResult::failure(NAME, "provider disabled", 0);
        }
        let SimulationPayload::Evm(tx) = &request.payload else {
            return SimulationResult::failure(NAME, "unsupported chain family", 0);
        };
        self.dispatch(request, tx).await
    }

    fn health(&self) -> ProviderHealth {
        self.tracker.health()
    }

    fn metrics(&self) -> ProviderMetrics {
        self.tracker.metrics()
    }

    fn reset_metrics(&self) {
        self.tracker.reset_metrics();
    }

    fn note_fallback_use(&self) {
        self.tracker.record_fallback_use();
    }

    fn note_cache_hit(&self) {
        self.tracker.record_cache_hit();
    }

    async fn health_check(&self) -> HealthCheck {
        if !self.config.enabled {
            return HealthCheck {
                healthy: false,
                message: "provider disabled".to_owned(),
            };
        }
        let probe = SimulationRequest::evm(
            1,
            TransactionSkeleton {
                from: Address::ZERO,
                to: Address::ZERO,
                data: Bytes::new(),
                value: None,
                gas_limit: Some(21_000),
            },
        );
        let result = self.simulate(&probe).await;
        HealthCheck {
            healthy: result.success,
            message: result
                .error
                .unwrap_or_else(|| "simulation endpoint reachable".to_owned()),
        }
    }
}

fn state_objects(
    overrides: &std::collections::HashMap<Address, crate::request::StateOverride>,
) -> serde_json::Value {
    let objects = overrides
        .iter()
        .map(|(address, state)| {
            let mut object = serde_json::Map::new();
            if let Some(balance) = state.balance {
                object.insert("balance".to_owned(), balance.to_string().into());
            }
            if let Some(nonce) = state.nonce {
                object.insert("nonce".to_owned(), nonce.into());
            }
            if let Some(code) = &state.code {
                object.insert("code".to_owned(), code.to_string().into());
            }
            let storage: serde_json::Map<String, serde_json::Value> = state
                .state
                .iter()
                .chain(state.state_diff.iter())
                .flatten()
                .map(|(slot, value)| (slot.to_string(), value.to_string().into()))
                .collect();
            if !storage.is_empty() {
                object.insert("storage".to_owned(), storage.into());
            }
            (format!("{address:?}"), serde_json::Value::Object(object))
        })
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(objects)
}

fn state_changes(diff: &StateDiff) -> Vec<StateChange> {
    diff.raw
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|raw| StateChange {
            address: raw.address.or(diff.address).unwrap_or_default(),
            slot: raw.key,
            previous: raw.original.clone(),
            current: raw.dirty.clone(),
        })
        .collect()
}

fn simulation_log(log: &Log) -> Option<SimulationLog> {
    let raw = log.raw.as_ref()?;
    Some(SimulationLog {
        address: raw.address,
        topics: raw.topics.clone(),
        data: raw.data.clone(),
    })
}

#[derive(Debug, Deserialize)]
struct Response {
    simulation: Simulation,
    transaction: Option<Transaction>,
}

#[derive(Debug, Deserialize)]
struct Simulation {
    status: bool,
    gas_used: Option<u64>,
    error_message: Option<String>,
    block_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    transaction_info: Option<TransactionInfo>,
}

#[derive(Debug, Deserialize)]
struct TransactionInfo {
    call_trace: Option<CallTrace>,
    state_diff: Option<Vec<StateDiff>>,
    logs: Option<Vec<Log>>,
}

#[derive(Debug, Deserialize)]
struct CallTrace {
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StateDiff {
    address: Option<Address>,
    raw: Option<Vec<RawStateDiff>>,
}

#[derive(Debug, Deserialize)]
struct RawStateDiff {
    address: Option<Address>,
    key: Option<B256>,
    original: Option<String>,
    dirty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Log {
    raw: Option<RawLog>,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
}

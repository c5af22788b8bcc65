//! `eth_call`-based simulation. The same implementation backs two variants:
//! the remote provider posting to a third-party RPC and the local provider
//! reusing an endpoint the caller already runs. Only the latter qualifies
//! for the `light` simulation tier.

use {
    super::SimulationProvider,
    crate::{
        health::{HealthCheck, HealthTracker, ProviderHealth, ProviderMetrics},
        request::{SimulationPayload, SimulationRequest, SimulationResult, TransactionSkeleton},
        revert::decode_revert_reason,
    },
    alloy_primitives::hex,
    async_trait::async_trait,
    serde::Deserialize,
    std::time::{Duration, Instant},
    url::Url,
};

pub const REMOTE_NAME: &str = "remote-rpc";
pub const LOCAL_NAME: &str = "local-rpc";

/// JSON-RPC error code some gateways use for request throttling.
const RATE_LIMIT_CODE: i64 = -32005;

#[derive(Clone, Debug)]
pub struct RpcProviderConfig {
    pub url: Url,
    pub enabled: bool,
    pub timeout: Duration,
    /// The chain this endpoint serves, when known at configuration time.
    pub chain: Option<chain::Chain>,
}

pub struct RpcProvider {
    name: &'static str,
    local: bool,
    config: RpcProviderConfig,
    client: reqwest::Client,
    tracker: HealthTracker,
}

impl RpcProvider {
    /// A provider posting to a remote third-party RPC.
    pub fn remote(config: RpcProviderConfig, client: reqwest::Client) -> Self {
        Self::new(REMOTE_NAME, false, config, client)
    }

    /// A provider reusing an RPC endpoint the caller already holds. Cheap
    /// enough for the `light` tier.
    pub fn local(config: RpcProviderConfig, client: reqwest::Client) -> Self {
        Self::new(LOCAL_NAME, true, config, client)
    }

    fn new(
        name: &'static str,
        local: bool,
        config: RpcProviderConfig,
        client: reqwest::Client,
    ) -> Self {
        if let Some(chain) = config.chain {
            chain.warn_if_deprecated();
        }
        Self {
            name,
            local,
            config,
            client,
            tracker: HealthTracker::new(),
        }
    }

    async fn dispatch(
        &self,
        request: &SimulationRequest,
        tx: &TransactionSkeleton,
    ) -> SimulationResult {
        let started = Instant::now();
        let latency = |started: Instant| started.elapsed().as_millis() as u64;

        let mut call = serde_json::json!({
            "from": tx.from,
            "to": tx.to,
            "data": tx.data,
        });
        if let Some(value) = tx.value {
            call["value"] = format!("{value:#x}").into();
        }
        if let Some(gas) = tx.gas_limit {
            call["gas"] = format!("{gas:#x}").into();
        }
        let block = match request.block {
            Some(block) => format!("{block:#x}"),
            None => "latest".to_owned(),
        };
        let mut params = vec![call, block.into()];
        if let Some(overrides) = &request.state_overrides {
            match serde_json::to_value(overrides) {
                Ok(overrides) => params.push(overrides),
                Err(err) => {
                    let error = format!("state overrides not serializable: {err}");
                    self.tracker.record_failure(&error);
                    return SimulationResult::failure(self.name, error, latency(started));
                }
            }
        }
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": params,
        });

        let response = self
            .client
            .post(self.config.url.clone())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                let error = "rpc rate limited";
                tracing::warn!(provider = self.name, "rate limited");
                self.tracker.record_failure(error);
                return SimulationResult::failure(self.name, error, latency(started));
            }
            Ok(response) => response,
            Err(err) => {
                let error = if err.is_timeout() {
                    "rpc request timed out".to_owned()
                } else {
                    format!("rpc request failed: {err}")
                };
                self.tracker.record_failure(&error);
                return SimulationResult::failure(self.name, error, latency(started));
            }
        };

        let response: RpcResponse = match response.json().await {
            Ok(response) => response,
            Err(err) => {
                let error = format!("rpc response malformed: {err}");
                self.tracker.record_failure(&error);
                return SimulationResult::failure(self.name, error, latency(started));
            }
        };

        let latency_ms = latency(started);
        match (response.result, response.error) {
            (Some(output), _) => {
                let return_value = hex::decode(&output).ok().map(Into::into);
                self.tracker.record_success(latency_ms, false);
                SimulationResult {
                    return_value,
                    ..SimulationResult::ok(self.name, latency_ms)
                }
            }
            (None, Some(error)) if error.code == RATE_LIMIT_CODE => {
                let message = format!("rpc rate limited: {}", error.message);
                tracing::warn!(provider = self.name, "rate limited");
                self.tracker.record_failure(&message);
                SimulationResult::failure(self.name, message, latency_ms)
            }
            (None, Some(error)) => {
                // A revert is a successful simulation whose answer is "this
                // transaction fails on chain".
                let revert_data = error
                    .data
                    .as_deref()
                    .and_then(|data| hex::decode(data).ok());
                let is_revert =
                    revert_data.is_some() || error.message.contains("execution reverted");
                if is_revert {
                    let reason = match &revert_data {
                        Some(data) if !data.is_empty() => decode_revert_reason(data),
                        _ => error.message.clone(),
                    };
                    self.tracker.record_success(latency_ms, true);
                    SimulationResult {
                        would_revert: true,
                        revert_reason: Some(reason),
                        ..SimulationResult::ok(self.name, latency_ms)
                    }
                } else {
                    let message = format!("rpc error {}: {}", error.code, error.message);
                    self.tracker.record_failure(&message);
                    SimulationResult::failure(self.name, message, latency_ms)
                }
            }
            (None, None) => {
                let error = "rpc response carries neither result nor error";
                self.tracker.record_failure(error);
                SimulationResult::failure(self.name, error, latency_ms)
            }
        }
    }
}

#[async_trait]
impl SimulationProvider for RpcProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn is_local(&self) -> bool {
        self.local
    }

    async fn simulate(&self, request: &SimulationRequest) -> SimulationResult {
        self.tracker.record_attempt();
        if !self.config.enabled {
            return SimulationResult::failure(self.name, "provider disabled", 0);
        }
        let SimulationPayload::Evm(tx) = &request.payload else {
            return SimulationResult::failure(self.name, "unsupported chain family", 0);
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
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_blockNumber",
            "params": [],
        });
        let response = self
            .client
            .post(self.config.url.clone())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => HealthCheck {
                healthy: true,
                message: "rpc endpoint reachable".to_owned(),
            },
            Ok(response) => HealthCheck {
                healthy: false,
                message: format!("rpc endpoint returned {}", response.status()),
            },
            Err(err) => HealthCheck {
                healthy: false,
                message: format!("rpc endpoint unreachable: {err}"),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<String>,
}

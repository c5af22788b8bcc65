//! `simulateTransaction` against a Solana RPC, with automatic fallback to a
//! secondary endpoint when the primary is unreachable.

use {
    super::SimulationProvider,
    crate::{
        health::{HealthCheck, HealthTracker, ProviderHealth, ProviderMetrics},
        request::{SimulationPayload, SimulationRequest, SimulationResult, SolanaDetails},
    },
    async_trait::async_trait,
    serde::Deserialize,
    std::time::{Duration, Instant},
    url::Url,
};

pub const NAME: &str = "solana";

#[derive(Clone, Debug)]
pub struct SolanaProviderConfig {
    pub url: Url,
    /// Secondary RPC tried when the primary does not answer.
    pub fallback_url: Option<Url>,
    pub enabled: bool,
    pub timeout: Duration,
}

pub struct SolanaProvider {
    config: SolanaProviderConfig,
    client: reqwest::Client,
    tracker: HealthTracker,
}

impl SolanaProvider {
    pub fn new(config: SolanaProviderConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            tracker: HealthTracker::new(),
        }
    }

    async fn post(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> Result<RpcResponse, String> {
        let response = self
            .client
            .post(url.clone())
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    "solana rpc request timed out".to_owned()
                } else {
                    format!("solana rpc request failed: {err}")
                }
            })?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err("solana rpc rate limited".to_owned());
        }
        response
            .json()
            .await
            .map_err(|err| format!("solana rpc response malformed: {err}"))
    }

    async fn dispatch(
        &self,
        request: &SimulationRequest,
        transaction: &str,
        commitment: &str,
    ) -> SimulationResult {
        let started = Instant::now();
        let mut options = serde_json::json!({
            "commitment": commitment,
            "encoding": "base64",
            "replaceRecentBlockhash": true,
            "sigVerify": false,
        });
        if let Some(slot) = request.block {
            options["minContextSlot"] = slot.into();
        }
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "simulateTransaction",
            "params": [transaction, options],
        });

        let mut response = self.post(&self.config.url, &body).await;
        if let Err(primary_error) = &response
            && let Some(fallback) = &self.config.fallback_url
        {
            tracing::warn!(error = %primary_error, "primary solana rpc failed, using fallback");
            response = self.post(fallback, &body).await;
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        let response = match response {
            Ok(response) => response,
            Err(error) => {
                self.tracker.record_failure(&error);
                return SimulationResult::failure(NAME, error, latency_ms);
            }
        };

        if let Some(error) = response.error {
            let message = format!("solana rpc error {}: {}", error.code, error.message);
            self.tracker.record_failure(&message);
            return SimulationResult::failure(NAME, message, latency_ms);
        }
        let Some(result) = response.result else {
            let error = "solana rpc response carries neither result nor error";
            self.tracker.record_failure(error);
            return SimulationResult::failure(NAME, error, latency_ms);
        };

        let would_revert = !result.value.err.is_null();
        let revert_reason = would_revert.then(|| result.value.err.to_string());
        self.tracker.record_success(latency_ms, would_revert);
        SimulationResult {
            would_revert,
            revert_reason,
            gas_used: result.value.units_consumed,
            block_number: result.context.as_ref().map(|context| context.slot),
            solana: Some(SolanaDetails {
                logs: result.value.logs.unwrap_or_default(),
                compute_units_consumed: result.value.units_consumed,
                accounts: result.value.accounts,
                inner_instructions: result.value.inner_instructions,
            }),
            ..SimulationResult::ok(NAME, latency_ms)
        }
    }
}

#[async_trait]
impl SimulationProvider for SolanaProvider {
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
        let SimulationPayload::Solana {
            transaction,
            commitment,
        } = &request.payload
        else {
            return SimulationResult::failure(NAME, "unsupported chain family", 0);
        };
        self.dispatch(request, transaction, commitment).await
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
            "method": "getHealth",
            "params": [],
        });
        match self.post(&self.config.url, &body).await {
            Ok(_) => HealthCheck {
                healthy: true,
                message: "solana rpc reachable".to_owned(),
            },
            Err(error) => HealthCheck {
                healthy: false,
                message: error,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<SimulateResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SimulateResult {
    context: Option<Context>,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct Context {
    slot: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Value {
    #[serde(default)]
    err: serde_json::Value,
    logs: Option<Vec<String>>,
    units_consumed: Option<u64>,
    accounts: Option<serde_json::Value>,
    inner_instructions: Option<serde_json::Value>,
}

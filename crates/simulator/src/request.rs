use {
    alloy_primitives::{Address, B256, Bytes, U256},
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// The EVM transaction skeleton a simulation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSkeleton {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
}

/// Account state overridden for the duration of a simulation, mirroring the
/// `eth_call` third-parameter shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<HashMap<B256, B256>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_diff: Option<HashMap<B256, B256>>,
}

/// What gets simulated, per chain family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulationPayload {
    Evm(TransactionSkeleton),
    Solana {
        /// Base64-encoded signed transaction.
        transaction: String,
        /// Commitment level the RPC simulates against, e.g. `"confirmed"`.
        commitment: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationRequest {
    pub chain_id: u64,
    pub payload: SimulationPayload,
    pub state_overrides: Option<HashMap<Address, StateOverride>>,
    /// Pin the simulation to a block; `None` means latest.
    pub block: Option<u64>,
    pub include_state_changes: bool,
    pub include_logs: bool,
}

impl SimulationRequest {
    /// A plain EVM call with no overrides against the latest block.
    pub fn evm(chain_id: u64, tx: TransactionSkeleton) -> Self {
        Self {
            chain_id,
            payload: SimulationPayload::Evm(tx),
            state_overrides: None,
            block: None,
            include_state_changes: false,
            include_logs: false,
        }
    }

    /// Deduplication key: requests with equal keys would observe the same
    /// chain state, so a cached result can stand in for a fresh dispatch.
    pub fn cache_key(&self) -> String {
        let block = self
            .block
            .map(|block| block.to_string())
            .unwrap_or_else(|| "latest".to_owned());
        match &self.payload {
            SimulationPayload::Evm(tx) => {
                let value = tx
                    .value
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "0".to_owned());
                // `{:x}` renders addresses lowercased which makes the key
                // case-insensitive in the sender and destination.
                format!(
                    "{}:{:x}:{:x}:{:x}:{}:{}",
                    self.chain_id, tx.from, tx.to, tx.data, value, block
                )
            }
            SimulationPayload::Solana { transaction, .. } => {
                format!("{}:solana:{}:{}", self.chain_id, transaction, block)
            }
        }
    }
}

/// One storage slot mutated by the simulated transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub address: Address,
    pub slot: Option<B256>,
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// One log emitted by the simulated transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Solana-specific simulation output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolanaDetails {
    pub logs: Vec<String>,
    pub compute_units_consumed: Option<u64>,
    /// Post-simulation account states, verbatim from the RPC.
    pub accounts: Option<serde_json::Value>,
    pub inner_instructions: Option<serde_json::Value>,
}

/// Outcome of one simulation dispatch.
///
/// `success` states whether the provider produced an answer at all;
/// `would_revert` whether that answer predicts an on-chain failure. The two
/// are independent: a provider successfully predicting a revert is still a
/// successful simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
    pub success: bool,
    pub would_revert: bool,
    pub revert_reason: Option<String>,
    pub gas_used: Option<u64>,
    pub return_value: Option<Bytes>,
    pub state_changes: Option<Vec<StateChange>>,
    pub logs: Option<Vec<SimulationLog>>,
    /// Only set when `success` is false.
    pub error: Option<String>,
    pub provider: &'static str,
    pub latency_ms: u64,
    pub block_number: Option<u64>,
    pub solana: Option<SolanaDetails>,
}

impl SimulationResult {
    /// A bare successful result; callers fill in the optional details.
    pub fn ok(provider: &'static str, latency_ms: u64) -> Self {
        Self {
            success: true,
            would_revert: false,
            revert_reason: None,
            gas_used: None,
            return_value: None,
            state_changes: None,
            logs: None,
            error: None,
            provider,
            latency_ms,
            block_number: None,
            solana: None,
        }
    }

    pub fn failure(provider: &'static str, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::ok(provider, latency_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, alloy_primitives::address};

    #[test]
    fn cache_key_defaults_value_and_block() {
        let request = SimulationRequest::evm(
            1,
            TransactionSkeleton {
                from: address!("00000000000000000000000000000000000000aa"),
                to: address!("00000000000000000000000000000000000000bb"),
                data: Bytes::from_static(&[0xde, 0xad]),
                value: None,
                gas_limit: None,
            },
        );
        let key = request.cache_key();
        assert!(key.ends_with(":0:latest"), "{key}");
        assert!(key.starts_with("1:"), "{key}");
    }

    #[test]
    fn cache_key_is_case_insensitive_in_addresses() {
        let make = |from| {
            SimulationRequest::evm(
                1,
                TransactionSkeleton {
                    from,
                    to: address!("00000000000000000000000000000000000000bb"),
                    data: Bytes::new(),
                    value: Some(U256::from(7u64)),
                    gas_limit: None,
                },
            )
        };
        // Addresses are bytes; keys only depend on their canonical rendering.
        let a = make(address!("00000000000000000000000000000000000000AA"));
        let b = make(address!("00000000000000000000000000000000000000aa"));
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn failure_result_has_error() {
        let result = SimulationResult::failure("tenderly", "timeout", 125);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert_eq!(result.provider, "tenderly");
        assert_eq!(result.latency_ms, 125);
    }
}

//! Simulation providers. Every variant implements the same contract and
//! owns its rolling health; the service only ever talks to the trait.

mod rpc;
mod solana;
mod tenderly;

pub use {
    rpc::{RpcProvider, RpcProviderConfig},
    solana::{SolanaProvider, SolanaProviderConfig},
    tenderly::{TenderlyConfig, TenderlyProvider},
};

use {
    crate::{
        health::{HealthCheck, ProviderHealth, ProviderMetrics},
        request::{SimulationRequest, SimulationResult},
    },
    async_trait::async_trait,
};

/// Contract every simulation provider implements.
///
/// `simulate` never fails at the type level: transport errors, timeouts and
/// disabled providers all come back as a result with `success = false` so
/// the service can decide about fallback uniformly.
#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait SimulationProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    /// Whether this provider runs against an endpoint local to the caller.
    /// The `light` simulation tier restricts itself to such providers.
    fn is_local(&self) -> bool {
        false
    }

    async fn simulate(&self, request: &SimulationRequest) -> SimulationResult;

    fn health(&self) -> ProviderHealth;

    fn metrics(&self) -> ProviderMetrics;

    fn reset_metrics(&self);

    /// Counts a use of this provider as a fallback target.
    fn note_fallback_use(&self);

    /// Counts a cache hit served from a result this provider produced.
    fn note_cache_hit(&self);

    async fn health_check(&self) -> HealthCheck;
}

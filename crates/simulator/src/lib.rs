//! Pre-flight transaction simulation with health-scored provider ordering,
//! automatic fallback, a deduplicating result cache and a tiered policy
//! deciding how much simulation a candidate trade deserves.
//!
//! A predicted on-chain revert is a *successful* simulation: `success` says
//! whether a provider produced an answer, `would_revert` what that answer
//! was. Callers gate submission on both.

mod cache;
mod collector;
mod config;
mod error;
mod health;
pub mod provider;
mod request;
mod revert;
mod service;

pub use {
    collector::MetricsCollector,
    config::SimulationConfig,
    error::SimulationError,
    health::{HealthCheck, HealthTracker, ProviderHealth, ProviderMetrics},
    request::{
        SimulationLog, SimulationPayload, SimulationRequest, SimulationResult, SolanaDetails,
        StateChange, StateOverride, TransactionSkeleton,
    },
    revert::decode_revert_reason,
    service::{AggregatedMetrics, ServiceStatus, SimulationService, SimulationTier},
};

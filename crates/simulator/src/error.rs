use thiserror::Error;

/// Service-level simulation failures.
///
/// Provider failures never surface here; they are embedded in the
/// [`crate::SimulationResult`] (`success = false`, `error`, `provider`) so
/// the caller can fall through to a conservative policy.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("service stopped")]
    ServiceStopped,
    #[error("no simulation providers available")]
    NoProvidersAvailable,
}

use {alloy_primitives::Address, thiserror::Error};

/// Why a transaction could not be decoded into a swap intent.
///
/// These never escape the registry; they exist so decoders can bail with `?`
/// and the registry can log a precise reason before returning `None`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("calldata shorter than a function selector")]
    ShortCalldata,
    #[error("unknown function selector")]
    UnknownSelector,
    #[error("malformed abi data: {0}")]
    MalformedAbi(#[from] alloy_sol_types::Error),
    #[error("swap path has fewer than 2 tokens")]
    ShortPath,
    #[error("packed path length {0} is not 20 + 23k")]
    InvalidPackedPath(usize),
    #[error("pool {0} not known to the registry")]
    UnknownPool(Address),
    #[error("pool coin index out of range")]
    InvalidPoolIndex,
    #[error("router {0} not registered for this chain")]
    UnknownRouter(Address),
    #[error("transaction has no destination")]
    NoDestination,
}

//! Decoding of DEX router calldata into normalized [`domain_types::SwapIntent`]s.
//!
//! The registry dispatches on the 4-byte function selector in O(1), checks
//! the destination against a chain-keyed router table and hands the raw
//! transaction to the protocol decoder owning that selector. Decoders never
//! panic; every failure is reported as `None` with a debug log so a single
//! malformed transaction can never stall the pipeline.

mod curve;
mod error;
mod oneinch;
mod registry;
mod time;
mod uniswap_v2;
mod uniswap_v3;

pub use {
    error::DecodeError,
    registry::{CurvePoolRegistry, DecoderRegistry},
};

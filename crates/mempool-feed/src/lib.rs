//! Client for a provider-push feed of pending transactions.
//!
//! One persistent websocket subscription, parsed into
//! [`domain_types::PendingTransaction`]s and fanned out through an event bus.
//! Connection loss triggers exponential-backoff reconnection; an explicit
//! [`FeedClient::disconnect`] cancels any pending reconnect timer.

mod client;
mod config;
mod error;
mod events;
mod frames;
mod health;

pub use {
    client::FeedClient,
    config::{FeedConfig, ReconnectConfig},
    error::FeedError,
    events::{FeedEvent, HandlerId},
    health::{ConnectionState, FeedHealth},
};

use {
    rolling_stats::RollingAverage,
    std::time::{Duration, Instant},
};

/// Connection lifecycle of the feed client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Snapshot returned by [`crate::FeedClient::health`].
#[derive(Clone, Debug)]
pub struct FeedHealth {
    pub state: ConnectionState,
    /// Age of the most recent inbound message.
    pub last_message_age: Option<Duration>,
    pub messages_received: u64,
    pub transactions_emitted: u64,
    pub parse_errors: u64,
    /// Successful reconnections over the client lifetime.
    pub reconnect_count: u64,
    /// Rolling average gap between inbound messages in milliseconds.
    pub average_message_gap_ms: f64,
    /// Time since the current connection was established.
    pub uptime: Option<Duration>,
    /// Subscription id acknowledged by the provider, if any.
    pub subscription_id: Option<String>,
}

/// Mutable counters the client updates as frames arrive.
pub(crate) struct Stats {
    pub messages_received: u64,
    pub transactions_emitted: u64,
    pub parse_errors: u64,
    pub reconnect_count: u64,
    pub last_message_at: Option<Instant>,
    pub connected_at: Option<Instant>,
    pub message_gap: RollingAverage,
    pub subscription_id: Option<String>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            messages_received: 0,
            transactions_emitted: 0,
            parse_errors: 0,
            reconnect_count: 0,
            last_message_at: None,
            connected_at: None,
            message_gap: RollingAverage::new(100),
            subscription_id: None,
        }
    }
}

impl Stats {
    pub(crate) fn on_message(&mut self, now: Instant) {
        self.messages_received += 1;
        if let Some(last) = self.last_message_at {
            self.message_gap
                .update(now.duration_since(last).as_secs_f64() * 1000.0);
        }
        self.last_message_at = Some(now);
    }
}

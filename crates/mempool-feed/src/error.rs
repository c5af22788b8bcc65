use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum FeedError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("feed authentication rejected: {0}")]
    AuthRejected(String),
    #[error("frame parse error: {0}")]
    Parse(String),
    #[error("rate limited by the feed provider: {0}")]
    RateLimited(String),
    #[error("gave up reconnecting after {0} attempts")]
    MaxReconnects(u32),
    #[error("not connected")]
    NotConnected,
}

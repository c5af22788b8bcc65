use {
    std::sync::Once,
    tracing_subscriber::{EnvFilter, fmt},
};

/// Initializes the global tracing subscriber exactly once.
///
/// `env_filter` uses the usual `RUST_LOG` directive syntax, e.g.
/// `"info,simulator=debug"`. Later calls are no-ops which makes this safe to
/// call from every test.
pub fn initialize(env_filter: &str) {
    static INIT: Once = Once::new();
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    INIT.call_once(|| {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .init();
    });
}

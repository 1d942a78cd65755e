//! Structured logging configuration.
//!
//! The library logs through the `log` facade; the subscriber installed
//! here forwards those records alongside native `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info`.
///
/// # Example
///
/// ```no_run
/// use codex_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a login, reconnection or disconnection seen by a transport
///
/// # Example
///
/// ```
/// use codex_server::logging::log_session_event;
///
/// log_session_event("login", "alice", "stream");
/// ```
pub fn log_session_event(kind: &str, identity: &str, transport: &str) {
    tracing::info!(
        event_type = kind,
        identity = identity,
        transport = transport,
        "SESSION: {kind} {identity} over {transport}"
    );
}

/// Log a change in the state of the match
pub fn log_match_event(kind: &str, detail: &str) {
    tracing::info!(event_type = kind, detail = detail, "MATCH: {detail}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_session_event() {
        // Just ensure it doesn't panic without a subscriber
        log_session_event("login", "alice", "remote");
        log_session_event("disconnect", "-", "stream");
    }

    #[test]
    fn test_log_match_event() {
        log_match_event("phase", "lobby -> play");
    }
}

//! Process wiring for the Codex match server.
//!
//! The `codex` library owns the match; this crate loads configuration,
//! installs logging and metrics, and serves the remote-object transport
//! next to the library's stream transport.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;

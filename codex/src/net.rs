//! Networking layer for client-server communication.
//!
//! Both transports hand the rest of the server the same [`Connection`]
//! capability. The stream transport lives here; the remote-object
//! transport lives in the server binary next to its HTTP router.
//!
//! [`Connection`]: connection::Connection

/// Blocking TCP client, mostly for tests and tooling.
pub mod client;

/// Connection capability, transport sink and shared liveness bookkeeping.
pub mod connection;

/// Transport error types.
pub mod errors;

/// Periodic liveness probes and transport timing.
pub mod heartbeat;

/// Message types for the client-server protocol.
pub mod messages;

/// Stream transport over TCP.
pub mod server;

/// Utilities for binary message serialization and framing.
pub mod utils;

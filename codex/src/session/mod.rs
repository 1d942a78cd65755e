//! Player sessions of the current match.

pub mod registry;

pub use registry::{Departure, JoinError, JoinOutcome, PlayerSession, SessionRegistry};

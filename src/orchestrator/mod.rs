//! Session orchestration.
//!
//! Covers the connection lifecycle ([`engine`]) and the in-memory session
//! state shared with the tool dispatcher ([`state`]).

pub mod engine;
pub mod state;

pub use engine::{EngineConfig, SessionEngine};
pub use state::SessionState;

//! Domain models.

pub mod session;

pub use session::{HistoryEntry, HistoryKind, Session};

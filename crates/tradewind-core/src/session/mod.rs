//! Session state for the desk.
//!
//! Provides the process-wide observable store for chat history, the
//! orchestrator state mirror, and diagnostics, plus the chat turn service
//! that drives one streaming turn against the store.

pub mod chat;
pub mod state;
pub mod store;

pub use chat::ChatTurnService;
pub use state::{DiagnosticKind, DiagnosticLog, SessionState};
pub use store::SessionStore;

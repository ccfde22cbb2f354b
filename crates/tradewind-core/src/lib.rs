//! Tradewind Core - session state and configuration for the desk.
//!
//! This crate provides the process-wide state the desk presentation layer
//! renders, including:
//! - The observable session store (chat history, orchestrator mirror,
//!   diagnostics) with the centrally enforced stale-write guard
//! - The chat turn service driving one streaming turn into the store
//! - Configuration loading

pub mod config;
pub mod session;

pub use config::{ChatEndpointConfig, ConfigError, OrchestratorEndpointConfig, TradewindConfig};
pub use session::{ChatTurnService, DiagnosticKind, DiagnosticLog, SessionState, SessionStore};

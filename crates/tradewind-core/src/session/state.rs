//! Session state definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradewind_abstraction::{ChatMessage, OrchestratorState};

/// Kind of diagnostic event recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// An orchestrator state update was discarded by the stale-write guard.
    StaleStateRejected,
    /// A network-level or HTTP-status failure.
    TransportFailure,
    /// A response body that could not be decoded.
    DecodeFailure,
    /// An unexpected frame shape mid-stream.
    ProtocolViolation,
    /// A command rejected locally before dispatch.
    CommandRejected,
}

/// One diagnostic entry.
///
/// Guard events and client failures land here so the presentation layer
/// can surface them without the store ever raising an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticLog {
    /// What happened.
    pub kind: DiagnosticKind,
    /// Human-readable detail.
    pub detail: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticLog {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(kind: DiagnosticKind, detail: String) -> Self {
        Self { kind, detail, timestamp: Utc::now() }
    }
}

/// The process-wide session state.
///
/// Created empty at process start and discarded on exit; the orchestrator
/// mirror stays `None` until the first confirmed fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Conversation history, insertion order significant, append-only.
    pub messages: Vec<ChatMessage>,
    /// Confirmed mirror of the remote orchestrator state.
    pub orchestrator: Option<OrchestratorState>,
    /// Diagnostic entries, oldest first.
    pub diagnostics: Vec<DiagnosticLog>,
}

//! Process-wide observable session store.

use crate::session::state::{DiagnosticKind, DiagnosticLog, SessionState};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::debug;
use tradewind_abstraction::{ChatMessage, OrchestratorState};

/// Single-owner cache of {chat messages, orchestrator state, diagnostics}.
///
/// All mutation goes through the named operations below; each is
/// synchronous and total. The store never raises: stale or otherwise
/// unusable updates are ignored and recorded as diagnostics. Consumers
/// observe changes through [`SessionStore::subscribe`] and re-read
/// [`SessionStore::snapshot`].
#[derive(Debug)]
pub struct SessionStore {
    /// The owned state.
    inner: RwLock<SessionState>,
    /// Revision counter, bumped on every applied mutation.
    revision: watch::Sender<u64>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self { inner: RwLock::new(SessionState::default()), revision }
    }

    /// Returns a cloned read-only view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    /// Subscribes to mutation notifications.
    ///
    /// The receiver sees a bumped revision after every applied mutation;
    /// await `changed()` and re-read `snapshot()`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Appends one message to the conversation history.
    pub fn append_message(&self, message: ChatMessage) {
        debug!(message_id = %message.id, role = %message.role, "Appending chat message");
        self.write().messages.push(message);
        self.bump();
    }

    /// Replaces the whole conversation history.
    pub fn replace_messages(&self, messages: Vec<ChatMessage>) {
        debug!(message_count = messages.len(), "Replacing chat messages");
        self.write().messages = messages;
        self.bump();
    }

    /// Replaces the diagnostics list.
    pub fn set_diagnostics(&self, diagnostics: Vec<DiagnosticLog>) {
        self.write().diagnostics = diagnostics;
        self.bump();
    }

    /// Appends one diagnostic entry.
    pub fn record_diagnostic(&self, kind: DiagnosticKind, detail: String) {
        debug!(kind = ?kind, detail = %detail, "Recording diagnostic");
        self.write().diagnostics.push(DiagnosticLog::new(kind, detail));
        self.bump();
    }

    /// Applies an orchestrator state update under the stale-write guard.
    ///
    /// An update whose `last_updated` is strictly older than the held one
    /// is discarded: the held state stays untouched, a
    /// `StaleStateRejected` diagnostic is recorded, and the held state is
    /// returned. Fresh updates are applied and returned. This guard lives
    /// here so no caller can bypass it.
    pub fn apply_orchestrator_state(&self, incoming: OrchestratorState) -> OrchestratorState {
        let mut state = self.write();
        if let Some(held) = state.orchestrator.as_ref() {
            if !incoming.supersedes(held) {
                let held = held.clone();
                debug!(
                    held_stamp = %held.last_updated,
                    incoming_stamp = %incoming.last_updated,
                    "Rejecting stale orchestrator state"
                );
                state.diagnostics.push(DiagnosticLog::new(
                    DiagnosticKind::StaleStateRejected,
                    format!(
                        "incoming state stamped {} is older than held {}",
                        incoming.last_updated, held.last_updated
                    ),
                ));
                drop(state);
                self.bump();
                return held;
            }
        }

        state.orchestrator = Some(incoming.clone());
        drop(state);
        self.bump();
        incoming
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn state_at(ts: i64) -> OrchestratorState {
        OrchestratorState {
            is_live: true,
            is_winding_down: false,
            wind_down_started_at: None,
            emergency_halt_active: false,
            emergency_halt_reason: None,
            risk_throttle: 1.0,
            last_updated: Utc.timestamp_opt(ts, 0).unwrap(),
        }
    }

    fn halted_at(ts: i64, reason: &str) -> OrchestratorState {
        OrchestratorState {
            is_live: false,
            is_winding_down: false,
            wind_down_started_at: None,
            emergency_halt_active: true,
            emergency_halt_reason: Some(reason.to_string()),
            risk_throttle: 0.0,
            last_updated: Utc.timestamp_opt(ts, 0).unwrap(),
        }
    }

    #[test]
    fn test_append_message_preserves_order() {
        let store = SessionStore::new();
        store.append_message(ChatMessage::user("first".to_string()));
        store.append_message(ChatMessage::assistant("second".to_string()));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].content, "first");
        assert_eq!(snapshot.messages[1].content, "second");
    }

    #[test]
    fn test_replace_messages() {
        let store = SessionStore::new();
        store.append_message(ChatMessage::user("old".to_string()));
        store.replace_messages(vec![ChatMessage::user("new".to_string())]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].content, "new");
    }

    #[test]
    fn test_apply_fresh_state() {
        let store = SessionStore::new();
        let applied = store.apply_orchestrator_state(state_at(100));
        assert_eq!(applied.last_updated, Utc.timestamp_opt(100, 0).unwrap());
        assert_eq!(store.snapshot().orchestrator, Some(state_at(100)));
    }

    #[test]
    fn test_stale_state_is_rejected_and_recorded() {
        let store = SessionStore::new();
        store.apply_orchestrator_state(state_at(100));

        let returned = store.apply_orchestrator_state(state_at(99));
        assert_eq!(returned, state_at(100));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.orchestrator, Some(state_at(100)));
        assert_eq!(snapshot.diagnostics.len(), 1);
        assert_eq!(snapshot.diagnostics[0].kind, DiagnosticKind::StaleStateRejected);
    }

    #[test]
    fn test_equal_stamp_is_applied() {
        let store = SessionStore::new();
        store.apply_orchestrator_state(state_at(100));
        let mut same_stamp = state_at(100);
        same_stamp.risk_throttle = 0.5;

        let returned = store.apply_orchestrator_state(same_stamp.clone());
        assert_eq!(returned, same_stamp);
        assert!(store.snapshot().diagnostics.is_empty());
    }

    #[test]
    fn test_out_of_order_halt_then_engage_resolves_to_halt() {
        let store = SessionStore::new();

        // Halt was issued after engage, but its response arrives first.
        let halt = halted_at(200, "breaker");
        let engage = state_at(150);

        store.apply_orchestrator_state(halt.clone());
        let returned = store.apply_orchestrator_state(engage);

        assert_eq!(returned, halt);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.orchestrator, Some(halt));
        assert_eq!(snapshot.diagnostics.len(), 1);
        assert_eq!(snapshot.diagnostics[0].kind, DiagnosticKind::StaleStateRejected);
    }

    #[test]
    fn test_set_and_record_diagnostics() {
        let store = SessionStore::new();
        store.set_diagnostics(vec![DiagnosticLog::new(
            DiagnosticKind::TransportFailure,
            "connection reset".to_string(),
        )]);
        store.record_diagnostic(DiagnosticKind::DecodeFailure, "bad body".to_string());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.diagnostics.len(), 2);
        assert_eq!(snapshot.diagnostics[0].kind, DiagnosticKind::TransportFailure);
        assert_eq!(snapshot.diagnostics[1].kind, DiagnosticKind::DecodeFailure);
    }

    #[tokio::test]
    async fn test_subscribers_observe_mutations() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();
        let initial = *rx.borrow_and_update();

        store.append_message(ChatMessage::user("hello".to_string()));

        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update() > initial);
    }
}

//! The user-send path: one chat turn from user intent to stored messages.

use crate::session::state::DiagnosticKind;
use crate::session::store::SessionStore;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};
use tradewind_abstraction::{ChatMessage, ChatParameters, ClientError, StreamingChat};

/// Drives one streaming chat turn against the session store.
///
/// The user message is appended before the request is dispatched; the
/// assistant message is appended once the stream reaches a terminal
/// condition, carrying whatever text was yielded up to that point. A
/// failed stream therefore ends the in-progress message rather than
/// stalling it.
pub struct ChatTurnService {
    /// The streaming client behind the trait seam.
    chat: Arc<dyn StreamingChat>,
    /// The process-wide store.
    store: Arc<SessionStore>,
}

impl ChatTurnService {
    /// Creates a turn service over a chat client and a store.
    #[must_use]
    pub fn new(chat: Arc<dyn StreamingChat>, store: Arc<SessionStore>) -> Self {
        Self { chat, store }
    }

    /// Sends one user message and drains the model's streamed reply.
    ///
    /// # Errors
    /// Returns the stream's terminal `ClientError` if the request failed
    /// to open or failed mid-stream. In the mid-stream case the partial
    /// assistant message has already been appended to the store.
    pub async fn send(
        &self,
        content: String,
        parameters: Option<ChatParameters>,
    ) -> Result<(), ClientError> {
        self.store.append_message(ChatMessage::user(content));
        let history = self.store.snapshot().messages;

        let mut stream = match self.chat.open(&history, parameters).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "Chat stream failed to open");
                self.store.record_diagnostic(diagnostic_kind(&err), err.to_string());
                return Err(err);
            }
        };

        let mut text = String::new();
        let mut failure = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) => text.push_str(&delta),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        drop(stream);

        debug!(chars = text.len(), failed = failure.is_some(), "Chat stream finished");
        self.store.append_message(ChatMessage::assistant(text));

        match failure {
            Some(err) => {
                self.store.record_diagnostic(diagnostic_kind(&err), err.to_string());
                Err(err)
            }
            None => Ok(()),
        }
    }
}

fn diagnostic_kind(err: &ClientError) -> DiagnosticKind {
    match err {
        ClientError::Transport(_) => DiagnosticKind::TransportFailure,
        ClientError::Decode(_) => DiagnosticKind::DecodeFailure,
        ClientError::Protocol(_) => DiagnosticKind::ProtocolViolation,
        ClientError::InvalidCommand(_) => DiagnosticKind::CommandRejected,
    }
}

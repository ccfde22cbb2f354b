//! Shared types for the Tradewind desk core.
//!
//! This crate defines the data model and error taxonomy shared by the chat
//! streaming client, the orchestrator control client, and the session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Classified failure of a client operation.
///
/// Both clients classify every failure into one of these kinds before it
/// crosses their public boundary. Stale-state rejections are deliberately
/// absent: they are guard events recorded as diagnostics, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network failure, request timeout, or non-success HTTP status.
    /// Retryable by caller policy.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be decoded into the expected
    /// shape. Not retryable without a server-side fix.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unexpected frame shape mid-stream. Terminates the stream.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Input rejected locally before any request was issued (invalid
    /// command arguments, missing credentials).
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

/// A message in the desk conversation.
///
/// Messages are immutable once appended; history is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID.
    pub id: String,
    /// The role of the message sender: "user", "assistant", or "system".
    pub role: String,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created.
    pub timestamp: DateTime<Utc>,
    /// Source citations attached to the message, in display order.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ChatMessage {
    /// Creates a message with a fresh ID and the current timestamp.
    #[must_use]
    pub fn new(role: &str, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: role.to_string(),
            content,
            timestamp: Utc::now(),
            citations: Vec::new(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: String) -> Self {
        Self::new("user", content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: String) -> Self {
        Self::new("assistant", content)
    }
}

/// A source citation attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Start index of the cited span in the message content.
    pub start_index: Option<u32>,
    /// End index of the cited span in the message content.
    pub end_index: Option<u32>,
    /// URI of the cited source.
    pub uri: Option<String>,
    /// Title of the cited source.
    pub title: Option<String>,
}

/// Parameters for controlling chat completion generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatParameters {
    /// Sampling temperature, between 0 and 2.
    pub temperature: Option<f32>,

    /// Nucleus sampling: the model considers tokens with `top_p`
    /// probability mass.
    pub top_p: Option<f32>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Up to 4 sequences where generation stops.
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for ChatParameters {
    fn default() -> Self {
        Self { temperature: Some(0.7), top_p: Some(1.0), max_tokens: Some(512), stop_sequences: None }
    }
}

/// Authoritative state of the remote trading orchestrator.
///
/// The server owns this state; the desk holds a confirmed-only mirror.
/// `last_updated` is the server's version stamp: an update carrying an
/// older stamp than the held one must be discarded, never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorState {
    /// Whether the orchestrator is actively trading.
    pub is_live: bool,
    /// Whether a wind-down is in progress. Mutually exclusive with
    /// `emergency_halt_active`.
    pub is_winding_down: bool,
    /// When the current wind-down started, if one is in progress.
    pub wind_down_started_at: Option<DateTime<Utc>>,
    /// Whether the emergency halt breaker is engaged. Implies `!is_live`.
    pub emergency_halt_active: bool,
    /// Operator-supplied reason for the halt, if halted.
    pub emergency_halt_reason: Option<String>,
    /// Risk throttle in [0, 1]; 1.0 is full permitted exposure.
    pub risk_throttle: f64,
    /// Server-side version stamp, monotonically non-decreasing.
    pub last_updated: DateTime<Utc>,
}

impl OrchestratorState {
    /// Whether this state may replace `held` under the stale-write guard.
    ///
    /// Strictly older stamps are stale; an equal stamp is an idempotent
    /// re-delivery and is allowed through.
    #[must_use]
    pub fn supersedes(&self, held: &OrchestratorState) -> bool {
        self.last_updated >= held.last_updated
    }
}

/// A lazily produced sequence of model-output text fragments.
///
/// The stream ends after the protocol sentinel or a clean EOF (the `Done`
/// outcome); a transport or decode failure is delivered as one final `Err`
/// item before the end.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// A client that can open a streaming chat completion.
///
/// Implementations serve exactly one open stream at a time; see the
/// implementing client for the queueing policy.
#[async_trait]
pub trait StreamingChat: Send + Sync {
    /// Opens one streaming completion for the given conversation.
    ///
    /// # Errors
    /// Returns a `ClientError` if the request cannot be dispatched or the
    /// server rejects it before streaming begins.
    async fn open(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ChatParameters>,
    ) -> Result<DeltaStream, ClientError>;

    /// Returns the model ID this client targets.
    fn model_id(&self) -> &str;
}

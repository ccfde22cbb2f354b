//! Streaming chat completion client.
//!
//! This module owns one streaming request lifecycle against an
//! OpenAI-compatible chat completions endpoint: it dispatches the request,
//! feeds response chunks through the frame decoder, and exposes the model
//! output as a lazy sequence of text deltas.
//!
//! # Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use tradewind_abstraction::ChatMessage;
//! use tradewind_models::ChatStreamClient;
//!
//! # async fn example() -> Result<(), tradewind_abstraction::ClientError> {
//! let client = ChatStreamClient::without_auth(
//!     "desk-copilot-7b".to_string(),
//!     "http://localhost:1234/v1".to_string(),
//! );
//!
//! let messages = vec![ChatMessage::user("status?".to_string())];
//! let mut stream = client.open(&messages, None).await?;
//! while let Some(delta) = stream.next().await {
//!     print!("{}", delta?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Constructor Patterns
//!
//! - `new()` - Loads the API key from `TRADEWIND_API_KEY` or `OPENAI_API_KEY`
//! - `with_api_key()` - Explicit API key for authenticated servers
//! - `without_auth()` - No authentication (local inference servers)

use crate::decoder::SseFrameDecoder;
use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::env;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error};
use tradewind_abstraction::{ChatMessage, ChatParameters, ClientError, StreamingChat};

/// Streaming chat completion client.
///
/// One instance serves exactly one open stream at a time: `open` calls made
/// while a stream is active queue behind its completion. The returned
/// stream owns the slot and releases it when exhausted or dropped, so
/// cancelling consumption also releases the underlying connection.
#[derive(Debug, Clone)]
pub struct ChatStreamClient {
    /// The model identifier sent with each request.
    model_id: String,
    /// Base URL for the API endpoint (e.g., "http://localhost:8000/v1").
    base_url: String,
    /// Optional API key (local servers often don't require auth).
    api_key: Option<String>,
    /// HTTP client for requests.
    client: Client,
    /// Single-permit slot enforcing the one-stream-at-a-time policy.
    slot: Arc<Semaphore>,
}

impl ChatStreamClient {
    /// Creates a new `ChatStreamClient` with the given model ID and base URL.
    ///
    /// The API key is loaded from the `TRADEWIND_API_KEY` or
    /// `OPENAI_API_KEY` environment variable.
    ///
    /// # Errors
    /// Returns a `ClientError` if neither environment variable is set.
    /// For servers that don't require authentication, use `without_auth()`.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn new(model_id: String, base_url: String) -> Result<Self, ClientError> {
        let api_key = env::var("TRADEWIND_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                ClientError::InvalidCommand(
                    "Neither TRADEWIND_API_KEY nor OPENAI_API_KEY environment variable is set. \
                     Use without_auth() for servers that don't require authentication."
                        .to_string(),
                )
            })?;

        Ok(Self::with_api_key(model_id, base_url, api_key))
    }

    /// Creates a new `ChatStreamClient` with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, base_url: String, api_key: String) -> Self {
        Self {
            model_id,
            base_url,
            api_key: Some(api_key),
            client: Client::new(),
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Creates a new `ChatStreamClient` without authentication.
    #[must_use]
    pub fn without_auth(model_id: String, base_url: String) -> Self {
        Self {
            model_id,
            base_url,
            api_key: None,
            client: Client::new(),
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Number of streams currently holding the connection slot (0 or 1).
    #[must_use]
    pub fn active_streams(&self) -> usize {
        1 - self.slot.available_permits()
    }

    /// Opens one streaming chat completion.
    ///
    /// If a prior stream from this client is still active, the call queues
    /// until that stream is exhausted or dropped. A non-success status
    /// before streaming begins is a `Transport` error; the caller can
    /// distinguish it from a clean end to decide whether to retry.
    ///
    /// # Errors
    /// Returns a `ClientError` if the request cannot be dispatched or the
    /// server rejects it.
    pub async fn open(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ChatParameters>,
    ) -> Result<ChatDeltaStream, ClientError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            parameters = ?parameters,
            "ChatStreamClient opening stream"
        );

        // Queue behind any stream already holding the slot. The permit
        // travels inside the returned stream and is released on drop.
        let permit = self
            .slot
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClientError::Transport("stream slot closed".to_string()))?;

        let url = format!("{}/chat/completions", self.base_url);

        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .map(|msg| WireMessage { role: msg.role.clone(), content: msg.content.clone() })
            .collect();

        let mut request_body = StreamingRequest {
            model: self.model_id.clone(),
            messages: wire_messages,
            stream: true,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
        };

        if let Some(params) = parameters {
            request_body.temperature = params.temperature;
            request_body.top_p = params.top_p;
            request_body.max_tokens = params.max_tokens;
            request_body.stop = params.stop_sequences;
        }

        let mut request = self.client.post(&url).json(&request_body);
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send streaming chat request");
            ClientError::Transport(format!("Network error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                url = %url,
                "Chat endpoint returned error status for streaming request"
            );
            return Err(ClientError::Transport(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        Ok(ChatDeltaStream::new(response, permit))
    }
}

#[async_trait]
impl StreamingChat for ChatStreamClient {
    async fn open(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ChatParameters>,
    ) -> Result<tradewind_abstraction::DeltaStream, ClientError> {
        let stream = ChatStreamClient::open(self, messages, parameters).await?;
        Ok(Box::pin(stream))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Lazy sequence of content deltas from one streaming completion.
///
/// Terminal conditions: the sentinel frame or a clean EOF end the sequence
/// (`None`); a mid-stream transport failure is delivered as one final
/// `Err` item. Dropping the stream at any point releases the underlying
/// connection and the client's stream slot.
pub struct ChatDeltaStream {
    /// Raw byte chunks from the response body.
    stream: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    /// Frame decoder owned exclusively by this stream.
    decoder: SseFrameDecoder,
    /// Deltas decoded but not yet yielded.
    pending: VecDeque<String>,
    /// Terminal error waiting to be yielded once `pending` drains.
    terminal_error: Option<ClientError>,
    /// Whether a terminal condition was reached.
    done: bool,
    /// Connection slot, released on drop.
    _permit: OwnedSemaphorePermit,
}

impl ChatDeltaStream {
    fn new(response: reqwest::Response, permit: OwnedSemaphorePermit) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            decoder: SseFrameDecoder::new(),
            pending: VecDeque::new(),
            terminal_error: None,
            done: false,
            _permit: permit,
        }
    }

    /// Classifies one frame payload. Payloads that fail structural decode
    /// are heartbeat frames and carry no text; this is protocol
    /// tolerance, not a transport failure. An explicit error object from
    /// the server is a protocol violation and terminates the stream.
    fn classify(payload: &str) -> FramePayload {
        if let Ok(chunk) = serde_json::from_str::<StreamChunk>(payload) {
            return chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty())
                .map_or(FramePayload::Skip, FramePayload::Delta);
        }
        if let Ok(failure) = serde_json::from_str::<StreamFailure>(payload) {
            return FramePayload::Violation(failure.error.message);
        }
        debug!("Skipping non-content frame");
        FramePayload::Skip
    }
}

/// Outcome of classifying one frame payload.
enum FramePayload {
    /// Non-empty content to yield.
    Delta(String),
    /// Heartbeat or otherwise content-free frame.
    Skip,
    /// Server-reported error mid-stream.
    Violation(String),
}

impl Stream for ChatDeltaStream {
    type Item = Result<String, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(text) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(text)));
            }
            if let Some(err) = self.terminal_error.take() {
                return Poll::Ready(Some(Err(err)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let frames = self.decoder.feed(&bytes);
                    for frame in frames {
                        if frame.is_sentinel {
                            self.done = true;
                            break;
                        }
                        match Self::classify(&frame.payload) {
                            FramePayload::Delta(text) => self.pending.push_back(text),
                            FramePayload::Skip => {}
                            FramePayload::Violation(message) => {
                                error!(message = %message, "Server reported error mid-stream");
                                self.terminal_error = Some(ClientError::Protocol(format!(
                                    "Server error mid-stream: {}",
                                    message
                                )));
                                self.done = true;
                                break;
                            }
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    // Already-decoded deltas drain first; the failure is
                    // the final item.
                    self.terminal_error =
                        Some(ClientError::Transport(format!("Stream error: {}", e)));
                    self.done = true;
                }
                Poll::Ready(None) => {
                    // Clean EOF without a sentinel still ends the stream;
                    // a trailing partial line is discarded by the decoder.
                    let _ = self.decoder.flush();
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// OpenAI-compatible wire structures for the streaming request/response.

#[derive(Debug, Serialize)]
struct StreamingRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamFailure {
    error: StreamFailureDetail,
}

#[derive(Debug, Deserialize)]
struct StreamFailureDetail {
    message: String,
}

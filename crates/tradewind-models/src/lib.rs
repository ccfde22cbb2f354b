//! Streaming model client for Tradewind.
//!
//! This crate turns a chunked, text-framed chat completion response into a
//! lazy sequence of output fragments:
//!
//! - [`SseFrameDecoder`] - incremental frame decoder, correct under
//!   arbitrary chunk boundaries (including mid-character splits)
//! - [`ChatStreamClient`] - owns one streaming request lifecycle and
//!   implements the `StreamingChat` seam

pub mod client;
pub mod decoder;

pub use client::{ChatDeltaStream, ChatStreamClient};
pub use decoder::{Frame, SseFrameDecoder};

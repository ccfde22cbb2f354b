//! Incremental decoder for text-framed streaming responses.
//!
//! The streaming chat endpoint frames its output as newline-terminated
//! lines, data lines carrying a `data: ` prefix and either a JSON payload
//! or the `[DONE]` sentinel. Chunk boundaries are arbitrary: a single line,
//! or a single multi-byte character, may be split across chunks. The
//! decoder owns the residual state that makes it correct under every such
//! split.

/// A delimited unit of the stream protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The data line remainder after the `data: ` prefix.
    pub payload: String,
    /// Whether the payload is the end-of-stream sentinel.
    pub is_sentinel: bool,
}

const DATA_PREFIX: &str = "data: ";
const SENTINEL: &str = "[DONE]";

/// Incremental SSE data-line decoder.
///
/// Feed raw byte chunks as they arrive; complete frames come out in order.
/// Two pieces of state persist across calls: an undecoded byte tail (an
/// incomplete multi-byte sequence at a chunk boundary) and a decoded but
/// unterminated line remainder. Neither is ever surfaced as a frame.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    /// Bytes that did not yet form a complete UTF-8 sequence.
    residual_bytes: Vec<u8>,
    /// Decoded text still waiting for its line terminator.
    residual_text: String,
}

impl SseFrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw chunk, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.residual_bytes.extend_from_slice(chunk);
        let decoded = self.drain_decodable();
        self.residual_text.push_str(&decoded);

        let mut frames = Vec::new();
        while let Some(pos) = self.residual_text.find('\n') {
            let line: String = self.residual_text.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(frame) = Self::frame_from_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Signals end of stream.
    ///
    /// A trailing line without a terminator is partial data and is
    /// discarded, not emitted; by this protocol `flush` therefore never
    /// yields frames. It exists to drain the residual state so a finished
    /// decoder is observably empty.
    pub fn flush(&mut self) -> Vec<Frame> {
        self.residual_bytes.clear();
        self.residual_text.clear();
        Vec::new()
    }

    /// Whether the decoder holds no buffered partial data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.residual_bytes.is_empty() && self.residual_text.is_empty()
    }

    /// Decodes the longest usable prefix of the byte buffer, leaving an
    /// incomplete trailing sequence in place for the next chunk. Invalid
    /// (not merely incomplete) sequences decode as the replacement
    /// character so one corrupt byte cannot wedge the stream.
    fn drain_decodable(&mut self) -> String {
        let mut out = String::new();
        let mut buf = std::mem::take(&mut self.residual_bytes);
        loop {
            match std::str::from_utf8(&buf) {
                Ok(text) => {
                    out.push_str(text);
                    buf.clear();
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&buf[..valid_up_to]) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            buf.drain(..valid_up_to + invalid_len);
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk;
                            // keep the tail for the next feed.
                            buf.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }
        self.residual_bytes = buf;
        out
    }

    /// Classifies one complete line. Lines without the data prefix (blank
    /// keep-alives, comments, other fields) carry no frame.
    fn frame_from_line(line: &str) -> Option<Frame> {
        line.strip_prefix(DATA_PREFIX).map(|payload| Frame {
            payload: payload.to_string(),
            is_sentinel: payload == SENTINEL,
        })
    }
}

//! Server-Sent-Events codec shared by the relay and the stream consumer.
//!
//! The relay writes frames with [`data_frame`] and [`done_frame`]; the
//! consumer feeds raw transport chunks into [`SseDecoder`] and receives
//! [`SseEvent`]s. The decoder owns an explicit byte buffer: each `feed`
//! drains complete newline-terminated lines, and any incomplete tail stays
//! buffered for the next chunk. A `data:` line whose JSON payload fails to
//! parse is assumed to be truncated by the transport rather than malformed;
//! the whole line (with its newline) is pushed back and decoding of that
//! chunk stops until more bytes arrive.

use serde_json::Value;

/// One decoded frame from the relay's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Synthetic marker emitted before any model output, naming the tools
    /// the relay executed, in execution order.
    ToolActions(Vec<String>),
    /// An incremental piece of assistant text.
    Delta(String),
    /// The `[DONE]` terminator. No content events follow it.
    Done,
}

/// Serialize a JSON payload as a single SSE frame.
pub fn data_frame(payload: &Value) -> String {
    format!("data: {payload}\n\n")
}

/// The stream terminator frame.
pub fn done_frame() -> &'static str {
    "data: [DONE]\n\n"
}

enum Line {
    Event(SseEvent),
    Ignore,
    Truncated,
}

/// Incremental SSE frame decoder with push-back on partial lines.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transport chunk and drain every complete line it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).take(newline).collect();
            match self.decode_line(&line) {
                Line::Event(event) => events.push(event),
                Line::Ignore => {}
                Line::Truncated => {
                    // Restore the line ahead of whatever is still buffered and
                    // wait for the rest of the frame.
                    let rest = std::mem::take(&mut self.buffer);
                    self.buffer = line;
                    self.buffer.push(b'\n');
                    self.buffer.extend_from_slice(&rest);
                    break;
                }
            }
        }
        events
    }

    /// Decode any residual buffered text after the transport ends.
    ///
    /// The final physical read may leave a complete line with no trailing
    /// newline; this runs the same line pass once more. Parse failures here
    /// are dropped rather than deferred since no more bytes are coming.
    /// Flushing an empty buffer is a no-op.
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let residual = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        for line in residual.split(|&b| b == b'\n') {
            if let Line::Event(event) = self.decode_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Whether the `[DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8]) -> Line {
        let Ok(text) = std::str::from_utf8(line) else {
            return Line::Ignore;
        };
        let text = text.strip_suffix('\r').unwrap_or(text);
        if text.trim().is_empty() || text.starts_with(':') {
            return Line::Ignore;
        }
        let Some(payload) = text.strip_prefix("data: ") else {
            return Line::Ignore;
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            if self.done {
                return Line::Ignore;
            }
            self.done = true;
            return Line::Event(SseEvent::Done);
        }
        let parsed: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(_) => return Line::Truncated,
        };
        // Logical content ends at [DONE]; later frames are drained silently.
        if self.done {
            return Line::Ignore;
        }
        if let Some(actions) = parsed.get("tool_actions").and_then(Value::as_array) {
            let names = actions
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect();
            return Line::Event(SseEvent::ToolActions(names));
        }
        if let Some(content) = parsed["choices"][0]["delta"]["content"].as_str() {
            if !content.is_empty() {
                return Line::Event(SseEvent::Delta(content.to_string()));
            }
        }
        Line::Ignore
    }
}

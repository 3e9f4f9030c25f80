//! Server-push wire framing.
//!
//! Each event is encoded as UTF-8 text:
//!
//! ```text
//! id: <id>\n              (omitted when the event has no id)
//! event: <type>\n
//! data: <single-line JSON>\n
//! \n
//! ```
//!
//! [`encode`] is pure and deterministic. [`FrameDecoder`] is the inverse used
//! by Rust clients of the stream: it buffers chunked bytes, splits on line
//! breaks and yields one [`DecodedFrame`] per blank-line terminated block.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::errors::FrameError;
use crate::events::PushEvent;

/// Encode an event into its exact wire bytes.
///
/// Fails when the payload cannot be serialized or when the type or id would
/// break the line-delimited framing.
pub fn encode<T: Serialize>(event: &PushEvent<T>) -> Result<Bytes, FrameError> {
    if event.event_type.is_empty() {
        return Err(FrameError::InvalidField {
            field: "type",
            reason: "must not be empty",
        });
    }
    check_single_line("type", &event.event_type)?;

    let id = event.id.as_deref().filter(|id| !id.is_empty());
    if let Some(id) = id {
        check_single_line("id", id)?;
    }

    // Compact serde_json output escapes control characters, so the payload
    // is always a single line.
    let data = serde_json::to_string(&event.data)?;

    let mut frame =
        String::with_capacity(data.len() + event.event_type.len() + id.map_or(0, str::len) + 24);
    if let Some(id) = id {
        frame.push_str("id: ");
        frame.push_str(id);
        frame.push('\n');
    }
    frame.push_str("event: ");
    frame.push_str(&event.event_type);
    frame.push('\n');
    frame.push_str("data: ");
    frame.push_str(&data);
    frame.push_str("\n\n");

    Ok(Bytes::from(frame))
}

fn check_single_line(field: &'static str, value: &str) -> Result<(), FrameError> {
    if value.contains(['\n', '\r']) {
        return Err(FrameError::InvalidField {
            field,
            reason: "must not contain line breaks",
        });
    }
    Ok(())
}

/// One event parsed back out of the wire format.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Value of the `id:` line, if any.
    pub id: Option<String>,
    /// Value of the `event:` line (`"message"` when absent).
    pub event: String,
    /// Concatenated `data:` lines, joined with `\n`.
    pub data: String,
}

impl DecodedFrame {
    /// Parse the data field as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Incremental decoder for the wire format.
///
/// Accepts `\n` and `\r\n` line endings, ignores `:` comment lines and
/// unknown fields, and drops blocks that carry no `data:` line.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line = self.buffer.split_to(newline_pos + 1);
            line.truncate(newline_pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            let Ok(line) = std::str::from_utf8(&line) else {
                continue;
            };
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Whether bytes of an unfinished frame are still buffered.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.data.is_empty() || self.event.is_some()
    }

    fn process_line(&mut self, line: &str) -> Option<DecodedFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "id" => self.id = Some(value.to_owned()),
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<DecodedFrame> {
        let id = self.id.take();
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(DecodedFrame {
            id,
            event: event.unwrap_or_else(|| "message".to_owned()),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Decode a complete byte buffer into frames.
pub fn decode(bytes: &[u8]) -> Vec<DecodedFrame> {
    FrameDecoder::new().push(bytes)
}

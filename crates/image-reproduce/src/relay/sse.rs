//! Incremental Server-Sent-Events decoder
//!
//! Upstream bytes arrive in arbitrary chunks; events are only emitted once
//! their terminating blank line has been seen (or the stream ends).

use crate::error::{ReproduceError, Result};

/// Represents a parsed SSE event
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// Data event containing the payload
    Data(String),
    /// Terminal [DONE] marker
    Done,
}

/// Largest event (single line or joined `data:` lines) accepted from upstream
pub const DEFAULT_MAX_EVENT_BYTES: usize = 8 * 1024 * 1024;

/// Buffers partial lines and multi-line `data:` fields across chunks
///
/// Each byte is scanned for a line break once; the unterminated tail is
/// carried over to the next chunk.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
    data_len: usize,
    max_event_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_event_bytes(DEFAULT_MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_event_bytes(max_event_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            data_lines: Vec::new(),
            data_len: 0,
            max_event_bytes,
        }
    }

    /// Feed a chunk, appending every event it completed to `events`
    ///
    /// Events completed before an oversized line are still appended.
    pub fn push(&mut self, chunk: &[u8], events: &mut Vec<SseEvent>) -> Result<()> {
        // The carried-over tail holds no line break, so only `chunk` needs scanning
        let mut scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let buffer = std::mem::take(&mut self.buffer);
        let mut line_start = 0;
        let mut outcome = Ok(());

        while let Some(offset) = buffer[scan_from..].iter().position(|b| *b == b'\n') {
            let line_end = scan_from + offset;
            let line = String::from_utf8_lossy(&buffer[line_start..line_end]);
            outcome = self.process_line(line.trim_end_matches('\r'), events);
            line_start = line_end + 1;
            scan_from = line_start;
            if outcome.is_err() {
                break;
            }
        }

        self.buffer = buffer;
        self.buffer.drain(..line_start);
        outcome?;

        if self.buffer.len() > self.max_event_bytes {
            return Err(self.oversized());
        }
        Ok(())
    }

    /// Flush whatever is left once the upstream closed
    pub fn finish(&mut self, events: &mut Vec<SseEvent>) -> Result<()> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.process_line(line.trim_end_matches('\r'), events)?;
        }
        self.dispatch(events);
        Ok(())
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) -> Result<()> {
        if line.is_empty() {
            self.dispatch(events);
            return Ok(());
        }

        // comment / keep-alive
        if line.starts_with(':') {
            return Ok(());
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        // event, id and retry fields carry nothing we forward
        if field == "data" {
            self.data_len += value.len() + 1;
            if self.data_len > self.max_event_bytes {
                return Err(self.oversized());
            }
            self.data_lines.push(value.to_string());
        }
        Ok(())
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        if self.data_lines.is_empty() {
            return;
        }

        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        self.data_len = 0;

        if payload == "[DONE]" {
            events.push(SseEvent::Done);
        } else {
            events.push(SseEvent::Data(payload));
        }
    }

    fn oversized(&self) -> ReproduceError {
        ReproduceError::Protocol(format!(
            "event exceeds {} bytes",
            self.max_event_bytes
        ))
    }
}

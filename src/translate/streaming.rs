//! Re-framing of a backend Server-Sent-Events byte stream.
//!
//! The backend delivers its event stream in arbitrary byte fragments that do
//! not line up with event boundaries. [`LineBuffer`] holds the unterminated
//! tail until its newline arrives, and [`StreamTranscoder`] turns each complete
//! line into zero or one downstream [`Frame`]:
//!
//! ```text
//!   fragments ──► LineBuffer ──► lines ──► StreamTranscoder ──► frames
//!                 (tail kept)             (filter, [DONE] bookkeeping)
//! ```
//!
//! Nothing here does I/O; the relay in `proxy` drives it.

use bytes::Bytes;

use super::types::ChunkProbe;
use crate::config::FramingMode;

pub const DONE_SENTINEL: &str = "[DONE]";

/// Accumulates bytes and hands out only newline-terminated lines.
///
/// Lines are decoded after they are complete, so a multi-byte character split
/// across fragments is never mangled. Only the bytes after the last newline
/// are retained between pushes.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and drain every complete line, without terminators.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(fragment);

        let Some(last_newline) = self.buf.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.buf.drain(..=last_newline).collect();
        complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Bytes still waiting for their newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// One unit written downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A `data:` event with its payload text as received.
    Data(String),
    /// The terminal `data: [DONE]` event.
    Done,
    /// A non-data line forwarded as-is (passthrough framing only).
    Raw(String),
}

impl Frame {
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Data(payload) => Bytes::from(format!("data: {payload}\n\n")),
            Self::Done => Bytes::from(format!("data: {DONE_SENTINEL}\n\n")),
            Self::Raw(line) => Bytes::from(format!("{line}\n")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    pub suppress_reasoning: bool,
    pub framing: FramingMode,
}

/// Per-request transcoder state. Dropped with the request.
#[derive(Debug)]
pub struct StreamTranscoder {
    options: StreamOptions,
    lines: LineBuffer,
    /// Non-data lines of the current event, held until its data is judged.
    held: Vec<String>,
    done_sent: bool,
    forwarded: u64,
    suppressed: u64,
    unparsed: u64,
}

impl StreamTranscoder {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            options,
            lines: LineBuffer::new(),
            held: Vec::new(),
            done_sent: false,
            forwarded: 0,
            suppressed: 0,
            unparsed: 0,
        }
    }

    /// Feed one backend fragment, returning the frames it completes, in order.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for line in self.lines.push(fragment) {
            self.process_line(&line, &mut frames);
        }
        frames
    }

    /// Call on clean end of the backend stream. Yields a `[DONE]` frame unless
    /// one was already forwarded. Any unterminated tail is discarded.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.lines.pending() > 0 {
            tracing::debug!(bytes = self.lines.pending(), "Discarding unterminated tail");
            self.lines.clear();
        }
        self.held.clear();
        if self.done_sent {
            return None;
        }
        self.done_sent = true;
        Some(Frame::Done)
    }

    pub fn done_sent(&self) -> bool {
        self.done_sent
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn unparsed(&self) -> u64 {
        self.unparsed
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<Frame>) {
        // Exactly one [DONE] per stream; anything after it is dropped.
        if self.done_sent {
            return;
        }

        let line = line.trim();
        if line.is_empty() {
            // End of an event that had no data line (a comment or keep-alive).
            self.release_held(out);
            return;
        }

        let Some(payload) = data_payload(line) else {
            if self.options.framing == FramingMode::Passthrough {
                self.held.push(line.to_string());
            }
            return;
        };

        if payload == DONE_SENTINEL {
            self.release_held(out);
            self.done_sent = true;
            out.push(Frame::Done);
            return;
        }

        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(chunk)
                if self.options.suppress_reasoning
                    && ChunkProbe::inspect(&chunk).carries_reasoning() =>
            {
                self.suppressed += 1;
                self.held.clear();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Forwarding unparseable chunk as-is");
                self.unparsed += 1;
            }
        }

        self.release_held(out);
        self.forwarded += 1;
        out.push(Frame::Data(payload.to_string()));
    }

    fn release_held(&mut self, out: &mut Vec<Frame>) {
        out.extend(self.held.drain(..).map(Frame::Raw));
    }
}

fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

//! ---
//! rbus_section: "02-messaging-wire-format"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Frame codecs for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Fixed-capacity receive buffer that turns a byte stream into lines.

use heapless::Vec;

use crate::LINE_CAPACITY;

/// Line buffer sized for protocol frames.
pub type FrameLineBuffer = LineBuffer<LINE_CAPACITY>;

/// Outcome of feeding a byte into a [`LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete, non-blank line with surrounding whitespace removed.
    Line(String),
    /// The current line outgrew the buffer and was discarded.
    Overflow,
}

/// Accumulates bytes until a `\n` delimiter. Carriage returns are never
/// stored, so a `\r\n` terminator costs no capacity.
///
/// A line longer than `N` bytes is discarded as a whole: the buffered prefix
/// is dropped when capacity is exceeded and every byte up to the next
/// delimiter is skipped, so a frame is delivered either complete or not at
/// all.
#[derive(Debug)]
pub struct LineBuffer<const N: usize> {
    buf: Vec<u8, N>,
    discarding: bool,
    overflows: u64,
}

impl<const N: usize> LineBuffer<N> {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
            overflows: 0,
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        if byte == b'\n' {
            if self.discarding {
                self.discarding = false;
                return None;
            }
            let line = String::from_utf8_lossy(&self.buf).trim().to_owned();
            self.buf.clear();
            if line.is_empty() {
                return None;
            }
            return Some(LineEvent::Line(line));
        }
        if self.discarding || byte == b'\r' {
            return None;
        }
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            self.discarding = true;
            self.overflows += 1;
            return Some(LineEvent::Overflow);
        }
        None
    }

    /// Feed a chunk of bytes, collecting every event it produces.
    pub fn extend(&mut self, bytes: &[u8]) -> std::vec::Vec<LineEvent> {
        bytes.iter().filter_map(|byte| self.push(*byte)).collect()
    }

    /// Number of bytes of the line currently being assembled.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Total number of lines discarded for exceeding capacity.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

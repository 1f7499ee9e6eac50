//! Capacity-bounded writes into the host's output buffers.
//!
//! Zero-fill and decoded samples go through the same writer, so both share
//! one overflow policy: clamp to the room left, count what did not fit and
//! never grow the buffer.

use std::ops::Range;

use log::warn;

/// Tracks the write offset within one `produce` call.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    capacity: usize,
    offset: usize,
    dropped: usize,
}

impl FrameWriter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            offset: 0,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items written so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    /// Items refused for lack of room
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Reserve room for `requested` items at the current offset.
    ///
    /// Returns the range to write, possibly shorter than requested. A short
    /// claim is logged once and counted as dropped.
    pub fn claim(&mut self, requested: usize) -> Range<usize> {
        let available = self.remaining();
        let granted = requested.min(available);
        if granted < requested {
            warn!(
                "work buffer not large enough - dropping samples. Buffer size={} Available samples={}",
                available, requested
            );
            self.dropped += requested - granted;
        }

        let start = self.offset;
        self.offset += granted;
        start..self.offset
    }
}

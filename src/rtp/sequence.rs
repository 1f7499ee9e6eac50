//! Per-session RTP timestamp/sequence tracking.
//!
//! RTP timestamps advance by sample frames, so the distance between the
//! expected and the received timestamp is exactly the number of frames
//! lost. No reordering is attempted: late packets are dropped.

use super::header::RtpHeader;

/// How an arriving packet relates to the stream position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Timestamp is behind the stream position: old duplicate or reordered
    Duplicate,
    /// Timestamp matches the stream position
    InOrder,
    /// Timestamp is ahead by this many frames
    Gap(u32),
}

/// Sender/receiver state for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceState {
    pub ssrc: u32,
    /// Next expected RTP timestamp
    pub timestamp: u32,
    /// Next expected sequence number
    pub seq: u16,
    /// Packets accepted
    pub packets: u64,
    /// Payload bytes accepted
    pub bytes: u64,
    /// Frames lost to gaps
    pub drops: u64,
    /// Gap events
    pub gaps: u64,
    /// Packets rejected as duplicates
    pub dupes: u64,
}

/// Signed distance from `a` to `b` in wrapping 32-bit timestamp space.
pub fn timestamp_diff(a: u32, b: u32) -> i32 {
    b.wrapping_sub(a) as i32
}

/// Signed distance from `a` to `b` in wrapping 16-bit sequence space.
pub fn sequence_diff(a: u16, b: u16) -> i32 {
    b.wrapping_sub(a) as i16 as i32
}

impl SequenceState {
    /// Start tracking at the given packet so that it is accepted in order.
    pub fn new(ssrc: u32, seq: u16, timestamp: u32) -> Self {
        Self {
            ssrc,
            timestamp,
            seq,
            ..Default::default()
        }
    }

    /// Classify a packet against the stream position.
    ///
    /// A marker bit resynchronizes to the packet first. Duplicates are
    /// counted and leave the position untouched. Gaps are counted and the
    /// position jumps to the packet's timestamp; the caller decides whether
    /// the gap gets zero-filled.
    pub fn classify(&mut self, header: &RtpHeader) -> Step {
        if header.marker {
            self.timestamp = header.timestamp;
        }

        let time_step = timestamp_diff(self.timestamp, header.timestamp);
        if time_step < 0 {
            self.dupes += 1;
            return Step::Duplicate;
        }
        if time_step == 0 {
            return Step::InOrder;
        }

        let frames = time_step as u32;
        self.drops += frames as u64;
        self.gaps += 1;
        self.timestamp = header.timestamp;
        Step::Gap(frames)
    }

    /// Advance past an accepted packet contributing `frames` sample frames.
    pub fn accept(&mut self, header: &RtpHeader, frames: usize, bytes: usize) {
        self.timestamp = self.timestamp.wrapping_add(frames as u32);
        self.seq = header.sequence.wrapping_add(1);
        self.packets += 1;
        self.bytes += bytes as u64;
    }

    /// Sequence numbers skipped before this packet (negative when old).
    pub fn sequence_jump(&self, header: &RtpHeader) -> i32 {
        sequence_diff(self.seq, header.sequence)
    }
}

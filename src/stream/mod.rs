//! Pull-based RTP PCM source and its shared statistics.
//!
//! The host calls [`Source::produce`] once per scheduling quantum. Control
//! and statistics live behind a [`SourceHandle`] that other threads may
//! hold while the source itself stays on the calling thread.

pub mod source;
pub mod writer;

pub use source::*;
pub use writer::*;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::rtp::PayloadFormat;
use crate::session::Session;

/// Atomic statistics for lock-free updates.
#[derive(Default)]
pub struct SourceStats {
    pub packets_received: AtomicU64,
    pub packets_accepted: AtomicU64,
    pub malformed: AtomicU64,
    pub unwanted: AtomicU64,
    pub capacity_rejects: AtomicU64,
    pub unknown_payload: AtomicU64,
    pub duplicates: AtomicU64,
    pub gaps: AtomicU64,
    /// Frames lost to gaps, whether zero-filled or skipped
    pub dropped_frames: AtomicU64,
    /// Output items discarded because the host buffer was full
    pub truncated_items: AtomicU64,
    pub items_produced: AtomicU64,
    pub interrupted: AtomicU64,
    /// Datagrams larger than the receive buffer
    pub oversized: AtomicU64,
}

impl SourceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_accepted: self.packets_accepted.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unwanted: self.unwanted.load(Ordering::Relaxed),
            capacity_rejects: self.capacity_rejects.load(Ordering::Relaxed),
            unknown_payload: self.unknown_payload.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            gaps: self.gaps.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            truncated_items: self.truncated_items.load(Ordering::Relaxed),
            items_produced: self.items_produced.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Snapshot of statistics (for non-atomic access).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub packets_accepted: u64,
    pub malformed: u64,
    pub unwanted: u64,
    pub capacity_rejects: u64,
    pub unknown_payload: u64,
    pub duplicates: u64,
    pub gaps: u64,
    pub dropped_frames: u64,
    pub truncated_items: u64,
    pub items_produced: u64,
    pub interrupted: u64,
    pub oversized: u64,
}

/// Description of the most recently active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub ssrc: u32,
    pub payload_type: u8,
    pub format_name: &'static str,
    pub sample_rate: u32,
    /// Input channels as decoded (forced or from the payload table)
    pub channels: u8,
    pub sender: SocketAddr,
    pub host: String,
    pub port: String,
    pub packets: u64,
    pub bytes: u64,
    pub drops: u64,
    pub dupes: u64,
}

impl SessionInfo {
    pub(crate) fn new(session: &Session, format: &PayloadFormat, channels: u8) -> Self {
        Self {
            ssrc: session.ssrc,
            payload_type: session.payload_type,
            format_name: format.name,
            sample_rate: format.sample_rate,
            channels,
            sender: session.sender,
            host: session.host.clone(),
            port: session.port.clone(),
            packets: session.state.packets,
            bytes: session.state.bytes,
            drops: session.state.drops,
            dupes: session.state.dupes,
        }
    }
}

pub(crate) struct Shared {
    pub(crate) ssrc: AtomicU32,
    pub(crate) quiet: AtomicBool,
    pub(crate) stats: SourceStats,
    pub(crate) session: Mutex<Option<SessionInfo>>,
}

/// Thread-safe control handle for a running source.
#[derive(Clone)]
pub struct SourceHandle {
    pub(crate) inner: Arc<Shared>,
}

impl SourceHandle {
    pub(crate) fn new(ssrc: u32, quiet: bool) -> Self {
        Self {
            inner: Arc::new(Shared {
                ssrc: AtomicU32::new(ssrc),
                quiet: AtomicBool::new(quiet),
                stats: SourceStats::new(),
                session: Mutex::new(None),
            }),
        }
    }

    /// Requested SSRC (0 = first seen)
    pub fn ssrc(&self) -> u32 {
        self.inner.ssrc.load(Ordering::Relaxed)
    }

    /// Change the SSRC filter. Sessions for other SSRCs are closed when the
    /// next packet arrives.
    pub fn set_ssrc(&self, ssrc: u32) {
        self.inner.ssrc.store(ssrc, Ordering::Relaxed);
    }

    pub fn is_quiet(&self) -> bool {
        self.inner.quiet.load(Ordering::Relaxed)
    }

    /// Suppress session change notices
    pub fn set_quiet(&self, quiet: bool) {
        self.inner.quiet.store(quiet, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.inner.session.lock().clone()
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("ssrc", &self.ssrc())
            .field("quiet", &self.is_quiet())
            .finish()
    }
}

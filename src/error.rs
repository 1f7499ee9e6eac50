//! Error types for the RTP PCM source.
//!
//! Per-packet variants (`MalformedHeader`, `UnwantedSource`, ...) never
//! abort the stream: the source counts them and moves on. Only the
//! configuration variants are fatal, and only at construction time.

use thiserror::Error;

/// Errors raised while configuring the source or handling a packet.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed RTP header: {0}")]
    MalformedHeader(&'static str),

    #[error("unwanted source SSRC {0:#010x}")]
    UnwantedSource(u32),

    #[error("unknown payload type {0}")]
    UnknownPayloadType(u8),

    #[error("unsupported input channel count {0}")]
    UnsupportedChannels(u8),

    #[error("session registry full ({capacity} active)")]
    SessionCapacityExceeded { capacity: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("receive interrupted")]
    ReceiveInterrupted,

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors that only affect the current packet.
    pub fn is_per_packet(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader(_)
                | Error::UnwantedSource(_)
                | Error::UnknownPayloadType(_)
                | Error::UnsupportedChannels(_)
                | Error::SessionCapacityExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! RTP (Real-time Transport Protocol) module.
//!
//! Provides header parsing and building, the PCM payload type table,
//! per-session sequence tracking and the multicast receive socket.

pub mod header;
pub mod payload;
pub mod sequence;
pub mod socket;

pub use header::*;
pub use payload::*;
pub use sequence::*;
pub use socket::*;

//! rtp-pcm-source: multicast RTP receiver for raw 16-bit PCM and I/Q streams.
//!
//! A [`Source`] joins a multicast group and, each time the host asks for
//! samples, performs one blocking receive. The packet is matched to a
//! session by SSRC and sender, gaps in the RTP timestamp are zero-filled
//! when the output budget allows, and the payload is converted straight
//! into the host's float, complex or 16-bit buffers.
//!
//! ```no_run
//! use rtp_pcm_source::{OutputBuffers, Source, SourceConfig};
//!
//! let config = SourceConfig::parse("rtp://239.1.2.3:5004?out=2").unwrap();
//! let mut source = Source::open(config).unwrap();
//!
//! let (mut left, mut right) = (vec![0.0f32; 4096], vec![0.0f32; 4096]);
//! let mut bufs: [&mut [f32]; 2] = [&mut left, &mut right];
//! let n = source.produce(4096, &mut OutputBuffers::Float(&mut bufs)).unwrap();
//! println!("{} frames", n);
//! ```

pub mod codec;
pub mod error;
pub mod rtp;
pub mod session;
pub mod stream;
pub mod url;

pub use codec::{Complex32, OutputBuffers, OutputLayout, PcmDecoder, SampleType};
pub use error::{Error, Result};
pub use rtp::{McastSocket, PacketSource, PayloadFormat, RtpHeader, RtpPacket, SequenceState, Step};
pub use session::{Admission, Session, SessionRegistry};
pub use stream::{FrameWriter, SessionInfo, Source, SourceHandle, SourceStats, StatsSnapshot};
pub use url::SourceConfig;

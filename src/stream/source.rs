//! RTP PCM source: one blocking receive per host call.
//!
//! Receives a datagram, matches it to a session, zero-fills any timestamp
//! gap and decodes the payload straight into the host's buffers. Nothing
//! is buffered across calls; late packets are counted and dropped.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, trace, warn};

use super::{FrameWriter, SessionInfo, SourceHandle, SourceStats};
use crate::codec::{OutputBuffers, OutputLayout, PcmDecoder};
use crate::error::{Error, Result};
use crate::rtp::{is_oversized, McastSocket, PacketSource, PayloadFormat, RtpPacket, Step};
use crate::session::{Admission, SessionRegistry};
use crate::url::SourceConfig;

/// Receive buffer size; allows for jumbograms
pub const RECV_BUFFER_SIZE: usize = 9000;

/// Pull-based RTP PCM receiver.
pub struct Source<S: PacketSource = McastSocket> {
    socket: S,
    config: SourceConfig,
    decoder: PcmDecoder,
    registry: SessionRegistry,
    handle: SourceHandle,
    buf: Vec<u8>,
    deemphasis_warned: bool,
    capacity_warned: bool,
}

impl Source<McastSocket> {
    /// Open the configured group and build a source on it.
    pub fn open(config: SourceConfig) -> Result<Self> {
        config.validate()?;
        let socket = McastSocket::open_str(&config.group, config.interface, Some(config.recv_timeout))
            .map_err(|e| {
                Error::InvalidConfiguration(format!("can't set up input from \"{}\": {}", config.group, e))
            })?;
        Self::with_socket(socket, config)
    }
}

impl<S: PacketSource> Source<S> {
    /// Build a source on an already configured packet source.
    pub fn with_socket(socket: S, config: SourceConfig) -> Result<Self> {
        let layout = config.validate()?;
        let handle = SourceHandle::new(config.ssrc, config.quiet);

        Ok(Self {
            socket,
            decoder: PcmDecoder::new(layout),
            registry: SessionRegistry::new(config.max_sessions),
            handle,
            config,
            buf: vec![0u8; RECV_BUFFER_SIZE],
            deemphasis_warned: false,
            capacity_warned: false,
        })
    }

    pub fn layout(&self) -> OutputLayout {
        self.decoder.layout()
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Control handle shareable with other threads
    pub fn handle(&self) -> SourceHandle {
        self.handle.clone()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Sample rate of the current session
    pub fn sample_rate(&self) -> Option<u32> {
        self.handle.session().map(|s| s.sample_rate)
    }

    /// Input channel count of the current session
    pub fn channels(&self) -> Option<u8> {
        self.handle.session().map(|s| s.channels)
    }

    pub fn bits_per_sample(&self) -> u32 {
        16
    }

    pub fn ssrc(&self) -> u32 {
        self.handle.ssrc()
    }

    pub fn set_ssrc(&self, ssrc: u32) {
        self.handle.set_ssrc(ssrc);
    }

    /// Receive at most one packet and write its samples.
    ///
    /// `budget` bounds the items written per channel, on top of the buffer
    /// lengths. Returns the items written per channel; 0 when nothing
    /// arrived or the packet was discarded. Only a mismatched buffer set or
    /// a non-transient socket failure is an error.
    pub fn produce(&mut self, budget: usize, out: &mut OutputBuffers<'_, '_>) -> Result<usize> {
        out.check(self.decoder.layout())?;
        let capacity = budget.min(out.capacity());
        let shared = Arc::clone(&self.handle.inner);
        let stats = &shared.stats;

        let mut buf = std::mem::take(&mut self.buf);
        let received = self.socket.recv_packet(&mut buf);
        let result = match received {
            Ok((len, sender)) => {
                SourceStats::bump(&stats.packets_received, 1);
                match self.process(&buf[..len], sender, capacity, out) {
                    Ok(n) => Ok(n),
                    Err(e) if e.is_per_packet() => {
                        self.count_discard(&e);
                        Ok(0)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {
                trace!("{}", Error::ReceiveInterrupted);
                SourceStats::bump(&stats.interrupted, 1);
                Ok(0)
            }
            Err(ref e) if is_oversized(e) => {
                debug!("discarding packet larger than {} bytes", RECV_BUFFER_SIZE);
                SourceStats::bump(&stats.oversized, 1);
                Ok(0)
            }
            Err(e) => Err(Error::Io(e)),
        };
        self.buf = buf;

        if let Ok(n) = &result {
            SourceStats::bump(&stats.items_produced, *n as u64);
        }
        result
    }

    fn count_discard(&mut self, e: &Error) {
        let stats = &self.handle.inner.stats;
        let counter = match e {
            Error::MalformedHeader(_) => &stats.malformed,
            Error::UnwantedSource(_) => &stats.unwanted,
            Error::SessionCapacityExceeded { .. } => &stats.capacity_rejects,
            Error::UnknownPayloadType(_) | Error::UnsupportedChannels(_) => &stats.unknown_payload,
            _ => return,
        };
        SourceStats::bump(counter, 1);

        if matches!(e, Error::SessionCapacityExceeded { .. }) && !self.capacity_warned {
            warn!("{}, ignoring new sources", e);
            self.capacity_warned = true;
        } else {
            debug!("discarding packet: {}", e);
        }
    }

    fn process(
        &mut self,
        data: &[u8],
        sender: SocketAddr,
        capacity: usize,
        out: &mut OutputBuffers<'_, '_>,
    ) -> Result<usize> {
        let packet = RtpPacket::parse(data)?;
        let header = &packet.header;
        if packet.payload.is_empty() {
            return Ok(0);
        }

        let filter = self.handle.ssrc();
        if header.ssrc == 0 || (filter != 0 && header.ssrc != filter) {
            return Err(Error::UnwantedSource(header.ssrc));
        }

        let format = PayloadFormat::from_pt(header.payload_type)
            .ok_or(Error::UnknownPayloadType(header.payload_type))?;
        let channels = self.config.input_channels.unwrap_or(format.channels);
        if !(1..=2).contains(&channels) {
            return Err(Error::UnsupportedChannels(channels));
        }

        // A changed filter closes the other sessions once a matching packet arrives
        if filter != 0 && self.registry.iter().any(|s| s.ssrc != filter) {
            self.registry.retain_only(filter);
        }

        let quiet = self.handle.is_quiet();
        let (session, admission) = self.registry.admit(sender, header)?;
        match admission {
            Admission::New if !quiet => info!(
                "New session from {}@{}:{}, type {}, channels {}, samprate {}",
                session.ssrc, session.host, session.port, header.payload_type, channels, format.sample_rate
            ),
            Admission::Restarted if !quiet => info!(
                "Session restart from {}@{}:{}",
                session.ssrc, session.host, session.port
            ),
            Admission::Existing if session.payload_type != header.payload_type => {
                if !quiet {
                    info!(
                        "Payload type changed from {} to {} ({})",
                        session.payload_type, header.payload_type, format.name
                    );
                }
                session.payload_type = header.payload_type;
            }
            _ => {}
        }

        if format.deemphasis && !self.deemphasis_warned {
            warn!("{} needs de-emphasis, which is not applied", format.name);
            self.deemphasis_warned = true;
        }

        let jump = session.state.sequence_jump(header);
        if jump != 0 && admission == Admission::Existing {
            trace!("sequence jump of {} at seq {}", jump, header.sequence);
        }

        let stats = &self.handle.inner.stats;
        let mut writer = FrameWriter::new(capacity);
        let layout = self.decoder.layout();
        let mut written = 0;

        match session.state.classify(header) {
            Step::Duplicate => {
                SourceStats::bump(&stats.duplicates, 1);
                *self.handle.inner.session.lock() = Some(SessionInfo::new(session, format, channels));
                return Ok(0);
            }
            Step::InOrder => {}
            Step::Gap(frames) => {
                SourceStats::bump(&stats.gaps, 1);
                SourceStats::bump(&stats.dropped_frames, frames as u64);
                info!("Drops {}", session.state.drops);

                let items = frames as usize * layout.items_per_frame(channels);
                if items <= writer.remaining() {
                    let range = writer.claim(items);
                    written += self.decoder.zero_fill(out, range);
                } else {
                    debug!("gap of {} frames exceeds output budget {}, not zero-filling", frames, capacity);
                }
            }
        }

        let items = self.decoder.items_in(packet.payload.len(), channels);
        let range = writer.claim(items);
        written += self.decoder.decode(packet.payload, channels, out, range);

        let frames = PcmDecoder::frames_in(packet.payload.len(), channels);
        session.state.accept(header, frames, packet.payload.len());

        SourceStats::bump(&stats.packets_accepted, 1);
        SourceStats::bump(&stats.truncated_items, writer.dropped() as u64);
        *self.handle.inner.session.lock() = Some(SessionInfo::new(session, format, channels));

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    use crate::codec::SampleType;
    use crate::rtp::RtpHeader;

    /// Scripted datagrams, then timeouts
    struct Script(VecDeque<io::Result<(Vec<u8>, SocketAddr)>>);

    impl PacketSource for Script {
        fn recv_packet(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            match self.0.pop_front() {
                Some(Ok((data, from))) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok((data.len(), from))
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(ErrorKind::WouldBlock, "empty")),
            }
        }
    }

    fn sender() -> SocketAddr {
        "10.0.0.1:5004".parse().unwrap()
    }

    fn packet(pt: u8, seq: u16, ts: u32, samples: &[i16]) -> Vec<u8> {
        let header = RtpHeader {
            version: 2,
            payload_type: pt,
            sequence: seq,
            timestamp: ts,
            ssrc: 0x55,
            ..Default::default()
        };
        let mut data = header.to_bytes();
        data.extend(samples.iter().flat_map(|s| s.to_be_bytes()));
        data
    }

    fn source(packets: Vec<Vec<u8>>, config: SourceConfig) -> Source<Script> {
        let script = packets.into_iter().map(|p| Ok((p, sender()))).collect();
        Source::with_socket(Script(script), config).unwrap()
    }

    fn pull_mono(src: &mut Source<Script>, budget: usize, out: &mut [f32]) -> usize {
        let mut bufs: [&mut [f32]; 1] = [out];
        src.produce(budget, &mut OutputBuffers::Float(&mut bufs)).unwrap()
    }

    #[test]
    fn test_fresh_session_decodes_payload() {
        let mut src = source(vec![packet(11, 0, 0, &[7; 50])], SourceConfig::default());
        let mut out = [0.0f32; 256];
        assert_eq!(pull_mono(&mut src, 256, &mut out), 50);
        assert_eq!(out[49], 7.0 / 32767.0);

        let info = src.handle().session().unwrap();
        assert_eq!(info.ssrc, 0x55);
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(src.sample_rate(), Some(48000));
        assert_eq!(src.channels(), Some(1));
    }

    #[test]
    fn test_gap_zero_fills_before_payload() {
        let mut src = source(
            vec![packet(11, 0, 0, &[1; 20]), packet(11, 3, 60, &[2; 20])],
            SourceConfig::default(),
        );
        let mut out = [9.0f32; 256];
        assert_eq!(pull_mono(&mut src, 256, &mut out), 20);

        // Expected 20, got 60: 40 frames of silence then the payload
        assert_eq!(pull_mono(&mut src, 256, &mut out), 60);
        assert!(out[..40].iter().all(|&s| s == 0.0));
        assert_eq!(out[40], 2.0 / 32767.0);

        let stats = src.handle().stats();
        assert_eq!(stats.gaps, 1);
        assert_eq!(stats.dropped_frames, 40);
    }

    #[test]
    fn test_gap_larger_than_budget_skips_fill() {
        let mut src = source(
            vec![
                packet(11, 0, 0, &[1; 20]),
                packet(11, 1, 1000, &[2; 20]),
                packet(11, 2, 1020, &[3; 20]),
            ],
            SourceConfig::default(),
        );
        let mut out = [0.0f32; 64];
        assert_eq!(pull_mono(&mut src, 64, &mut out), 20);
        assert_eq!(pull_mono(&mut src, 64, &mut out), 20);
        assert_eq!(out[0], 2.0 / 32767.0);
        // Resynced: the next packet is in order
        assert_eq!(pull_mono(&mut src, 64, &mut out), 20);
        assert_eq!(src.handle().stats().gaps, 1);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut src = source(
            vec![
                packet(11, 0, 0, &[1; 20]),
                packet(11, 1, 20, &[1; 20]),
                packet(11, 1, 20, &[1; 20]),
                packet(11, 0, 10, &[1; 20]),
            ],
            SourceConfig::default(),
        );
        let mut out = [0.0f32; 64];
        assert_eq!(pull_mono(&mut src, 64, &mut out), 20);
        assert_eq!(pull_mono(&mut src, 64, &mut out), 20);
        assert_eq!(pull_mono(&mut src, 64, &mut out), 0);
        assert_eq!(src.handle().stats().duplicates, 1);
        assert_eq!(pull_mono(&mut src, 64, &mut out), 0);
        assert_eq!(src.handle().stats().duplicates, 2);

        let session = src.registry().get(0x55).unwrap();
        assert_eq!(session.state.timestamp, 40);
        assert_eq!(session.state.seq, 2);
    }

    #[test]
    fn test_late_timestamps_after_gap() {
        let mut src = source(
            vec![
                packet(11, 0, 0, &[1; 20]),
                packet(11, 1, 100, &[1; 20]),
                packet(11, 2, 100, &[1; 20]),
                packet(11, 3, 50, &[1; 20]),
            ],
            SourceConfig::default(),
        );
        let mut out = [0.0f32; 256];
        assert_eq!(pull_mono(&mut src, 256, &mut out), 20);
        // 80 frames of silence, then the packet
        assert_eq!(pull_mono(&mut src, 256, &mut out), 100);
        assert_eq!(pull_mono(&mut src, 256, &mut out), 0);
        assert_eq!(src.handle().stats().duplicates, 1);
        assert_eq!(pull_mono(&mut src, 256, &mut out), 0);

        let info = src.handle().session().unwrap();
        assert_eq!(info.dupes, 2);
        assert_eq!(info.drops, 80);
        assert_eq!(src.registry().get(0x55).unwrap().state.timestamp, 120);
    }

    #[test]
    fn test_budget_truncates_payload() {
        let mut src = source(vec![packet(11, 0, 0, &[5; 50])], SourceConfig::default());
        let mut out = [0.0f32; 64];
        assert_eq!(pull_mono(&mut src, 30, &mut out), 30);
        assert_eq!(out[30], 0.0);
        assert_eq!(src.handle().stats().truncated_items, 20);
        // Timestamp still advances by the whole packet
        assert_eq!(src.registry().get(0x55).unwrap().state.timestamp, 50);
    }

    #[test]
    fn test_ssrc_filter_and_unknown_payload() {
        let config = SourceConfig {
            ssrc: 0x99,
            ..Default::default()
        };
        let mut src = source(vec![packet(11, 0, 0, &[1; 4])], config);
        let mut out = [0.0f32; 8];
        assert_eq!(pull_mono(&mut src, 8, &mut out), 0);
        assert_eq!(src.handle().stats().unwanted, 1);
        assert!(src.registry().is_empty());

        let mut src = source(vec![packet(111, 0, 0, &[1; 4])], SourceConfig::default());
        assert_eq!(pull_mono(&mut src, 8, &mut out), 0);
        assert_eq!(src.handle().stats().unknown_payload, 1);
        assert!(src.registry().is_empty());
    }

    #[test]
    fn test_malformed_counted() {
        let mut bad = packet(11, 0, 0, &[1; 4]);
        bad[0] = 0x40;
        let mut src = source(vec![bad, vec![0x80; 5]], SourceConfig::default());
        let mut out = [0.0f32; 8];
        assert_eq!(pull_mono(&mut src, 8, &mut out), 0);
        assert_eq!(pull_mono(&mut src, 8, &mut out), 0);
        assert_eq!(src.handle().stats().malformed, 2);
        assert!(src.registry().is_empty());
    }

    #[test]
    fn test_timeout_and_interrupt_yield_zero() {
        let script = vec![Err(io::Error::new(ErrorKind::Interrupted, "signal"))]
            .into_iter()
            .collect();
        let mut src = Source::with_socket(Script(script), SourceConfig::default()).unwrap();
        let mut out = [0.0f32; 8];
        assert_eq!(pull_mono(&mut src, 8, &mut out), 0);
        assert_eq!(pull_mono(&mut src, 8, &mut out), 0);
        assert_eq!(src.handle().stats().interrupted, 1);
    }

    #[test]
    fn test_hard_socket_error_propagates() {
        let script = vec![Err(io::Error::new(ErrorKind::ConnectionRefused, "gone"))]
            .into_iter()
            .collect();
        let mut src = Source::with_socket(Script(script), SourceConfig::default()).unwrap();
        let mut out = [0.0f32; 8];
        let mut bufs: [&mut [f32]; 1] = [&mut out];
        let err = src.produce(8, &mut OutputBuffers::Float(&mut bufs)).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_buffer_mismatch_rejected() {
        let mut src = source(vec![], SourceConfig::default());
        let mut l = [0i16; 8];
        let mut bufs: [&mut [i16]; 1] = [&mut l];
        assert!(matches!(
            src.produce(8, &mut OutputBuffers::Int16(&mut bufs)),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_complex_stereo_config_fails() {
        let config = SourceConfig {
            sample_type: SampleType::Complex,
            output_channels: 2,
            ..Default::default()
        };
        assert!(Source::with_socket(Script(VecDeque::new()), config).is_err());
    }

    #[test]
    fn test_huge_session_count_rejected() {
        let config = SourceConfig::parse("rtp://239.1.2.3?sessions=18446744073709551615").unwrap();
        assert!(matches!(
            Source::with_socket(Script(VecDeque::new()), config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_oversized_datagram_dropped() {
        let err = io::Error::from_raw_os_error(crate::rtp::socket::MSG_TOO_LONG);
        let script = vec![Err(err), Ok((packet(11, 0, 0, &[3; 8]), sender()))]
            .into_iter()
            .collect();
        let mut src = Source::with_socket(Script(script), SourceConfig::default()).unwrap();
        let mut out = [0.0f32; 16];
        assert_eq!(pull_mono(&mut src, 16, &mut out), 0);
        assert_eq!(src.handle().stats().oversized, 1);
        // The stream carries on with the next datagram
        assert_eq!(pull_mono(&mut src, 16, &mut out), 8);
    }
}

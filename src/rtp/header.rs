//! RTP header parsing and building.
//!
//! Implements the RFC 3550 fixed header, CSRC list, header extension
//! skipping and padding removal.

use crate::error::{Error, Result};

/// Size of the fixed RTP header
pub const RTP_MIN_SIZE: usize = 12;
/// The only RTP version we accept
pub const RTP_VERSION: u8 = 2;
/// Largest CSRC list the 4-bit count can declare
pub const MAX_CSRC: usize = 15;

/// RTP header structure (12 bytes minimum)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RtpHeader {
    /// RTP version (always 2 after a successful decode)
    pub version: u8,
    /// Padding flag
    pub padding: bool,
    /// Extension flag
    pub extension: bool,
    /// Marker bit
    pub marker: bool,
    /// Payload type (0-127)
    pub payload_type: u8,
    /// Sequence number (wraps at 65535)
    pub sequence: u16,
    /// Timestamp in sample frames (wraps)
    pub timestamp: u32,
    /// Synchronization source identifier
    pub ssrc: u32,
    /// Contributing sources
    pub csrc: Vec<u32>,
}

impl RtpHeader {
    /// Decode a header from wire bytes.
    ///
    /// Returns the header and the offset of the first payload byte, which
    /// lies past the CSRC list and any header extension.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < RTP_MIN_SIZE {
            return Err(Error::MalformedHeader("shorter than 12 bytes"));
        }

        let byte0 = data[0];
        let version = (byte0 >> 6) & 0x03;
        if version != RTP_VERSION {
            return Err(Error::MalformedHeader("version is not 2"));
        }

        let padding = (byte0 & 0x20) != 0;
        let extension = (byte0 & 0x10) != 0;
        let csrc_count = (byte0 & 0x0F) as usize;

        let byte1 = data[1];
        let marker = (byte1 & 0x80) != 0;
        let payload_type = byte1 & 0x7F;

        let sequence = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = RTP_MIN_SIZE + csrc_count * 4;
        if data.len() < offset {
            return Err(Error::MalformedHeader("CSRC list runs past end of packet"));
        }

        let csrc = data[RTP_MIN_SIZE..offset]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        if extension {
            if data.len() < offset + 4 {
                return Err(Error::MalformedHeader("extension header runs past end of packet"));
            }
            // Extension length is in 32-bit words, excluding the 4-byte preamble
            let ext_words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + ext_words * 4;
            if data.len() < offset {
                return Err(Error::MalformedHeader("extension runs past end of packet"));
            }
        }

        let header = RtpHeader {
            version,
            padding,
            extension,
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            csrc,
        };

        Ok((header, offset))
    }

    /// Number of contributing sources
    pub fn csrc_count(&self) -> usize {
        self.csrc.len().min(MAX_CSRC)
    }

    /// Size of the fixed header plus CSRC list
    pub fn header_size(&self) -> usize {
        RTP_MIN_SIZE + self.csrc_count() * 4
    }

    /// Encode header to bytes. Returns bytes written, or 0 if the buffer
    /// cannot hold the header and CSRC list.
    ///
    /// No extension body is written; the extension flag is copied as-is.
    pub fn encode(&self, buffer: &mut [u8]) -> usize {
        let size = self.header_size();
        if buffer.len() < size {
            return 0;
        }

        let byte0 = (self.version << 6)
            | if self.padding { 0x20 } else { 0 }
            | if self.extension { 0x10 } else { 0 }
            | (self.csrc_count() as u8 & 0x0F);

        let byte1 = if self.marker { 0x80 } else { 0 } | (self.payload_type & 0x7F);

        buffer[0] = byte0;
        buffer[1] = byte1;
        buffer[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buffer[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buffer[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        for (i, csrc) in self.csrc.iter().take(MAX_CSRC).enumerate() {
            let at = RTP_MIN_SIZE + i * 4;
            buffer[at..at + 4].copy_from_slice(&csrc.to_be_bytes());
        }

        size
    }

    /// Encode into a freshly allocated vector
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.header_size()];
        self.encode(&mut buf);
        buf
    }
}

/// Parsed RTP packet with header and payload reference
#[derive(Debug)]
pub struct RtpPacket<'a> {
    /// Parsed header; `padding` is cleared once the padding is removed
    pub header: RtpHeader,
    /// Payload data (after header, CSRC list and extension, minus padding)
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Parse an RTP packet from bytes
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let (mut header, offset) = RtpHeader::decode(data)?;

        // The last payload byte counts the padding bytes, itself included
        let payload_end = if header.padding && data.len() > offset {
            let padding_len = data[data.len() - 1] as usize;
            if padding_len > data.len() - offset {
                return Err(Error::MalformedHeader("padding exceeds payload"));
            }
            header.padding = false;
            data.len() - padding_len
        } else {
            data.len()
        };

        Ok(RtpPacket {
            header,
            payload: &data[offset..payload_end],
        })
    }
}

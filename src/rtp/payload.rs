//! RTP payload type table for the PCM/IQ family.
//!
//! Maps payload type codes to sample rate and channel layout. Every type
//! carries signed 16-bit big-endian samples. Types missing from the table
//! are not decoded.

/// One row of the payload type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadFormat {
    /// RTP payload type code
    pub payload_type: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channels per frame (2 also covers I/Q pairs)
    pub channels: u8,
    /// FM audio that still needs de-emphasis after decoding
    pub deemphasis: bool,
    /// Short name for logs
    pub name: &'static str,
}

const fn row(payload_type: u8, sample_rate: u32, channels: u8, name: &'static str) -> PayloadFormat {
    PayloadFormat {
        payload_type,
        sample_rate,
        channels,
        deemphasis: false,
        name,
    }
}

/// Known payload types. All entries are flat audio or raw samples.
pub static PAYLOAD_FORMATS: &[PayloadFormat] = &[
    row(10, 48000, 2, "PCM stereo 48k"),
    row(11, 48000, 1, "PCM mono 48k"),
    row(93, 48000, 1, "real 16-bit"),
    row(97, 48000, 2, "I/Q 16-bit"),
    row(114, 48000, 1, "PCM mono 48k (114)"),
    row(115, 48000, 2, "PCM stereo 48k (115)"),
    row(116, 24000, 1, "PCM mono 24k"),
    row(117, 24000, 2, "PCM stereo 24k"),
    row(119, 16000, 1, "PCM mono 16k"),
    row(120, 16000, 2, "PCM stereo 16k"),
    row(122, 12000, 1, "PCM mono 12k"),
    row(123, 12000, 2, "PCM stereo 12k"),
    row(125, 8000, 1, "PCM mono 8k"),
    row(126, 8000, 2, "PCM stereo 8k"),
];

impl PayloadFormat {
    /// Look up a payload type
    pub fn from_pt(pt: u8) -> Option<&'static PayloadFormat> {
        PAYLOAD_FORMATS.iter().find(|f| f.payload_type == pt)
    }

    /// Find the first payload type carrying the given rate and layout
    pub fn pt_from_info(sample_rate: u32, channels: u8) -> Option<u8> {
        PAYLOAD_FORMATS
            .iter()
            .find(|f| f.sample_rate == sample_rate && f.channels == channels)
            .map(|f| f.payload_type)
    }

    /// Bytes per sample frame (all channels)
    pub fn frame_bytes(&self) -> usize {
        2 * self.channels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_type_mapping() {
        let mono = PayloadFormat::from_pt(11).unwrap();
        assert_eq!(mono.sample_rate, 48000);
        assert_eq!(mono.channels, 1);

        let stereo = PayloadFormat::from_pt(10).unwrap();
        assert_eq!(stereo.channels, 2);
        assert_eq!(stereo.frame_bytes(), 4);

        assert_eq!(PayloadFormat::from_pt(125).unwrap().sample_rate, 8000);
        assert_eq!(PayloadFormat::from_pt(97).unwrap().channels, 2);
        assert_eq!(PayloadFormat::from_pt(114).unwrap().channels, 1);
    }

    #[test]
    fn test_unknown_types() {
        // Opus and AX.25 are outside the PCM family
        assert!(PayloadFormat::from_pt(111).is_none());
        assert!(PayloadFormat::from_pt(96).is_none());
        assert!(PayloadFormat::from_pt(0).is_none());
    }

    #[test]
    fn test_pt_from_info() {
        assert_eq!(PayloadFormat::pt_from_info(48000, 1), Some(11));
        assert_eq!(PayloadFormat::pt_from_info(24000, 2), Some(117));
        assert_eq!(PayloadFormat::pt_from_info(44100, 2), None);
    }

    #[test]
    fn test_table_is_flat() {
        assert!(PAYLOAD_FORMATS.iter().all(|f| !f.deemphasis));
    }
}

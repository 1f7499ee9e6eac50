//! Output sample layouts and caller-owned output buffers.
//!
//! The layout is chosen once at construction from the requested sample
//! type and output channel count; it never changes per packet.
//!
//! Supported layouts:
//! - Float1: mono float, stereo input is averaged
//! - Float2: stereo float, mono input is duplicated
//! - Complex1: one complex stream, (left, right) or (mono, 0)
//! - Int16Interleaved: one short stream, stereo input stays interleaved
//! - Int16Stereo: two short streams, mono input is duplicated

pub mod pcm;

pub use num_complex::Complex32;
pub use pcm::PcmDecoder;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Sample type delivered to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// f32 scaled by 1/32767
    Float,
    /// Complex f32, one output only
    Complex,
    /// Raw i16 in host byte order
    Int16,
}

impl FromStr for SampleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "float" | "f32" => Ok(SampleType::Float),
            "complex" | "iq" | "c32" => Ok(SampleType::Complex),
            "short" | "int16" | "i16" => Ok(SampleType::Int16),
            other => Err(Error::InvalidConfiguration(format!("unknown sample type '{}'", other))),
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::Float => "float",
            SampleType::Complex => "complex",
            SampleType::Int16 => "short",
        };
        f.write_str(name)
    }
}

/// Output layout, fixed for the life of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    Float1,
    Float2,
    Complex1,
    Int16Interleaved,
    Int16Stereo,
}

impl OutputLayout {
    /// Pick the layout for a sample type and output channel count.
    pub fn new(sample_type: SampleType, channels: u8) -> Result<Self> {
        match (sample_type, channels) {
            (SampleType::Float, 1) => Ok(OutputLayout::Float1),
            (SampleType::Float, 2) => Ok(OutputLayout::Float2),
            (SampleType::Complex, 1) => Ok(OutputLayout::Complex1),
            (SampleType::Complex, n) => Err(Error::InvalidConfiguration(format!(
                "complex output requires exactly 1 output channel, got {}",
                n
            ))),
            (SampleType::Int16, 1) => Ok(OutputLayout::Int16Interleaved),
            (SampleType::Int16, 2) => Ok(OutputLayout::Int16Stereo),
            (_, n) => Err(Error::InvalidConfiguration(format!(
                "output channel count must be 1 or 2, got {}",
                n
            ))),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            OutputLayout::Float1 | OutputLayout::Float2 => SampleType::Float,
            OutputLayout::Complex1 => SampleType::Complex,
            OutputLayout::Int16Interleaved | OutputLayout::Int16Stereo => SampleType::Int16,
        }
    }

    /// Number of output buffers
    pub fn channels(&self) -> usize {
        match self {
            OutputLayout::Float1 | OutputLayout::Complex1 | OutputLayout::Int16Interleaved => 1,
            OutputLayout::Float2 | OutputLayout::Int16Stereo => 2,
        }
    }

    /// Output items produced per input sample frame.
    ///
    /// Only the interleaved short layout expands a stereo frame into two
    /// items; every other layout emits one item per frame.
    pub fn items_per_frame(&self, input_channels: u8) -> usize {
        match (self, input_channels) {
            (OutputLayout::Int16Interleaved, 2) => 2,
            _ => 1,
        }
    }
}

/// Caller-owned per-channel output buffers.
///
/// The source only writes inside the buffers and never resizes them.
pub enum OutputBuffers<'a, 'b> {
    Float(&'a mut [&'b mut [f32]]),
    Complex(&'a mut [&'b mut [Complex32]]),
    Int16(&'a mut [&'b mut [i16]]),
}

impl OutputBuffers<'_, '_> {
    pub fn sample_type(&self) -> SampleType {
        match self {
            OutputBuffers::Float(_) => SampleType::Float,
            OutputBuffers::Complex(_) => SampleType::Complex,
            OutputBuffers::Int16(_) => SampleType::Int16,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            OutputBuffers::Float(b) => b.len(),
            OutputBuffers::Complex(b) => b.len(),
            OutputBuffers::Int16(b) => b.len(),
        }
    }

    /// Items every channel can hold
    pub fn capacity(&self) -> usize {
        fn min_len<T>(bufs: &[&mut [T]]) -> usize {
            bufs.iter().map(|b| b.len()).min().unwrap_or(0)
        }
        match self {
            OutputBuffers::Float(b) => min_len(b),
            OutputBuffers::Complex(b) => min_len(b),
            OutputBuffers::Int16(b) => min_len(b),
        }
    }

    /// Verify the buffers fit the layout.
    pub fn check(&self, layout: OutputLayout) -> Result<()> {
        if self.sample_type() != layout.sample_type() || self.channels() != layout.channels() {
            return Err(Error::InvalidConfiguration(format!(
                "{:?} needs {} {} buffer(s), got {} {}",
                layout,
                layout.channels(),
                layout.sample_type(),
                self.channels(),
                self.sample_type()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_selection() {
        assert_eq!(OutputLayout::new(SampleType::Float, 1).unwrap(), OutputLayout::Float1);
        assert_eq!(OutputLayout::new(SampleType::Float, 2).unwrap(), OutputLayout::Float2);
        assert_eq!(OutputLayout::new(SampleType::Complex, 1).unwrap(), OutputLayout::Complex1);
        assert_eq!(
            OutputLayout::new(SampleType::Int16, 1).unwrap(),
            OutputLayout::Int16Interleaved
        );
        assert_eq!(OutputLayout::new(SampleType::Int16, 2).unwrap(), OutputLayout::Int16Stereo);
    }

    #[test]
    fn test_complex_requires_one_channel() {
        assert!(matches!(
            OutputLayout::new(SampleType::Complex, 2),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(OutputLayout::new(SampleType::Float, 0).is_err());
        assert!(OutputLayout::new(SampleType::Int16, 3).is_err());
    }

    #[test]
    fn test_items_per_frame() {
        assert_eq!(OutputLayout::Int16Interleaved.items_per_frame(2), 2);
        assert_eq!(OutputLayout::Int16Interleaved.items_per_frame(1), 1);
        assert_eq!(OutputLayout::Float1.items_per_frame(2), 1);
        assert_eq!(OutputLayout::Complex1.items_per_frame(2), 1);
    }

    #[test]
    fn test_buffer_check() {
        let mut left = [0.0f32; 8];
        let mut right = [0.0f32; 4];
        let mut bufs: [&mut [f32]; 2] = [&mut left, &mut right];
        let out = OutputBuffers::Float(&mut bufs);
        assert_eq!(out.capacity(), 4);
        assert!(out.check(OutputLayout::Float2).is_ok());
        assert!(out.check(OutputLayout::Float1).is_err());
        assert!(out.check(OutputLayout::Int16Stereo).is_err());
    }

    #[test]
    fn test_sample_type_parse() {
        assert_eq!("float".parse::<SampleType>().unwrap(), SampleType::Float);
        assert_eq!("IQ".parse::<SampleType>().unwrap(), SampleType::Complex);
        assert_eq!("short".parse::<SampleType>().unwrap(), SampleType::Int16);
        assert!("double".parse::<SampleType>().is_err());
    }
}

//! 16-bit PCM payload conversion into the output layouts.
//!
//! Samples arrive as signed 16-bit big-endian words, interleaved by input
//! channel, whatever the payload type.
//! Float outputs divide by 32767, so `i16::MIN` maps slightly below -1.0.

use std::ops::Range;

use super::{Complex32, OutputBuffers, OutputLayout};

/// Full-scale divisor for 16-bit samples
pub const FULL_SCALE16: f32 = 32767.0;

#[inline]
fn to_float(s: i16) -> f32 {
    s as f32 / FULL_SCALE16
}

fn samples(payload: &[u8]) -> impl Iterator<Item = i16> + '_ {
    payload.chunks_exact(2).map(|c| i16::from_be_bytes([c[0], c[1]]))
}

fn pairs(payload: &[u8]) -> impl Iterator<Item = (i16, i16)> + '_ {
    payload
        .chunks_exact(4)
        .map(|c| (i16::from_be_bytes([c[0], c[1]]), i16::from_be_bytes([c[2], c[3]])))
}

/// Converts payloads for one fixed output layout.
#[derive(Debug, Clone, Copy)]
pub struct PcmDecoder {
    layout: OutputLayout,
}

impl PcmDecoder {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    /// Sample frames carried by a payload (what the RTP timestamp advances by).
    pub fn frames_in(payload_len: usize, input_channels: u8) -> usize {
        match input_channels {
            1 | 2 => payload_len / (2 * input_channels as usize),
            _ => 0,
        }
    }

    /// Output items a payload decodes to in this layout.
    pub fn items_in(&self, payload_len: usize, input_channels: u8) -> usize {
        Self::frames_in(payload_len, input_channels) * self.layout.items_per_frame(input_channels)
    }

    /// Decode into `range` of every output channel. Items beyond the payload
    /// are left untouched. Returns items written per channel.
    ///
    /// Input channel counts other than 1 and 2 produce nothing. The buffers
    /// must already have passed [`OutputBuffers::check`] for this layout.
    pub fn decode(
        &self,
        payload: &[u8],
        input_channels: u8,
        out: &mut OutputBuffers<'_, '_>,
        range: Range<usize>,
    ) -> usize {
        if !(1..=2).contains(&input_channels) {
            return 0;
        }
        let n = range.len().min(self.items_in(payload.len(), input_channels));
        let range = range.start..range.start + n;

        match (self.layout, out) {
            (OutputLayout::Float1, OutputBuffers::Float(bufs)) => {
                let dst = &mut bufs[0][range];
                if input_channels == 1 {
                    for (d, s) in dst.iter_mut().zip(samples(payload)) {
                        *d = to_float(s);
                    }
                } else {
                    // Downmix to mono
                    for (d, (l, r)) in dst.iter_mut().zip(pairs(payload)) {
                        *d = (to_float(l) + to_float(r)) / 2.0;
                    }
                }
            }
            (OutputLayout::Float2, OutputBuffers::Float(bufs)) => {
                let (left, right) = bufs.split_at_mut(1);
                let dst_l = &mut left[0][range.clone()];
                let dst_r = &mut right[0][range];
                if input_channels == 1 {
                    // Expand to pseudo-stereo
                    for ((dl, dr), s) in dst_l.iter_mut().zip(dst_r.iter_mut()).zip(samples(payload)) {
                        let f = to_float(s);
                        *dl = f;
                        *dr = f;
                    }
                } else {
                    for ((dl, dr), (l, r)) in dst_l.iter_mut().zip(dst_r.iter_mut()).zip(pairs(payload)) {
                        *dl = to_float(l);
                        *dr = to_float(r);
                    }
                }
            }
            (OutputLayout::Complex1, OutputBuffers::Complex(bufs)) => {
                let dst = &mut bufs[0][range];
                if input_channels == 1 {
                    for (d, s) in dst.iter_mut().zip(samples(payload)) {
                        *d = Complex32::new(to_float(s), 0.0);
                    }
                } else {
                    for (d, (i, q)) in dst.iter_mut().zip(pairs(payload)) {
                        *d = Complex32::new(to_float(i), to_float(q));
                    }
                }
            }
            (OutputLayout::Int16Interleaved, OutputBuffers::Int16(bufs)) => {
                // Mono passes through; stereo (raw I/Q) stays interleaved
                for (d, s) in bufs[0][range].iter_mut().zip(samples(payload)) {
                    *d = s;
                }
            }
            (OutputLayout::Int16Stereo, OutputBuffers::Int16(bufs)) => {
                let (left, right) = bufs.split_at_mut(1);
                let dst_l = &mut left[0][range.clone()];
                let dst_r = &mut right[0][range];
                if input_channels == 1 {
                    for ((dl, dr), s) in dst_l.iter_mut().zip(dst_r.iter_mut()).zip(samples(payload)) {
                        *dl = s;
                        *dr = s;
                    }
                } else {
                    for ((dl, dr), (l, r)) in dst_l.iter_mut().zip(dst_r.iter_mut()).zip(pairs(payload)) {
                        *dl = l;
                        *dr = r;
                    }
                }
            }
            _ => return 0,
        }

        n
    }

    /// Write silence into `range` of every output channel.
    pub fn zero_fill(&self, out: &mut OutputBuffers<'_, '_>, range: Range<usize>) -> usize {
        let n = range.len();
        match out {
            OutputBuffers::Float(bufs) => bufs.iter_mut().for_each(|b| b[range.clone()].fill(0.0)),
            OutputBuffers::Complex(bufs) => bufs
                .iter_mut()
                .for_each(|b| b[range.clone()].fill(Complex32::new(0.0, 0.0))),
            OutputBuffers::Int16(bufs) => bufs.iter_mut().for_each(|b| b[range.clone()].fill(0)),
        }
        n
    }
}

//! In-place conversion of chunk bytes to the playback-native layout.
//!
//! A chunk converts every whole unit that lies inside it. A unit that
//! straddles the boundary with a neighbouring chunk is assembled from both
//! chunks' saved raw bytes once both are loaded, and each side's bytes are
//! written exactly once, guarded by that chunk's boundary flag.

use core::ops::Range;
use sostenuto_core::{ChunkLayout, RawDataFormat};

/// Bytes swapped between servicing calls for the three-byte layout.
pub(crate) const SWAP_QUANTUM_BYTES: usize = 1024;

/// Words converted between servicing calls for word layouts.
pub(crate) const WORD_QUANTUM: usize = 256;

/// Raw bytes kept from each end of a chunk for boundary reassembly.
pub(crate) const RAW_EDGE_BYTES: usize = 3;

#[derive(Debug, Clone, Default)]
pub(crate) struct ConversionState {
    pub(crate) converted: bool,
    pub(crate) head_converted: bool,
    pub(crate) tail_converted: bool,
    raw_head: [u8; RAW_EDGE_BYTES],
    raw_tail: [u8; RAW_EDGE_BYTES],
}

impl ConversionState {
    /// Save the raw edges of freshly loaded data.
    pub(crate) fn capture_raw(&mut self, data: &[u8]) {
        let n = data.len();
        self.raw_head.copy_from_slice(&data[..RAW_EDGE_BYTES]);
        self.raw_tail.copy_from_slice(&data[n - RAW_EDGE_BYTES..]);
    }

    pub(crate) fn mark_complete(&mut self) {
        self.converted = true;
        self.head_converted = true;
        self.tail_converted = true;
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.converted && self.head_converted && self.tail_converted
    }
}

/// Split of one unit across a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Straddle {
    /// Bytes at the end of the lower chunk
    pub(crate) lower: usize,
    /// Bytes at the start of the upper chunk
    pub(crate) upper: usize,
}

impl Straddle {
    fn width(&self) -> usize {
        self.lower + self.upper
    }
}

/// Where the audio data falls within one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkGeometry {
    /// Whole units inside the chunk, relative to its start
    pub(crate) whole: Range<usize>,
    /// Unit straddling the chunk's start
    pub(crate) head: Option<Straddle>,
    /// Unit straddling the chunk's end
    pub(crate) tail: Option<Straddle>,
}

impl ChunkGeometry {
    /// Geometry of chunk `index`, or `None` if it holds none of the audio data.
    ///
    /// Units are aligned to `data_start`. The data is cut to a whole number of
    /// samples, so the last unit may be short; a trailing partial sample stays
    /// raw.
    pub(crate) fn for_chunk(
        index: usize,
        layout: ChunkLayout,
        data_start: u64,
        data_len: u64,
        format: RawDataFormat,
    ) -> Option<Self> {
        let w = format.unit_width() as u64;
        let sample = format.sample_width() as u64;
        let chunk_start = layout.chunk_start(index);
        let chunk_end = chunk_start + layout.size() as u64;
        let data_end = data_start + data_len / sample * sample;

        if chunk_end <= data_start || chunk_start >= data_end {
            return None;
        }

        let (first, head) = if chunk_start <= data_start {
            (data_start, None)
        } else {
            let lower = (chunk_start - data_start) % w;
            if lower == 0 {
                (chunk_start, None)
            } else {
                let unit_end = (chunk_start - lower + w).min(data_end);
                let straddle = Straddle {
                    lower: lower as usize,
                    upper: (unit_end - chunk_start) as usize,
                };
                (unit_end, Some(straddle))
            }
        };

        let limit = chunk_end.min(data_end);
        let units = limit.saturating_sub(first) / w;
        let mut last = first + units * w;
        if limit == data_end && last < data_end {
            last = data_end;
        }

        let tail = if last < chunk_end && data_end > chunk_end {
            Some(Straddle {
                lower: (chunk_end - last) as usize,
                upper: ((last + w).min(data_end) - chunk_end) as usize,
            })
        } else {
            None
        };

        let base = chunk_start;
        Some(Self {
            whole: (first - base) as usize..(last - base) as usize,
            head,
            tail,
        })
    }
}

/// Bytes converted between servicing calls.
///
/// Always a whole number of units.
pub(crate) fn quantum_bytes(format: RawDataFormat) -> usize {
    let unit = format.unit_width();
    if unit == 3 {
        SWAP_QUANTUM_BYTES / 3 * 3
    } else {
        WORD_QUANTUM * unit
    }
}

/// Convert the units in `data`, returning how many were converted.
///
/// `data` starts on a unit boundary; only its last unit may be short.
pub(crate) fn convert_units(data: &mut [u8], format: RawDataFormat) -> usize {
    let mut units = 0;
    for u in data.chunks_mut(format.unit_width()) {
        format.convert_unit(u);
        units += 1;
    }
    units
}

/// Convert the unit spanning `lower`'s end and `upper`'s start.
///
/// Both sides must be loaded. Each side is written only if its own flag is unset.
pub(crate) fn complete_boundary(
    format: RawDataFormat,
    straddle: Straddle,
    lower_state: &mut ConversionState,
    lower_data: &mut [u8],
    upper_state: &mut ConversionState,
    upper_data: &mut [u8],
) {
    if lower_state.tail_converted && upper_state.head_converted {
        return;
    }

    let w = straddle.width();
    let mut unit = [0u8; 4];
    unit[..straddle.lower]
        .copy_from_slice(&lower_state.raw_tail[RAW_EDGE_BYTES - straddle.lower..]);
    unit[straddle.lower..w].copy_from_slice(&upper_state.raw_head[..straddle.upper]);
    format.convert_unit(&mut unit[..w]);

    if !lower_state.tail_converted {
        let n = lower_data.len();
        lower_data[n - straddle.lower..].copy_from_slice(&unit[..straddle.lower]);
        lower_state.tail_converted = true;
    }
    if !upper_state.head_converted {
        upper_data[..straddle.upper].copy_from_slice(&unit[straddle.lower..w]);
        upper_state.head_converted = true;
    }
}

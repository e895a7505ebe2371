//! On-disk sample data layouts.

use serde::{Deserialize, Serialize};

/// Byte layout of a sample's audio data as stored on disk.
///
/// Anything other than [`RawDataFormat::Native`] must be converted in place
/// before playback reads it. Native means little-endian signed PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RawDataFormat {
    #[default]
    Native,
    /// Big-endian 16-bit
    EndiannessWrong16,
    /// Big-endian 24-bit, the one odd-width layout
    EndiannessWrong24,
    /// Big-endian 32-bit
    EndiannessWrong32,
    /// Unsigned 8-bit
    Unsigned8,
    /// 32-bit IEEE float, converted to Q31
    Float,
}

impl RawDataFormat {
    #[inline]
    pub fn needs_conversion(self) -> bool {
        !matches!(self, Self::Native)
    }

    /// Width in bytes of the unit the conversion operates on.
    ///
    /// Three for the odd-width layout, otherwise one machine word.
    #[inline]
    pub fn unit_width(self) -> usize {
        match self {
            Self::EndiannessWrong24 => 3,
            _ => 4,
        }
    }

    /// Width in bytes of one sample in this layout.
    ///
    /// The audio data is only ever converted in whole samples, so a unit cut
    /// short by the end of the data still converts every sample it holds.
    #[inline]
    pub fn sample_width(self) -> usize {
        match self {
            Self::Native | Self::Unsigned8 => 1,
            Self::EndiannessWrong16 => 2,
            Self::EndiannessWrong24 => 3,
            Self::EndiannessWrong32 | Self::Float => 4,
        }
    }

    /// Convert one unit in place.
    ///
    /// `unit` is at most [`unit_width`](Self::unit_width) bytes and a whole
    /// number of samples; a short unit only occurs at the end of the data.
    pub fn convert_unit(self, unit: &mut [u8]) {
        debug_assert!(unit.len() <= self.unit_width());
        debug_assert_eq!(unit.len() % self.sample_width(), 0);
        match self {
            Self::Native => {}
            Self::EndiannessWrong16 => unit.chunks_exact_mut(2).for_each(|s| s.swap(0, 1)),
            Self::EndiannessWrong24 => unit.swap(0, 2),
            Self::EndiannessWrong32 => unit.reverse(),
            Self::Unsigned8 => unit.iter_mut().for_each(|b| *b ^= 0x80),
            Self::Float => {
                if let Ok(bytes) = <[u8; 4]>::try_from(&*unit) {
                    let q31 = q31_from_f32(f32::from_le_bytes(bytes));
                    unit.copy_from_slice(&q31.to_le_bytes());
                }
            }
        }
    }

    /// Convert one machine word in place.
    #[inline]
    pub fn convert_word(self, word: &mut [u8; 4]) {
        if self.unit_width() == 4 {
            self.convert_unit(word);
        }
    }
}

/// Saturating float to Q31.
#[inline]
fn q31_from_f32(value: f32) -> i32 {
    // `as` saturates at the i32 bounds and maps NaN to zero
    (value * 2_147_483_648.0) as i32
}

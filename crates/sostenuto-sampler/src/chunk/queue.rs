//! Stealable queue tiers.

/// Priority tier a chunk waits in while nothing holds a reason on it.
///
/// Steal victims are taken from the lowest tier first, least recently
/// released first within a tier. Chunks of samples no longer used by the
/// current song go before anything the song still needs. Raw sample data
/// in a non-native layout sits one tier above the same data in native
/// layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StealableQueue {
    NoSongSampleData = 0,
    NoSongSampleDataConverted = 1,
    NoSongRepitchedCache = 2,
    NoSongPercCache = 3,
    CurrentSongPercCache = 4,
    CurrentSongRepitchedCache = 5,
    CurrentSongSampleData = 6,
    CurrentSongSampleDataConverted = 7,
}

impl StealableQueue {
    pub const COUNT: usize = 8;

    /// Every tier, in steal order.
    pub const ALL: [StealableQueue; Self::COUNT] = [
        Self::NoSongSampleData,
        Self::NoSongSampleDataConverted,
        Self::NoSongRepitchedCache,
        Self::NoSongPercCache,
        Self::CurrentSongPercCache,
        Self::CurrentSongRepitchedCache,
        Self::CurrentSongSampleData,
        Self::CurrentSongSampleDataConverted,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Raw sample data tier for the given liveness and layout.
    pub fn for_sample_data(live: bool, needs_conversion: bool) -> Self {
        let base = if live {
            Self::CurrentSongSampleData
        } else {
            Self::NoSongSampleData
        };
        if needs_conversion {
            base.next_tier()
        } else {
            base
        }
    }

    pub fn for_repitched_cache(live: bool) -> Self {
        if live {
            Self::CurrentSongRepitchedCache
        } else {
            Self::NoSongRepitchedCache
        }
    }

    pub fn for_perc_cache(live: bool) -> Self {
        if live {
            Self::CurrentSongPercCache
        } else {
            Self::NoSongPercCache
        }
    }

    /// The adjacent tier above this one. The top tier maps to itself.
    pub fn next_tier(self) -> Self {
        Self::ALL
            .get(self.index() + 1)
            .copied()
            .unwrap_or(self)
    }
}

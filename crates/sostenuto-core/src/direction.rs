//! Playback direction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlayDirection {
    #[default]
    Forward,
    Reverse,
}

impl PlayDirection {
    pub fn from_reversed(reversed: bool) -> Self {
        if reversed {
            Self::Reverse
        } else {
            Self::Forward
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward)
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Self::Reverse)
    }

    /// Chunk index step: +1 forward, -1 reverse.
    #[inline]
    pub fn step(&self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction() {
        assert!(PlayDirection::default().is_forward());
        assert!(PlayDirection::from_reversed(true).is_reverse());
        assert_eq!(PlayDirection::Forward.step(), 1);
        assert_eq!(PlayDirection::Reverse.step(), -1);
    }
}

//! Fatal invariant reporting.
//!
//! Invariant violations are logic errors, never runtime conditions. Debug
//! builds (and release builds with the `beta-checks` feature) freeze with the
//! diagnostic code; production builds log the code and carry on.

use core::fmt;

/// Diagnostic code for a violated invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantCode {
    /// A queued chunk was chosen as a steal victim without an owner
    StolenWithoutOwner,
    /// A chunk reason was released more often than it was taken
    ChunkReasonUnderflow,
    /// A load reason was released more often than it was taken
    LoadReasonUnderflow,
    /// A recorder hold was released more often than it was taken
    RecorderHoldUnderflow,
    /// A sample reason was released more often than it was taken
    SampleReasonUnderflow,
    /// A chunk was bound to an owner while already bound
    ChunkAlreadyBound,
    /// An owner table slot was already occupied by another chunk
    ChunkTableSlotOccupied,
    /// An owner table slot did not hold the chunk being stolen
    ChunkTableMismatch,
}

impl InvariantCode {
    /// Short code shown on a frozen device.
    pub fn code(self) -> &'static str {
        match self {
            Self::StolenWithoutOwner => "E181",
            Self::ChunkReasonUnderflow => "E123",
            Self::LoadReasonUnderflow => "E124",
            Self::RecorderHoldUnderflow => "E125",
            Self::SampleReasonUnderflow => "E219",
            Self::ChunkAlreadyBound => "E186",
            Self::ChunkTableSlotOccupied => "E187",
            Self::ChunkTableMismatch => "E188",
        }
    }
}

impl fmt::Display for InvariantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.code(), self)
    }
}

/// Report a violated invariant.
#[track_caller]
pub fn freeze_with_error(code: InvariantCode) {
    if cfg!(any(debug_assertions, feature = "beta-checks")) {
        panic!("freeze with error {code}");
    }
    tracing::error!(code = code.code(), "invariant violated: {:?}", code);
}

//! Error types.

use thiserror::Error;

use crate::chain::BlockId;

/// Failures of the retargeting engine.
///
/// Every variant is a broken precondition on the chain view: consensus
/// history always reaches back far enough once past a lookback height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RetargetError {
    /// The view does not know the block it was asked about.
    #[error("unknown block {0:?}")]
    UnknownBlock(BlockId),
    /// An ancestor needed for a lookback window is missing.
    #[error("block at height {from} has no ancestor at height {height}")]
    MissingAncestor { from: u32, height: i64 },
    /// The epoch schedule has no rows.
    #[error("no retarget epoch covers height {0}")]
    NoEpoch(u32),
}

/// Reasons a candidate header is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header claims bits {found:#010x}, expected {expected:#010x}")]
    BadDifficulty { expected: u32, found: u32 },
    #[error("header hash does not satisfy its claimed target")]
    HighHash,
    #[error(transparent)]
    Retarget(#[from] RetargetError),
}

/// Failures loading consensus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("pow limit must be 32 bytes, got {0}")]
    PowLimitLength(usize),
    /// Spacing not positive, or longer than the classic timespan.
    #[error("target spacing {spacing}s must be positive and within the {timespan}s timespan")]
    Spacing { spacing: i64, timespan: i64 },
}

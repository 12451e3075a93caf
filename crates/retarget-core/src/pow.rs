//! Proof-of-work validation.

use log::debug;
use primitive_types::U256;

use crate::chain::{BlockId, ChainView};
use crate::compact::decode_compact;
use crate::error::HeaderError;
use crate::header::BlockHeader;
use crate::params::ConsensusParams;
use crate::retarget::Retargeter;

/// Check that `hash` meets the target encoded in `bits`.
///
/// The hash is read as a little-endian 256-bit integer (internal byte order).
/// Returns false for negative, overflowing, zero, or above-limit targets
/// without looking at the hash. A hash equal to the target passes.
pub fn check_proof_of_work(hash: &[u8; 32], bits: u32, params: &ConsensusParams) -> bool {
    let decoded = decode_compact(bits);

    if !decoded.is_valid() || decoded.target > params.pow_limit {
        return false;
    }

    U256::from_little_endian(hash) <= decoded.target
}

impl Retargeter<'_> {
    /// Validate a candidate header on top of `last`.
    ///
    /// The claimed bits must equal the required next target and the header
    /// hash must satisfy them. Returns the bits to persist for the block.
    pub fn check_header<C: ChainView + ?Sized>(
        &self,
        chain: &C,
        last: Option<BlockId>,
        header: &BlockHeader,
    ) -> Result<u32, HeaderError> {
        let expected = self.next_work_required(chain, last, i64::from(header.time))?;
        if header.bits != expected {
            debug!(
                "rejecting header: bits {:08x}, required {:08x}",
                header.bits, expected
            );
            return Err(HeaderError::BadDifficulty {
                expected,
                found: header.bits,
            });
        }

        if !check_proof_of_work(&header.hash(), header.bits, self.params()) {
            debug!("rejecting header: hash above target {:08x}", header.bits);
            return Err(HeaderError::HighHash);
        }

        Ok(expected)
    }
}

//! Compact "bits" target encoding and difficulty utilities.
//!
//! The bits format is: [exponent (1 byte)][mantissa (3 bytes)]
//! Target = mantissa * 256^(exponent - 3), where the top bit of the mantissa
//! is a sign flag that valid targets never carry.

use primitive_types::U256;

/// Sign flag inside the 24-bit mantissa.
pub const SIGN_BIT: u32 = 0x0080_0000;

/// Mantissa bits that carry magnitude.
pub const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Compact target of difficulty 1.
pub const DIFFICULTY_ONE_BITS: u32 = 0x1d00_ffff;

/// Result of expanding a compact target.
///
/// Decoding never fails outright: a negative or overflowing encoding is
/// reported through the flags and it is up to the caller to reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTarget {
    /// Expanded magnitude. Bits shifted past 256 are lost.
    pub target: U256,
    /// The sign bit was set on a non-zero mantissa.
    pub negative: bool,
    /// The magnitude does not fit in 256 bits.
    pub overflow: bool,
}

impl DecodedTarget {
    /// True when the target is usable as a proof-of-work threshold.
    pub fn is_valid(&self) -> bool {
        !self.negative && !self.overflow && !self.target.is_zero()
    }
}

/// Expand a compact "bits" value into its 256-bit magnitude and flags.
pub fn decode_compact(bits: u32) -> DecodedTarget {
    let size = bits >> 24;
    let mut word = bits & MANTISSA_MASK;

    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        U256::from(word)
    } else {
        let shift = 8 * (size - 3) as usize;
        if shift >= 256 {
            U256::zero()
        } else {
            U256::from(word) << shift
        }
    };

    let negative = word != 0 && (bits & SIGN_BIT) != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

    DecodedTarget {
        target,
        negative,
        overflow,
    }
}

/// Pack a 256-bit magnitude into compact form.
///
/// Picks the smallest exponent that holds the value. When the mantissa would
/// carry the sign bit it is shifted down one byte and the exponent bumped.
pub fn encode_compact(target: U256) -> u32 {
    let mut size = (target.bits() + 7) / 8;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3))).low_u32()
    };

    if compact & SIGN_BIT != 0 {
        compact >>= 8;
        size += 1;
    }

    compact | ((size as u32) << 24)
}

/// Expanded magnitude of `bits`, ignoring the sign and overflow flags.
#[inline]
pub fn bits_to_target(bits: u32) -> U256 {
    decode_compact(bits).target
}

/// Big-endian 32-byte representation of a target.
pub fn target_to_bytes(target: &U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    target.to_big_endian(&mut bytes);
    bytes
}

/// Lower-case hex of a target, 64 digits, most significant first.
pub fn target_to_hex(target: &U256) -> alloc::string::String {
    hex::encode(target_to_bytes(target))
}

/// Expected number of hashes needed to meet `bits`: `2^256 / (target + 1)`.
///
/// Returns zero for encodings a block could never carry.
pub fn block_work(bits: u32) -> U256 {
    let decoded = decode_compact(bits);
    if !decoded.is_valid() {
        return U256::zero();
    }
    // 2^256 does not fit, so use (2^256 - target - 1) / (target + 1) + 1.
    let target = decoded.target;
    (!target / (target + U256::one())) + U256::one()
}

/// Calculate approximate difficulty from bits.
///
/// Difficulty = difficulty-one target / current target.
pub fn bits_to_difficulty(bits: u32) -> f64 {
    let current = target_to_f64(&bits_to_target(bits));
    let one = target_to_f64(&bits_to_target(DIFFICULTY_ONE_BITS));

    if current == 0.0 {
        return f64::INFINITY;
    }

    one / current
}

/// Convert a 256-bit target to an approximate f64 value.
fn target_to_f64(target: &U256) -> f64 {
    const WORD: f64 = 18_446_744_073_709_551_616.0;

    target
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, word| acc * WORD + *word as f64)
}

/// Format difficulty for display (e.g., "5.25K").
pub fn format_difficulty(difficulty: f64) -> alloc::string::String {
    const SCALES: [(f64, &str); 5] = [(1e15, "P"), (1e12, "T"), (1e9, "G"), (1e6, "M"), (1e3, "K")];

    for (scale, suffix) in SCALES {
        if difficulty >= scale {
            return alloc::format!("{:.2}{}", difficulty / scale, suffix);
        }
    }
    alloc::format!("{:.2}", difficulty)
}

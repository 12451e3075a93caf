//! Network selection and consensus parameters.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::compact::encode_compact;
use crate::error::ParamsError;

/// Network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Production network
    #[default]
    Mainnet,
    /// Public test network, min-difficulty blocks allowed
    Testnet,
    /// Local regression testing, retargeting disabled
    Regtest,
}

impl Network {
    /// Consensus parameters for this network.
    pub fn params(&self) -> ConsensusParams {
        match self {
            Network::Mainnet => ConsensusParams {
                pow_limit: U256::MAX >> 32,
                target_spacing: TARGET_SPACING,
                target_timespan: TARGET_TIMESPAN,
                allow_min_difficulty_blocks: false,
                no_retargeting: false,
            },
            Network::Testnet => ConsensusParams {
                allow_min_difficulty_blocks: true,
                ..Network::Mainnet.params()
            },
            Network::Regtest => ConsensusParams {
                pow_limit: U256::MAX >> 1,
                target_spacing: TARGET_SPACING,
                target_timespan: TARGET_TIMESPAN,
                allow_min_difficulty_blocks: true,
                no_retargeting: true,
            },
        }
    }

    /// Parse network from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Two minutes between blocks.
pub const TARGET_SPACING: i64 = 120;

/// One hour of blocks per classic retarget window.
pub const TARGET_TIMESPAN: i64 = 60 * 60;

/// Immutable per-network consensus constants used by retargeting and
/// proof-of-work checks.
///
/// Deserialized documents are checked with [`ConsensusParams::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParams")]
pub struct ConsensusParams {
    /// Easiest allowed target.
    #[serde(with = "hex_u256")]
    pub pow_limit: U256,
    /// Nominal seconds between blocks.
    pub target_spacing: i64,
    /// Nominal seconds covered by one classic retarget window.
    pub target_timespan: i64,
    /// Permit a pow-limit block when the chain stalls (test networks).
    pub allow_min_difficulty_blocks: bool,
    /// Keep the previous target at every classic retarget.
    pub no_retargeting: bool,
}

impl ConsensusParams {
    /// Check that spacing and timespan describe at least one block per
    /// classic window.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.target_spacing <= 0 || self.target_timespan < self.target_spacing {
            return Err(ParamsError::Spacing {
                spacing: self.target_spacing,
                timespan: self.target_timespan,
            });
        }
        Ok(())
    }

    /// Blocks between classic retargets.
    pub fn difficulty_adjustment_interval(&self) -> i64 {
        self.target_timespan / self.target_spacing.max(1)
    }

    /// `pow_limit` in compact form.
    pub fn pow_limit_bits(&self) -> u32 {
        encode_compact(self.pow_limit)
    }
}

/// Wire shape of [`ConsensusParams`] before validation.
#[derive(Deserialize)]
struct RawParams {
    #[serde(with = "hex_u256")]
    pow_limit: U256,
    target_spacing: i64,
    target_timespan: i64,
    allow_min_difficulty_blocks: bool,
    no_retargeting: bool,
}

impl TryFrom<RawParams> for ConsensusParams {
    type Error = ParamsError;

    fn try_from(raw: RawParams) -> Result<Self, Self::Error> {
        let params = ConsensusParams {
            pow_limit: raw.pow_limit,
            target_spacing: raw.target_spacing,
            target_timespan: raw.target_timespan,
            allow_min_difficulty_blocks: raw.allow_min_difficulty_blocks,
            no_retargeting: raw.no_retargeting,
        };
        params.validate()?;
        Ok(params)
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Network::default().params()
    }
}

/// Serde adapter writing a `U256` as 64 big-endian hex digits.
mod hex_u256 {
    use alloc::string::String;

    use primitive_types::U256;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::compact::target_to_hex;
    use crate::error::ParamsError;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&target_to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let text = String::deserialize(deserializer)?;
        let text = text.strip_prefix("0x").unwrap_or(&text);
        let bytes = hex::decode(text).map_err(D::Error::custom)?;
        if bytes.len() != 32 {
            return Err(D::Error::custom(ParamsError::PowLimitLength(
                bytes.len(),
            )));
        }
        Ok(U256::from_big_endian(&bytes))
    }
}

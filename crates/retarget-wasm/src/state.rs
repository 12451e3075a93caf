//! Plain data handed to JavaScript.

use retarget_core::compact::{
    bits_to_difficulty, block_work, decode_compact, format_difficulty, target_to_hex,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// A compact target, decoded for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInfo {
    /// The compact encoding.
    pub bits: u32,
    /// Expanded target, 64 hex digits, most significant first.
    pub target: String,
    /// Sign bit set on a non-zero mantissa.
    pub negative: bool,
    /// Magnitude exceeds 256 bits.
    pub overflow: bool,
    /// Whether a block could carry these bits.
    pub valid: bool,
    /// Difficulty relative to `0x1d00ffff`.
    pub difficulty: f64,
    /// Formatted difficulty string.
    pub difficulty_display: String,
    /// Expected hashes to meet the target, hex.
    pub work: String,
}

impl TargetInfo {
    pub fn from_bits(bits: u32) -> Self {
        let decoded = decode_compact(bits);
        let difficulty = bits_to_difficulty(bits);

        TargetInfo {
            bits,
            target: target_to_hex(&decoded.target),
            negative: decoded.negative,
            overflow: decoded.overflow,
            valid: decoded.is_valid(),
            difficulty,
            difficulty_display: format_difficulty(difficulty),
            work: target_to_hex(&block_work(bits)),
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
    }
}

/// Summary of a session's chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainStats {
    /// Network name, or "custom" for JSON parameters.
    pub network: String,
    /// Number of blocks held.
    pub blocks: u32,
    /// Height of the tip.
    pub tip_height: Option<u32>,
    /// Timestamp of the tip.
    pub tip_time: Option<f64>,
    /// Compact target of the tip.
    pub tip_bits: Option<u32>,
    /// Epoch governing the block after the tip.
    pub epoch: Option<String>,
}

impl ChainStats {
    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
    }
}

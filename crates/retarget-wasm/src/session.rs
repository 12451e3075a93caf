//! Chain session exposed to JavaScript.

use log::{debug, info};
use retarget_core::header::{hash_from_display_hex, BLOCK_HEADER_SIZE};
use retarget_core::{
    check_proof_of_work, BlockHeader, ChainIndex, ConsensusParams, EpochSchedule, Network,
    Retargeter,
};
use wasm_bindgen::prelude::*;

use crate::state::{ChainStats, TargetInfo};

/// An in-memory chain plus the parameters it is judged by.
#[wasm_bindgen]
pub struct ChainSession {
    /// Network name, "custom" for JSON parameters.
    network: String,
    params: ConsensusParams,
    chain: ChainIndex,
}

#[wasm_bindgen]
impl ChainSession {
    /// Create a session with a built-in network's parameters.
    ///
    /// # Arguments
    /// * `network` - "mainnet", "testnet" or "regtest"
    #[wasm_bindgen(constructor)]
    pub fn new(network: &str) -> Result<ChainSession, JsValue> {
        let net = Network::from_str(network).ok_or_else(|| JsValue::from_str("Invalid network"))?;
        info!("new {} session", net);

        Ok(ChainSession {
            network: net.name().to_string(),
            params: net.params(),
            chain: ChainIndex::new(),
        })
    }

    /// Create a session from a JSON parameter document.
    #[wasm_bindgen]
    pub fn from_params_json(json: &str) -> Result<ChainSession, JsValue> {
        let params: ConsensusParams = serde_json::from_str(json)
            .map_err(|e| JsValue::from_str(&format!("Invalid params: {}", e)))?;
        info!("new custom session, pow limit {:08x}", params.pow_limit_bits());

        Ok(ChainSession {
            network: "custom".to_string(),
            params,
            chain: ChainIndex::new(),
        })
    }

    /// Append an accepted block without validating it.
    ///
    /// Returns the new block's height.
    #[wasm_bindgen]
    pub fn push_block(&mut self, time: u32, bits: u32) -> u32 {
        let id = self.chain.push(i64::from(time), bits);
        debug!("pushed block {:?} bits {:08x}", id, bits);
        self.chain.len() as u32 - 1
    }

    /// Validate an 80-byte serialized header against the tip and append it.
    ///
    /// Returns the new block's height.
    #[wasm_bindgen]
    pub fn push_header(&mut self, header_hex: &str) -> Result<u32, JsValue> {
        let bytes = hex::decode(header_hex).map_err(|_| JsValue::from_str("Invalid header hex"))?;
        let bytes: [u8; BLOCK_HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| JsValue::from_str("Header must be 80 bytes"))?;
        let header = BlockHeader::deserialize(&bytes);

        let bits = Retargeter::new(&self.params)
            .check_header(&self.chain, self.chain.tip(), &header)
            .map_err(|e| JsValue::from_str(&format!("Rejected header: {}", e)))?;

        Ok(self.push_block(header.time, bits))
    }

    /// Compact target the next block must meet.
    ///
    /// # Arguments
    /// * `candidate_time` - The candidate's timestamp (or 0 to use current time)
    #[wasm_bindgen]
    pub fn next_target(&self, candidate_time: u32) -> Result<u32, JsValue> {
        let time = if candidate_time > 0 {
            i64::from(candidate_time)
        } else {
            (js_sys::Date::now() / 1000.0) as i64
        };

        Retargeter::new(&self.params)
            .next_work_required(&self.chain, self.chain.tip(), time)
            .map_err(|e| JsValue::from_str(&format!("{}", e)))
    }

    /// Check a display-order hex hash against `bits`.
    #[wasm_bindgen]
    pub fn check_proof_of_work(&self, hash_hex: &str, bits: u32) -> Result<bool, JsValue> {
        let hash = hash_from_display_hex(hash_hex)
            .ok_or_else(|| JsValue::from_str("Hash must be 32 bytes of hex"))?;
        Ok(check_proof_of_work(&hash, bits, &self.params))
    }

    /// Decode compact bits into a `TargetInfo` object.
    #[wasm_bindgen]
    pub fn decode_bits(bits: u32) -> Result<JsValue, JsValue> {
        TargetInfo::from_bits(bits).to_js()
    }

    /// Name of the epoch governing the block after the tip.
    #[wasm_bindgen]
    pub fn epoch_name(&self) -> Option<String> {
        let height = self.chain.len().checked_sub(1)? as u32;
        EpochSchedule::historical()
            .epoch_at(height)
            .map(|epoch| epoch.name.to_string())
    }

    /// Get a summary of the chain.
    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.stats().to_js()
    }

    /// Drop all blocks, keeping the parameters.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.chain = ChainIndex::new();
    }

    /// Get the network name.
    #[wasm_bindgen(getter)]
    pub fn network(&self) -> String {
        self.network.clone()
    }

    /// Get the tip height, if any block was pushed.
    #[wasm_bindgen(getter)]
    pub fn height(&self) -> Option<u32> {
        self.chain.len().checked_sub(1).map(|h| h as u32)
    }

    /// Get the parameters as a JSON document.
    #[wasm_bindgen]
    pub fn params_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.params)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

impl ChainSession {
    /// The chain held by this session.
    pub fn chain(&self) -> &ChainIndex {
        &self.chain
    }

    pub fn stats(&self) -> ChainStats {
        let tip = self.chain.tip().and_then(|id| self.chain.get(id));

        ChainStats {
            network: self.network.clone(),
            blocks: self.chain.len() as u32,
            tip_height: tip.map(|block| block.height),
            tip_time: tip.map(|block| block.time as f64),
            tip_bits: tip.map(|block| block.bits),
            epoch: self.epoch_name(),
        }
    }
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

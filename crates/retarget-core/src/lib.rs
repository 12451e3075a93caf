//! Difficulty retargeting and proof-of-work validation.
//!
//! This crate provides pure Rust implementations of:
//! - Compact "bits" target encoding and decoding
//! - The historical epoch schedule of retarget rules
//! - Next-target computation over a read-only chain view
//! - Proof-of-work and header checks

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod chain;
pub mod compact;
pub mod epoch;
pub mod error;
pub mod header;
pub mod params;
pub mod pow;
pub mod retarget;

pub use chain::{BlockId, ChainBlock, ChainIndex, ChainView};
pub use compact::{bits_to_target, decode_compact, encode_compact, DecodedTarget};
pub use epoch::{Algorithm, Epoch, EpochSchedule};
pub use error::{HeaderError, ParamsError, RetargetError};
pub use header::BlockHeader;
pub use params::{ConsensusParams, Network};
pub use pow::check_proof_of_work;
pub use primitive_types::U256;
pub use retarget::Retargeter;

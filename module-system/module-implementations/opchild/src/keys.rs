//! Store layout. Every container of the module lives under one of these
//! single-byte prefixes.

use opchild_state::Prefix;

pub const NEXT_L2_SEQUENCE: u8 = 0x11;
pub const FINALIZED_L1_SEQUENCES: u8 = 0x12;
pub const BRIDGE_INFO: u8 = 0x13;
pub const PARAMS: u8 = 0x14;
pub const HOST_VALIDATORS: u8 = 0x15;
pub const HOST_HEIGHT: u8 = 0x16;
pub const LAST_VALIDATOR_POWERS: u8 = 0x21;
pub const VALIDATORS: u8 = 0x31;
pub const VALIDATORS_BY_CONS_ADDR: u8 = 0x41;
pub const RETIRED_CONSENSUS_KEYS: u8 = 0x42;
pub const HISTORICAL_INFOS: u8 = 0x51;
pub const DENOM_PAIRS: u8 = 0x61;
pub const WITHDRAWAL_COMMITMENTS: u8 = 0x71;

pub fn prefix(byte: u8) -> Prefix {
    Prefix::from(byte)
}

/// Store key of the withdrawal commitment for L2 sequence `sequence`:
/// `0x71 ‖ be64(sequence)`. L1 proves withdrawals against this exact layout.
pub fn withdrawal_commitment_key(sequence: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(WITHDRAWAL_COMMITMENTS);
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

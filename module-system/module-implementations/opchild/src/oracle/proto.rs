//! Wire types of the L1 consensus engine and of the oracle vote extension.

use std::collections::BTreeMap;

/// The bytes a validator signs for its vote extension, written
/// length-delimited.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CanonicalVoteExtension {
    #[prost(bytes = "vec", tag = "1")]
    pub extension: Vec<u8>,
    #[prost(sfixed64, tag = "2")]
    pub height: i64,
    #[prost(sfixed64, tag = "3")]
    pub round: i64,
    #[prost(string, tag = "4")]
    pub chain_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Validator {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    #[prost(int64, tag = "3")]
    pub power: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BlockIdFlag {
    Unknown = 0,
    Absent = 1,
    Commit = 2,
    Nil = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtendedVoteInfo {
    #[prost(message, optional, tag = "1")]
    pub validator: Option<Validator>,
    #[prost(bytes = "vec", tag = "3")]
    pub vote_extension: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub extension_signature: Vec<u8>,
    #[prost(enumeration = "BlockIdFlag", tag = "5")]
    pub block_id_flag: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtendedCommitInfo {
    #[prost(int32, tag = "1")]
    pub round: i32,
    #[prost(message, repeated, tag = "2")]
    pub votes: Vec<ExtendedVoteInfo>,
}

/// Prices reported by one validator, keyed by currency-pair id. Each price
/// is a big-endian unsigned integer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OracleVoteExtension {
    #[prost(btree_map = "uint64, bytes", tag = "1")]
    pub prices: BTreeMap<u64, Vec<u8>>,
}

/// Reads a big-endian price of at most 16 bytes.
pub fn decode_price(bytes: &[u8]) -> Option<u128> {
    if bytes.len() > 16 {
        return None;
    }
    Some(bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

/// Writes a price big-endian without leading zero bytes.
pub fn encode_price(price: u128) -> Vec<u8> {
    let bytes = price.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

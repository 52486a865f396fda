//! Block headers and the proof that an app hash belongs to one.

use borsh::{BorshDeserialize, BorshSerialize};
use prost::Message;
use serde::{Deserialize, Serialize};

use crate::merkle::{self, Hash, MerkleProof};
use crate::types::Timestamp;
use crate::OpChildError;

/// Number of leaves in the header tree.
pub const HEADER_FIELDS: usize = 14;
/// Position of `app_hash` among the header leaves.
pub const APP_HASH_INDEX: usize = 10;

mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Consensus {
        #[prost(uint64, tag = "1")]
        pub block: u64,
        #[prost(uint64, tag = "2")]
        pub app: u64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Timestamp {
        #[prost(int64, tag = "1")]
        pub seconds: i64,
        #[prost(int32, tag = "2")]
        pub nanos: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PartSetHeader {
        #[prost(uint32, tag = "1")]
        pub total: u32,
        #[prost(bytes = "vec", tag = "2")]
        pub hash: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BlockId {
        #[prost(bytes = "vec", tag = "1")]
        pub hash: Vec<u8>,
        #[prost(message, optional, tag = "2")]
        pub part_set_header: Option<PartSetHeader>,
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Version {
    pub block: u64,
    pub app: u64,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct PartSetHeader {
    pub total: u32,
    pub hash: Vec<u8>,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct BlockId {
    pub hash: Vec<u8>,
    pub part_set_header: PartSetHeader,
}

/// A consensus block header.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Header {
    pub version: Version,
    pub chain_id: String,
    pub height: i64,
    pub time: Timestamp,
    pub last_block_id: BlockId,
    pub last_commit_hash: Vec<u8>,
    pub data_hash: Vec<u8>,
    pub validators_hash: Vec<u8>,
    pub next_validators_hash: Vec<u8>,
    pub consensus_hash: Vec<u8>,
    pub app_hash: Vec<u8>,
    pub last_results_hash: Vec<u8>,
    pub evidence_hash: Vec<u8>,
    pub proposer_address: Vec<u8>,
}

/// Encodes a byte field the way the header hash expects: a `BytesValue`
/// wrapper, which is empty for empty input.
pub fn encode_bytes_leaf(bytes: &[u8]) -> Vec<u8> {
    bytes.to_vec().encode_to_vec()
}

impl Header {
    /// The encoded leaves, in hashing order.
    pub fn leaves(&self) -> [Vec<u8>; HEADER_FIELDS] {
        let version = proto::Consensus {
            block: self.version.block,
            app: self.version.app,
        };
        let time = proto::Timestamp {
            seconds: self.time.seconds,
            nanos: self.time.nanos as i32,
        };
        let last_block_id = proto::BlockId {
            hash: self.last_block_id.hash.clone(),
            part_set_header: Some(proto::PartSetHeader {
                total: self.last_block_id.part_set_header.total,
                hash: self.last_block_id.part_set_header.hash.clone(),
            }),
        };

        [
            version.encode_to_vec(),
            self.chain_id.clone().encode_to_vec(),
            self.height.encode_to_vec(),
            time.encode_to_vec(),
            last_block_id.encode_to_vec(),
            encode_bytes_leaf(&self.last_commit_hash),
            encode_bytes_leaf(&self.data_hash),
            encode_bytes_leaf(&self.validators_hash),
            encode_bytes_leaf(&self.next_validators_hash),
            encode_bytes_leaf(&self.consensus_hash),
            encode_bytes_leaf(&self.app_hash),
            encode_bytes_leaf(&self.last_results_hash),
            encode_bytes_leaf(&self.evidence_hash),
            encode_bytes_leaf(&self.proposer_address),
        ]
    }

    pub fn hash(&self) -> Hash {
        merkle::hash_from_byte_slices(&self.leaves())
    }

    /// Proof that `self.app_hash` is leaf 10 of the header tree.
    pub fn app_hash_proof(&self) -> MerkleProof {
        MerkleProof::new(&self.leaves(), APP_HASH_INDEX)
            .expect("the header tree always has an app hash leaf")
    }
}

/// Verifies that `app_hash` is committed to by the header whose hash is
/// `block_hash`.
pub fn verify_app_hash(
    block_hash: &Hash,
    app_hash: &[u8],
    proof: &MerkleProof,
) -> Result<(), OpChildError> {
    if proof.total != HEADER_FIELDS as u64 || proof.index != APP_HASH_INDEX as u64 {
        return Err(OpChildError::Codec(format!(
            "app hash proof must be for leaf {APP_HASH_INDEX} of {HEADER_FIELDS}"
        )));
    }
    proof.verify(block_hash, &encode_bytes_leaf(app_hash))
}

//! RFC-6962 binary Merkle tree over SHA-256, as used for block header hashes.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::OpChildError;

const LEAF_PREFIX: u8 = 0;
const INNER_PREFIX: u8 = 1;

pub type Hash = [u8; 32];

pub fn empty_hash() -> Hash {
    Sha256::digest(b"").into()
}

pub fn leaf_hash(leaf: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf);
    hasher.finalize().into()
}

pub fn inner_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([INNER_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Largest power of two strictly below `n`; `n` must be at least 2.
fn split_point(n: usize) -> usize {
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

pub fn hash_from_byte_slices<T: AsRef<[u8]>>(items: &[T]) -> Hash {
    match items.len() {
        0 => empty_hash(),
        1 => leaf_hash(items[0].as_ref()),
        n => {
            let k = split_point(n);
            inner_hash(
                &hash_from_byte_slices(&items[..k]),
                &hash_from_byte_slices(&items[k..]),
            )
        }
    }
}

/// Inclusion proof of one leaf. `aunts` runs from the leaf's sibling up to
/// the root's child.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct MerkleProof {
    pub total: u64,
    pub index: u64,
    pub leaf_hash: Hash,
    pub aunts: Vec<Hash>,
}

impl MerkleProof {
    /// Builds the proof of `items[index]`.
    pub fn new<T: AsRef<[u8]>>(items: &[T], index: usize) -> Option<Self> {
        if index >= items.len() {
            return None;
        }
        Some(Self {
            total: items.len() as u64,
            index: index as u64,
            leaf_hash: leaf_hash(items[index].as_ref()),
            aunts: aunts_of(items, index),
        })
    }

    pub fn compute_root_hash(&self) -> Option<Hash> {
        compute_from_aunts(self.index, self.total, self.leaf_hash, &self.aunts)
    }

    /// Checks that `leaf` sits at `self.index` under `root`.
    pub fn verify(&self, root: &Hash, leaf: &[u8]) -> Result<(), OpChildError> {
        if self.leaf_hash != leaf_hash(leaf) {
            return Err(OpChildError::Codec("merkle proof leaf hash mismatch".to_owned()));
        }
        match self.compute_root_hash() {
            Some(computed) if &computed == root => Ok(()),
            Some(_) => Err(OpChildError::Codec("merkle proof root mismatch".to_owned())),
            None => Err(OpChildError::Codec("malformed merkle proof".to_owned())),
        }
    }
}

fn aunts_of<T: AsRef<[u8]>>(items: &[T], index: usize) -> Vec<Hash> {
    if items.len() <= 1 {
        return Vec::new();
    }
    let k = split_point(items.len());
    let (mut aunts, sibling) = if index < k {
        (aunts_of(&items[..k], index), hash_from_byte_slices(&items[k..]))
    } else {
        (aunts_of(&items[k..], index - k), hash_from_byte_slices(&items[..k]))
    };
    aunts.push(sibling);
    aunts
}

fn compute_from_aunts(index: u64, total: u64, leaf: Hash, aunts: &[Hash]) -> Option<Hash> {
    if index >= total || total == 0 {
        return None;
    }
    if total == 1 {
        return aunts.is_empty().then_some(leaf);
    }
    let (last, rest) = aunts.split_last()?;
    let k = split_point(total as usize) as u64;
    if index < k {
        let left = compute_from_aunts(index, k, leaf, rest)?;
        Some(inner_hash(&left, last))
    } else {
        let right = compute_from_aunts(index - k, total - k, leaf, rest)?;
        Some(inner_hash(last, &right))
    }
}

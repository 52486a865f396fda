use std::fmt::Display;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::codec::{StateKeyCodec, StateValueCodec};
use crate::Prefix;

/// `Key` type for the [`Storage`].
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    BorshDeserialize,
    BorshSerialize,
)]
pub struct StorageKey {
    key: Arc<Vec<u8>>,
}

impl StorageKey {
    /// Creates a new StorageKey that combines a prefix and a key.
    pub fn new<K, KC>(prefix: &Prefix, key: &K, codec: &KC) -> Self
    where
        KC: StateKeyCodec<K>,
    {
        let encoded_key = codec.encode_key(key);
        let mut full_key = Vec::with_capacity(prefix.len() + encoded_key.len());
        full_key.extend_from_slice(prefix.as_bytes());
        full_key.extend_from_slice(&encoded_key);

        Self {
            key: Arc::new(full_key),
        }
    }

    /// Creates a StorageKey that consists of the prefix alone; used by
    /// single-value containers.
    pub fn singleton(prefix: &Prefix) -> Self {
        Self {
            key: Arc::new(prefix.as_bytes().to_vec()),
        }
    }

    /// Returns the full key bytes.
    pub fn key(&self) -> Arc<Vec<u8>> {
        self.key.clone()
    }

    /// Returns the key bytes that follow `prefix`, if the key starts with it.
    pub fn strip_prefix(&self, prefix: &Prefix) -> Option<&[u8]> {
        self.key.strip_prefix(prefix.as_bytes())
    }
}

impl From<Vec<u8>> for StorageKey {
    fn from(key: Vec<u8>) -> Self {
        Self { key: Arc::new(key) }
    }
}

impl AsRef<[u8]> for StorageKey {
    fn as_ref(&self) -> &[u8] {
        &self.key
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.key.as_ref()))
    }
}

/// A serialized value suitable for storing. Internally uses an [`Arc<Vec<u8>>`] for cheap cloning.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize, Default,
)]
pub struct StorageValue {
    value: Arc<Vec<u8>>,
}

impl StorageValue {
    /// Create a new storage value by serializing the input with the given codec.
    pub fn new<V, VC>(value: &V, codec: &VC) -> Self
    where
        VC: StateValueCodec<V>,
    {
        Self {
            value: Arc::new(codec.encode_value(value)),
        }
    }

    /// Get the bytes of this value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Convert this value into a [`Vec<u8>`].
    pub fn into_vec(self) -> Vec<u8> {
        Arc::try_unwrap(self.value).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl From<Vec<u8>> for StorageValue {
    fn from(value: Vec<u8>) -> Self {
        Self {
            value: Arc::new(value),
        }
    }
}

/// A membership or non-membership proof for a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof<P> {
    /// The key which is proven.
    pub key: StorageKey,
    /// The value, if any, which is proven.
    pub value: Option<StorageValue>,
    /// The cryptographic proof.
    pub proof: P,
}

/// Writes in ascending key order; `None` deletes the key.
pub type OrderedWrites = Vec<(StorageKey, Option<StorageValue>)>;

/// An interface for the versioned, authenticated key-value store owned by
/// the host.
pub trait Storage: Clone {
    /// The cryptographic proof type returned by [`Storage::get_with_proof`].
    type Proof: Clone;

    /// The state root.
    type Root: Copy + Eq + std::fmt::Debug;

    /// Returns the committed value stored under `key`.
    fn get(&self, key: &StorageKey) -> Option<StorageValue>;

    /// Returns every committed entry whose key starts with `prefix`, in
    /// ascending key order.
    fn iter_prefix(&self, prefix: &[u8]) -> Vec<(StorageKey, StorageValue)>;

    /// Returns the first committed entry whose key starts with `prefix` and
    /// is not below `from`.
    fn seek_prefix(&self, prefix: &[u8], from: &[u8]) -> Option<(StorageKey, StorageValue)>;

    /// Applies `writes` as a new version and returns the new root.
    fn commit(&self, writes: OrderedWrites) -> anyhow::Result<Self::Root>;

    /// Returns the root of the latest committed version.
    fn root(&self) -> anyhow::Result<Self::Root>;

    /// Returns the latest committed version number.
    fn version(&self) -> u64;

    /// Fetches `key` together with a proof of its presence or absence at the
    /// latest committed version.
    fn get_with_proof(&self, key: StorageKey) -> anyhow::Result<StorageProof<Self::Proof>>;

    /// Verifies `proof` against `root`, returning the proven key and value.
    fn open_proof(
        root: Self::Root,
        proof: StorageProof<Self::Proof>,
    ) -> anyhow::Result<(StorageKey, Option<StorageValue>)>;
}

//! Storage and state management for the OPChild module.
//!
//! The module owns a single versioned key-value namespace. Modules never
//! touch [`Storage`] directly: every read and write goes through a
//! [`WorkingSet`], which layers revertable branches on top of the committed
//! state and carries the gas meter and the event log of the current message.

#![deny(missing_docs)]

pub mod codec;
mod containers;
mod error;
mod event;
mod gas;
mod prover_storage;
/// Trait and type definitions related to the [`Storage`] trait.
pub mod storage;
mod working_set;

use std::fmt::Display;
use std::str;

pub use containers::{StateMap, StateValue};
pub use error::StateError;
pub use event::Event;
pub use gas::{GasMeter, GasUnit};
pub use prover_storage::ProverStorage;
pub use storage::{OrderedWrites, Storage, StorageKey, StorageProof, StorageValue};
pub use working_set::{PrefixIter, StateCheckpoint, WorkingSet};

/// A prefix prepended to each key before insertion and retrieval from the storage.
///
/// Every container of a module is constructed with its own prefix so that
/// keys of different containers never collide inside the shared namespace.
#[derive(
    borsh::BorshDeserialize,
    borsh::BorshSerialize,
    Debug,
    PartialEq,
    Eq,
    Clone,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Prefix {
    prefix: Vec<u8>,
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match str::from_utf8(&self.prefix) {
            Ok(s) if s.chars().all(|c| !c.is_control()) => write!(f, "{:?}", s),
            _ => write!(f, "0x{}", hex::encode(&self.prefix)),
        }
    }
}

impl Prefix {
    /// Creates a new prefix from a byte vector.
    pub fn new(prefix: Vec<u8>) -> Self {
        Self { prefix }
    }

    /// Returns the raw bytes of the prefix.
    pub fn as_bytes(&self) -> &[u8] {
        &self.prefix
    }

    /// Returns the length in bytes of the prefix.
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    /// Returns `true` if the prefix is empty, `false` otherwise.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Returns a new prefix that extends this one with `suffix`.
    pub fn extended(&self, suffix: &[u8]) -> Self {
        let mut prefix = Vec::with_capacity(self.prefix.len() + suffix.len());
        prefix.extend_from_slice(&self.prefix);
        prefix.extend_from_slice(suffix);
        Self { prefix }
    }
}

impl From<u8> for Prefix {
    fn from(byte: u8) -> Self {
        Self::new(vec![byte])
    }
}

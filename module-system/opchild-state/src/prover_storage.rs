use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use jmt::proof::SparseMerkleProof;
use jmt::storage::{LeafNode, Node, NodeBatch, NodeKey, TreeReader};
use jmt::{JellyfishMerkleTree, KeyHash, OwnedValue, RootHash, Version};
use sha2::Sha256;

use crate::storage::{OrderedWrites, Storage, StorageKey, StorageProof, StorageValue};

/// JMT nodes and versioned leaf values.
#[derive(Default)]
struct TreeDb {
    nodes: HashMap<NodeKey, Node>,
    values: HashMap<KeyHash, BTreeMap<Version, Option<OwnedValue>>>,
}

impl TreeDb {
    fn write_node_batch(&mut self, node_batch: &NodeBatch) {
        for (node_key, node) in node_batch.nodes() {
            self.nodes.insert(node_key.clone(), node.clone());
        }

        for ((version, key_hash), value) in node_batch.values() {
            self.values
                .entry(*key_hash)
                .or_default()
                .insert(*version, value.clone());
        }
    }
}

impl TreeReader for TreeDb {
    fn get_node_option(&self, node_key: &NodeKey) -> anyhow::Result<Option<Node>> {
        Ok(self.nodes.get(node_key).cloned())
    }

    fn get_value_option(
        &self,
        max_version: Version,
        key_hash: KeyHash,
    ) -> anyhow::Result<Option<OwnedValue>> {
        Ok(self
            .values
            .get(&key_hash)
            .and_then(|versions| versions.range(..=max_version).next_back())
            .and_then(|(_, value)| value.clone()))
    }

    fn get_rightmost_leaf(&self) -> anyhow::Result<Option<(NodeKey, LeafNode)>> {
        anyhow::bail!("ProverStorage does not support tree restoration")
    }
}

struct Inner {
    tree: TreeDb,
    /// Latest value of every live key, for ordered scans.
    latest: BTreeMap<Vec<u8>, Vec<u8>>,
    version: Version,
}

/// An in-memory [`Storage`] backed by a Jellyfish Merkle Tree over SHA-256.
///
/// Version 0 is the empty tree; every [`Storage::commit`] creates the next
/// version. Clones share the same underlying state.
#[derive(Clone)]
pub struct ProverStorage {
    inner: Arc<RwLock<Inner>>,
}

impl Default for ProverStorage {
    fn default() -> Self {
        Self::temporary()
    }
}

impl ProverStorage {
    /// Creates an empty storage whose genesis version holds the empty tree.
    pub fn temporary() -> Self {
        let mut tree = TreeDb::default();
        let (_, tree_update) = {
            let jmt = JellyfishMerkleTree::<_, Sha256>::new(&tree);
            jmt.put_value_set(Vec::<(KeyHash, Option<OwnedValue>)>::new(), 0)
                .expect("JMT update must succeed")
        };
        tree.write_node_batch(&tree_update.node_batch);

        Self {
            inner: Arc::new(RwLock::new(Inner {
                tree,
                latest: BTreeMap::new(),
                version: 0,
            })),
        }
    }

    fn read(&self) -> anyhow::Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))
    }

    fn write(&self) -> anyhow::Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))
    }

    /// Returns the root hash of the tree at `version`.
    pub fn root_at(&self, version: Version) -> anyhow::Result<RootHash> {
        let inner = self.read()?;
        JellyfishMerkleTree::<_, Sha256>::new(&inner.tree).get_root_hash(version)
    }
}

impl Storage for ProverStorage {
    type Proof = SparseMerkleProof<Sha256>;
    type Root = RootHash;

    fn get(&self, key: &StorageKey) -> Option<StorageValue> {
        // A poisoned lock means a previous commit panicked halfway; there is
        // no consistent state left to read from.
        let inner = self.inner.read().expect("storage lock poisoned");
        inner.latest.get(key.as_ref()).cloned().map(StorageValue::from)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Vec<(StorageKey, StorageValue)> {
        let inner = self.inner.read().expect("storage lock poisoned");
        inner
            .latest
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (StorageKey::from(k.clone()), StorageValue::from(v.clone())))
            .collect()
    }

    fn seek_prefix(&self, prefix: &[u8], from: &[u8]) -> Option<(StorageKey, StorageValue)> {
        let inner = self.inner.read().expect("storage lock poisoned");
        inner
            .latest
            .range(from.max(prefix).to_vec()..)
            .next()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (StorageKey::from(k.clone()), StorageValue::from(v.clone())))
    }

    fn commit(&self, writes: OrderedWrites) -> anyhow::Result<RootHash> {
        let mut inner = self.write()?;
        let next_version = inner.version + 1;

        // Deleting a key the tree never held is a no-op; keep it out of the batch.
        let writes: OrderedWrites = writes
            .into_iter()
            .filter(|(k, v)| v.is_some() || inner.latest.contains_key(k.as_ref()))
            .collect();

        let batch: Vec<(KeyHash, Option<OwnedValue>)> = writes
            .iter()
            .map(|(key, value)| {
                (
                    KeyHash::with::<Sha256>(key.as_ref()),
                    value.as_ref().map(|v| v.value().to_vec()),
                )
            })
            .collect();

        let (new_root, tree_update) = {
            let jmt = JellyfishMerkleTree::<_, Sha256>::new(&inner.tree);
            jmt.put_value_set(batch, next_version)?
        };
        inner.tree.write_node_batch(&tree_update.node_batch);

        for (key, value) in writes {
            match value {
                Some(value) => {
                    inner.latest.insert(key.as_ref().to_vec(), value.into_vec());
                }
                None => {
                    inner.latest.remove(key.as_ref());
                }
            }
        }
        inner.version = next_version;

        tracing::debug!(version = next_version, root = %hex::encode(new_root.0), "Committed state");
        Ok(new_root)
    }

    fn root(&self) -> anyhow::Result<RootHash> {
        let inner = self.read()?;
        JellyfishMerkleTree::<_, Sha256>::new(&inner.tree).get_root_hash(inner.version)
    }

    fn version(&self) -> u64 {
        self.inner.read().map(|inner| inner.version).unwrap_or_default()
    }

    fn get_with_proof(&self, key: StorageKey) -> anyhow::Result<StorageProof<Self::Proof>> {
        let inner = self.read()?;
        let jmt = JellyfishMerkleTree::<_, Sha256>::new(&inner.tree);
        let (value, proof) =
            jmt.get_with_proof(KeyHash::with::<Sha256>(key.as_ref()), inner.version)?;
        Ok(StorageProof {
            key,
            value: value.map(StorageValue::from),
            proof,
        })
    }

    fn open_proof(
        root: RootHash,
        state_proof: StorageProof<Self::Proof>,
    ) -> anyhow::Result<(StorageKey, Option<StorageValue>)> {
        let StorageProof { key, value, proof } = state_proof;
        let key_hash = KeyHash::with::<Sha256>(key.as_ref());

        proof.verify(root, key_hash, value.as_ref().map(|v| v.value()))?;
        Ok((key, value))
    }
}

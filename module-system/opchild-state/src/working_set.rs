//! Runtime state machine definitions.

use std::collections::BTreeMap;
use std::mem;

use crate::codec::{StateKeyCodec, StateValueCodec};
use crate::error::StateError;
use crate::event::Event;
use crate::gas::{GasMeter, GasUnit};
use crate::storage::{OrderedWrites, Storage, StorageKey, StorageValue};
use crate::Prefix;

type Writes = BTreeMap<StorageKey, Option<StorageValue>>;

/// One revertable layer of writes, together with the length of the event
/// log at the moment the layer was opened.
#[derive(Debug, Default)]
struct Layer {
    writes: Writes,
    events_len: usize,
}

/// This structure is responsible for storing the `read-write` set.
///
/// A [`StateCheckpoint`] can be obtained from a [`WorkingSet`] in two ways:
///  1. With [`WorkingSet::checkpoint`].
///  2. With [`WorkingSet::revert`].
pub struct StateCheckpoint<S: Storage> {
    storage: S,
    delta: Writes,
}

impl<S: Storage> StateCheckpoint<S> {
    /// Creates a new [`StateCheckpoint`] instance without any changes, backed
    /// by the given [`Storage`].
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            delta: Writes::new(),
        }
    }

    /// Transforms this [`StateCheckpoint`] back into a [`WorkingSet`].
    pub fn to_revertable(self) -> WorkingSet<S> {
        WorkingSet {
            storage: self.storage,
            delta: self.delta,
            layers: vec![Layer::default()],
            events: Vec::new(),
            gas_meter: GasMeter::infinite(),
        }
    }

    /// Extracts the ordered writes from this [`StateCheckpoint`]. The data is
    /// moved **out**, so it can't be extracted twice.
    pub fn freeze(&mut self) -> OrderedWrites {
        mem::take(&mut self.delta).into_iter().collect()
    }

    /// Writes every change of this checkpoint into the backing storage as a
    /// new version and returns the resulting root.
    pub fn commit(mut self) -> anyhow::Result<S::Root> {
        let writes = self.freeze();
        self.storage.commit(writes)
    }
}

/// This structure contains the read-write set, the gas meter and the events
/// collected during the execution of a message.
///
/// Writes land in the innermost open layer. [`WorkingSet::branch`] opens a
/// nested layer which is later either merged into its parent with
/// [`WorkingSet::commit_branch`] or dropped with
/// [`WorkingSet::discard_branch`]; events emitted inside a dropped layer are
/// dropped with it.
pub struct WorkingSet<S: Storage> {
    storage: S,
    delta: Writes,
    layers: Vec<Layer>,
    events: Vec<Event>,
    gas_meter: GasMeter,
}

impl<S: Storage> WorkingSet<S> {
    /// Creates a new [`WorkingSet`] instance backed by the given [`Storage`].
    pub fn new(storage: S) -> Self {
        StateCheckpoint::new(storage).to_revertable()
    }

    /// Returns the backing storage.
    pub fn backing(&self) -> &S {
        &self.storage
    }

    /// Turns this [`WorkingSet`] into a [`StateCheckpoint`], keeping every
    /// change, including those of branches that are still open.
    pub fn checkpoint(mut self) -> StateCheckpoint<S> {
        for layer in self.layers.drain(..) {
            self.delta.extend(layer.writes);
        }
        StateCheckpoint {
            storage: self.storage,
            delta: self.delta,
        }
    }

    /// Reverts every change made since the last checkpoint, returning a
    /// pristine [`StateCheckpoint`] instance.
    pub fn revert(self) -> StateCheckpoint<S> {
        StateCheckpoint {
            storage: self.storage,
            delta: self.delta,
        }
    }

    /// Opens a nested branch.
    pub fn branch(&mut self) {
        self.layers.push(Layer {
            writes: Writes::new(),
            events_len: self.events.len(),
        });
    }

    /// Returns the number of branches currently open.
    pub fn branch_depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Merges the innermost branch into its parent.
    pub fn commit_branch(&mut self) -> Result<(), StateError> {
        if self.layers.len() < 2 {
            return Err(StateError::NoOpenBranch);
        }
        if let Some(layer) = self.layers.pop() {
            self.top_mut().writes.extend(layer.writes);
        }
        Ok(())
    }

    /// Drops the innermost branch with its writes and events.
    pub fn discard_branch(&mut self) -> Result<(), StateError> {
        if self.layers.len() < 2 {
            return Err(StateError::NoOpenBranch);
        }
        if let Some(layer) = self.layers.pop() {
            self.events.truncate(layer.events_len);
        }
        Ok(())
    }

    /// Runs `f` inside a fresh branch, merging it on `Ok` and dropping it on
    /// `Err`.
    pub fn with_branch<T, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let depth = self.layers.len();
        self.branch();
        let result = f(self);
        // `f` may have left its own branches open; fold them into ours first.
        while self.layers.len() > depth + 1 {
            if let Some(layer) = self.layers.pop() {
                self.top_mut().writes.extend(layer.writes);
            }
        }
        match result {
            Ok(value) => {
                if let Some(layer) = self.layers.pop() {
                    self.top_mut().writes.extend(layer.writes);
                }
                Ok(value)
            }
            Err(err) => {
                if let Some(layer) = self.layers.pop() {
                    self.events.truncate(layer.events_len);
                }
                Err(err)
            }
        }
    }

    fn top_mut(&mut self) -> &mut Layer {
        if self.layers.is_empty() {
            self.layers.push(Layer::default());
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// Reads a raw value, looking through the open layers first.
    pub fn get(&self, key: &StorageKey) -> Option<StorageValue> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.writes.get(key) {
                return value.clone();
            }
        }
        match self.delta.get(key) {
            Some(value) => value.clone(),
            None => self.storage.get(key),
        }
    }

    /// Writes a raw value into the innermost layer.
    pub fn set(&mut self, key: &StorageKey, value: StorageValue) {
        self.top_mut().writes.insert(key.clone(), Some(value));
    }

    /// Deletes a raw value in the innermost layer.
    pub fn delete(&mut self, key: &StorageKey) {
        self.top_mut().writes.insert(key.clone(), None);
    }

    /// Returns every live entry whose key starts with `prefix`, in ascending
    /// key order, as seen through all open layers.
    pub fn iter_prefix(&self, prefix: &Prefix) -> Vec<(StorageKey, StorageValue)> {
        let mut merged: BTreeMap<StorageKey, Option<StorageValue>> = self
            .storage
            .iter_prefix(prefix.as_bytes())
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();

        let start = StorageKey::singleton(prefix);
        let overlays = std::iter::once(&self.delta).chain(self.layers.iter().map(|l| &l.writes));
        for writes in overlays {
            for (key, value) in writes
                .range(start.clone()..)
                .take_while(|(k, _)| k.as_ref().starts_with(prefix.as_bytes()))
            {
                merged.insert(key.clone(), value.clone());
            }
        }

        merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }

    /// Walks the live entries under `prefix` in ascending key order. Each step
    /// seeks the backing storage and the open layers, so stopping early
    /// leaves the rest of the prefix unread.
    pub fn iter_prefix_lazy(&self, prefix: &Prefix) -> PrefixIter<'_, S> {
        PrefixIter {
            working_set: self,
            prefix: prefix.clone(),
            from: Some(StorageKey::singleton(prefix)),
        }
    }

    /// Smallest key under `prefix` that is at least `from`, live or deleted,
    /// across the storage and every overlay.
    fn next_candidate(&self, prefix: &Prefix, from: &StorageKey) -> Option<StorageKey> {
        let committed = self
            .storage
            .seek_prefix(prefix.as_bytes(), from.as_ref())
            .map(|(key, _)| key);
        std::iter::once(&self.delta)
            .chain(self.layers.iter().map(|l| &l.writes))
            .filter_map(|writes| {
                writes
                    .range(from.clone()..)
                    .next()
                    .map(|(key, _)| key)
                    .filter(|key| key.as_ref().starts_with(prefix.as_bytes()))
                    .cloned()
            })
            .chain(committed)
            .min()
    }

    /// Replaces a storage value with the provided prefix, using the provided codec.
    pub fn set_value<K, V, C>(&mut self, prefix: &Prefix, codec: &C, key: &K, value: &V)
    where
        C: StateKeyCodec<K> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        let storage_value = StorageValue::new(value, codec);
        self.set(&storage_key, storage_value);
    }

    /// Replaces a storage value with a singleton prefix.
    pub fn set_singleton<V, C>(&mut self, prefix: &Prefix, codec: &C, value: &V)
    where
        C: StateValueCodec<V>,
    {
        let storage_key = StorageKey::singleton(prefix);
        let storage_value = StorageValue::new(value, codec);
        self.set(&storage_key, storage_value);
    }

    /// Get a decoded value from the storage.
    ///
    /// # Panics
    /// Panics if the stored bytes do not decode. Values are only ever written
    /// through the same codec, so a decode failure means corrupted state.
    pub fn get_decoded<V, C>(&self, storage_key: &StorageKey, codec: &C) -> Option<V>
    where
        C: StateValueCodec<V>,
    {
        let storage_value = self.get(storage_key)?;
        match codec.try_decode_value(storage_value.value()) {
            Ok(value) => Some(value),
            Err(err) => panic!(
                "{}",
                StateError::ValueDecode {
                    key: hex::encode(storage_key.as_ref()),
                    reason: format!("{err:?}"),
                }
            ),
        }
    }

    /// Get a value from the storage.
    pub fn get_value<K, V, C>(&self, prefix: &Prefix, codec: &C, key: &K) -> Option<V>
    where
        C: StateKeyCodec<K> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        self.get_decoded(&storage_key, codec)
    }

    /// Get a singleton value from the storage.
    pub fn get_singleton<V, C>(&self, prefix: &Prefix, codec: &C) -> Option<V>
    where
        C: StateValueCodec<V>,
    {
        let storage_key = StorageKey::singleton(prefix);
        self.get_decoded(&storage_key, codec)
    }

    /// Removes a value from the storage.
    pub fn remove_value<K, V, C>(&mut self, prefix: &Prefix, codec: &C, key: &K) -> Option<V>
    where
        C: StateKeyCodec<K> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        let storage_value = self.get_decoded(&storage_key, codec)?;
        self.delete(&storage_key);
        Some(storage_value)
    }

    /// Deletes a value from the storage.
    pub fn delete_value<K, C>(&mut self, prefix: &Prefix, codec: &C, key: &K)
    where
        C: StateKeyCodec<K>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        self.delete(&storage_key);
    }

    /// Deletes a singleton from the storage.
    pub fn delete_singleton(&mut self, prefix: &Prefix) {
        let storage_key = StorageKey::singleton(prefix);
        self.delete(&storage_key);
    }

    /// Adds an event to the working set.
    pub fn emit_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Returns an immutable slice of all events that have been previously
    /// written to this working set.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Extracts all events from this working set.
    pub fn take_events(&mut self) -> Vec<Event> {
        for layer in self.layers.iter_mut() {
            layer.events_len = 0;
        }
        mem::take(&mut self.events)
    }

    /// Returns the gas meter of the current message.
    pub fn gas_meter(&self) -> &GasMeter {
        &self.gas_meter
    }

    /// Installs `meter`, returning the previous one.
    pub fn replace_gas_meter(&mut self, meter: GasMeter) -> GasMeter {
        mem::replace(&mut self.gas_meter, meter)
    }

    /// Attempts to charge the provided amount of gas from the gas meter.
    pub fn charge_gas(&mut self, amount: GasUnit, descriptor: &str) -> Result<(), StateError> {
        self.gas_meter.charge_gas(amount, descriptor)
    }
}


/// Lazy ascending walk over the live entries of a prefix, as returned by
/// [`WorkingSet::iter_prefix_lazy`].
pub struct PrefixIter<'a, S: Storage> {
    working_set: &'a WorkingSet<S>,
    prefix: Prefix,
    from: Option<StorageKey>,
}

impl<'a, S: Storage> Iterator for PrefixIter<'a, S> {
    type Item = (StorageKey, StorageValue);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let from = self.from.take()?;
            let key = self.working_set.next_candidate(&self.prefix, &from)?;
            // The next key in byte order is the current one followed by 0x00.
            let mut successor = key.as_ref().to_vec();
            successor.push(0);
            self.from = Some(StorageKey::from(successor));

            if let Some(value) = self.working_set.get(&key) {
                return Some((key, value));
            }
        }
    }
}

use std::marker::PhantomData;

use crate::codec::{DefaultCodec, StateCodec};
use crate::error::StateError;
use crate::storage::{StorageKey, StorageValue};
use crate::{Prefix, Storage, WorkingSet};

/// A container that maps keys to values.
///
/// # Type parameters
/// [`StateMap`] is generic over:
/// - a key type (`K`);
/// - a value type (`V`);
/// - a [`StateCodec`] (`C`).
///
/// With the [`DefaultCodec`], iteration yields entries in the natural order
/// of the key type.
#[derive(Debug, PartialEq, Clone)]
pub struct StateMap<K, V, C = DefaultCodec> {
    _phantom: (PhantomData<K>, PhantomData<V>),
    codec: C,
    prefix: Prefix,
}

impl<K, V> StateMap<K, V>
where
    DefaultCodec: StateCodec<K, V>,
{
    /// Creates a new [`StateMap`] with the given prefix and the default
    /// [`StateCodec`] (i.e. [`DefaultCodec`]).
    pub fn new(prefix: Prefix) -> Self {
        Self::with_codec(prefix, DefaultCodec::default())
    }
}

impl<K, V, C> StateMap<K, V, C>
where
    C: StateCodec<K, V>,
{
    /// Creates a new [`StateMap`] with the given prefix and codec.
    pub fn with_codec(prefix: Prefix, codec: C) -> Self {
        Self {
            _phantom: (PhantomData, PhantomData),
            codec,
            prefix,
        }
    }

    /// Returns the prefix used when this [`StateMap`] was created.
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Returns the full storage key of `key`.
    pub fn storage_key(&self, key: &K) -> StorageKey {
        StorageKey::new(self.prefix(), key, &self.codec)
    }

    /// Inserts a key-value pair into the map.
    pub fn set<S: Storage>(&self, key: &K, value: &V, working_set: &mut WorkingSet<S>) {
        working_set.set_value(self.prefix(), &self.codec, key, value)
    }

    /// Returns the value corresponding to the key or None if key is absent in the StateMap.
    pub fn get<S: Storage>(&self, key: &K, working_set: &WorkingSet<S>) -> Option<V> {
        working_set.get_value(self.prefix(), &self.codec, key)
    }

    /// Returns the value corresponding to the key or Error if key is absent in the StateMap.
    pub fn get_or_err<S: Storage>(&self, key: &K, working_set: &WorkingSet<S>) -> Result<V, StateError> {
        self.get(key, working_set).ok_or_else(|| {
            StateError::MissingValue(self.prefix().to_string(), self.storage_key(key).to_string())
        })
    }

    /// Returns `true` if the map holds a value for `key`.
    pub fn contains<S: Storage>(&self, key: &K, working_set: &WorkingSet<S>) -> bool {
        working_set.get(&self.storage_key(key)).is_some()
    }

    /// Removes a key from the StateMap, returning the corresponding value (or None if the key is absent).
    pub fn remove<S: Storage>(&self, key: &K, working_set: &mut WorkingSet<S>) -> Option<V> {
        working_set.remove_value(self.prefix(), &self.codec, key)
    }

    /// Deletes a key-value pair from the StateMap.
    ///
    /// This is equivalent to [`StateMap::remove`], but doesn't deserialize and
    /// return the value before deletion.
    pub fn delete<S: Storage>(&self, key: &K, working_set: &mut WorkingSet<S>) {
        working_set.delete_value(self.prefix(), &self.codec, key);
    }

    /// Returns every entry of the map in ascending storage-key order.
    pub fn iter<S: Storage>(&self, working_set: &WorkingSet<S>) -> Result<Vec<(K, V)>, StateError> {
        working_set
            .iter_prefix(self.prefix())
            .into_iter()
            .filter_map(|(storage_key, storage_value)| self.decode_entry(storage_key, storage_value))
            .collect()
    }

    /// Like [`StateMap::iter`], but reads one entry at a time. Stopping early
    /// never touches the rest of the map.
    pub fn entries<'a, S: Storage>(
        &'a self,
        working_set: &'a WorkingSet<S>,
    ) -> impl Iterator<Item = Result<(K, V), StateError>> + 'a {
        working_set
            .iter_prefix_lazy(self.prefix())
            .filter_map(move |(storage_key, storage_value)| {
                self.decode_entry(storage_key, storage_value)
            })
    }

    /// Decodes a raw entry of the map. The singleton slot of the same prefix
    /// is not a map entry and yields `None`.
    fn decode_entry(
        &self,
        storage_key: StorageKey,
        storage_value: StorageValue,
    ) -> Option<Result<(K, V), StateError>> {
        let raw_key = storage_key.strip_prefix(self.prefix())?;
        if raw_key.is_empty() {
            return None;
        }
        let entry = self
            .codec
            .try_decode_key(raw_key)
            .map_err(|e| StateError::KeyDecode(format!("{e:?}")))
            .and_then(|key| {
                let value = self
                    .codec
                    .try_decode_value(storage_value.value())
                    .map_err(|e| StateError::ValueDecode {
                        key: hex::encode(storage_key.as_ref()),
                        reason: format!("{e:?}"),
                    })?;
                Ok((key, value))
            });
        Some(entry)
    }

    /// Returns every key of the map in ascending storage-key order.
    pub fn keys<S: Storage>(&self, working_set: &WorkingSet<S>) -> Result<Vec<K>, StateError> {
        Ok(self
            .iter(working_set)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Deletes every entry of the map.
    pub fn clear<S: Storage>(&self, working_set: &mut WorkingSet<S>) {
        for (storage_key, _) in working_set.iter_prefix(self.prefix()) {
            if storage_key.as_ref().len() > self.prefix().len() {
                working_set.delete(&storage_key);
            }
        }
    }
}

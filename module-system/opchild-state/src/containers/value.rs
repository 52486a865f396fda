use std::marker::PhantomData;

use crate::codec::{DefaultCodec, StateValueCodec};
use crate::error::StateError;
use crate::{Prefix, Storage, WorkingSet};

/// Container for a single value.
#[derive(Debug, PartialEq, Clone)]
pub struct StateValue<V, C = DefaultCodec> {
    _phantom: PhantomData<V>,
    codec: C,
    prefix: Prefix,
}

impl<V> StateValue<V>
where
    DefaultCodec: StateValueCodec<V>,
{
    /// Creates a new [`StateValue`] with the given prefix and the default codec.
    pub fn new(prefix: Prefix) -> Self {
        Self::with_codec(prefix, DefaultCodec::default())
    }
}

impl<V, C> StateValue<V, C>
where
    C: StateValueCodec<V>,
{
    /// Creates a new [`StateValue`] with the given prefix and codec.
    pub fn with_codec(prefix: Prefix, codec: C) -> Self {
        Self {
            _phantom: PhantomData,
            codec,
            prefix,
        }
    }

    /// Returns the prefix used when this [`StateValue`] was created.
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Sets a value in the StateValue.
    pub fn set<S: Storage>(&self, value: &V, working_set: &mut WorkingSet<S>) {
        working_set.set_singleton(self.prefix(), &self.codec, value)
    }

    /// Gets a value from the StateValue or None if the value is absent.
    pub fn get<S: Storage>(&self, working_set: &WorkingSet<S>) -> Option<V> {
        working_set.get_singleton(self.prefix(), &self.codec)
    }

    /// Gets a value from the StateValue or Error if the value is absent.
    pub fn get_or_err<S: Storage>(&self, working_set: &WorkingSet<S>) -> Result<V, StateError> {
        self.get(working_set)
            .ok_or_else(|| StateError::MissingValue(self.prefix().to_string(), String::new()))
    }

    /// Removes a value from the StateValue, returning the value (or None if the key is absent).
    pub fn remove<S: Storage>(&self, working_set: &mut WorkingSet<S>) -> Option<V> {
        let value = self.get(working_set)?;
        working_set.delete_singleton(self.prefix());
        Some(value)
    }

    /// Deletes a value from the StateValue.
    pub fn delete<S: Storage>(&self, working_set: &mut WorkingSet<S>) {
        working_set.delete_singleton(self.prefix());
    }
}

//! Serialization and deserialization -related logic.
//!
//! Keys and values are encoded separately. Values go through [`BorshCodec`].
//! Keys go through [`OrderedKeyCodec`], whose encoding preserves the order of
//! the key type so that prefix scans over the store come back sorted.

use std::fmt::Debug;

use crate::error::StateError;

/// A trait for types that can serialize and deserialize keys for storage
/// access.
pub trait StateKeyCodec<K> {
    /// Error type that can arise during deserialization.
    type KeyError: Debug;

    /// Serializes a key into a bytes vector.
    ///
    /// This method **must** not panic as all instances of the key type are
    /// supposed to be serializable.
    fn encode_key(&self, key: &K) -> Vec<u8>;

    /// Tries to deserialize a key from a bytes slice.
    fn try_decode_key(&self, bytes: &[u8]) -> Result<K, Self::KeyError>;
}

/// A trait for types that can serialize and deserialize values for storage
/// access.
pub trait StateValueCodec<V> {
    /// Error type that can arise during deserialization.
    type ValueError: Debug;

    /// Serializes a value into a bytes vector.
    fn encode_value(&self, value: &V) -> Vec<u8>;

    /// Tries to deserialize a value from a bytes slice.
    fn try_decode_value(&self, bytes: &[u8]) -> Result<V, Self::ValueError>;
}

/// A marker trait for types that implement both [`StateKeyCodec`] and
/// [`StateValueCodec`].
pub trait StateCodec<K, V>: StateKeyCodec<K> + StateValueCodec<V> {}

impl<K, V, C> StateCodec<K, V> for C where C: StateKeyCodec<K> + StateValueCodec<V> {}

/// A [`StateValueCodec`] that uses [`borsh`] for values.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct BorshCodec;

impl<V> StateValueCodec<V> for BorshCodec
where
    V: borsh::BorshSerialize + borsh::BorshDeserialize,
{
    type ValueError = std::io::Error;

    fn encode_value(&self, value: &V) -> Vec<u8> {
        value.try_to_vec().expect("Failed to serialize value")
    }

    fn try_decode_value(&self, bytes: &[u8]) -> Result<V, Self::ValueError> {
        V::try_from_slice(bytes)
    }
}

/// Keys whose byte encoding sorts the same way the keys themselves do.
///
/// Integers are written big-endian. Variable-length types that may be
/// followed by other key material must prefix themselves with their length.
pub trait OrderedKey: Sized {
    /// Encodes the key.
    fn to_key_bytes(&self) -> Vec<u8>;

    /// Decodes the key from exactly the bytes produced by
    /// [`OrderedKey::to_key_bytes`].
    fn from_key_bytes(bytes: &[u8]) -> Result<Self, StateError>;
}

impl OrderedKey for u64 {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| StateError::KeyDecode(format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(u64::from_be_bytes(bytes))
    }
}

impl OrderedKey for Vec<u8> {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        Ok(bytes.to_vec())
    }
}

impl OrderedKey for String {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| StateError::KeyDecode(e.to_string()))
    }
}

impl<const N: usize> OrderedKey for [u8; N] {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        bytes
            .try_into()
            .map_err(|_| StateError::KeyDecode(format!("expected {N} bytes, got {}", bytes.len())))
    }
}

/// A [`StateKeyCodec`] for [`OrderedKey`] types.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct OrderedKeyCodec;

impl<K: OrderedKey> StateKeyCodec<K> for OrderedKeyCodec {
    type KeyError = StateError;

    fn encode_key(&self, key: &K) -> Vec<u8> {
        key.to_key_bytes()
    }

    fn try_decode_key(&self, bytes: &[u8]) -> Result<K, Self::KeyError> {
        K::from_key_bytes(bytes)
    }
}

/// A [`StateCodec`] that uses two different codecs under the hood, one for keys
/// and one for values.
#[derive(Default, Debug, Clone, Copy)]
pub struct PairOfCodecs<KC, VC> {
    /// The codec used for keys.
    pub key_codec: KC,
    /// The codec used for values.
    pub value_codec: VC,
}

impl<K, KC, VC> StateKeyCodec<K> for PairOfCodecs<KC, VC>
where
    KC: StateKeyCodec<K>,
{
    type KeyError = KC::KeyError;

    fn encode_key(&self, key: &K) -> Vec<u8> {
        self.key_codec.encode_key(key)
    }

    fn try_decode_key(&self, bytes: &[u8]) -> Result<K, Self::KeyError> {
        self.key_codec.try_decode_key(bytes)
    }
}

impl<V, KC, VC> StateValueCodec<V> for PairOfCodecs<KC, VC>
where
    VC: StateValueCodec<V>,
{
    type ValueError = VC::ValueError;

    fn encode_value(&self, value: &V) -> Vec<u8> {
        self.value_codec.encode_value(value)
    }

    fn try_decode_value(&self, bytes: &[u8]) -> Result<V, Self::ValueError> {
        self.value_codec.try_decode_value(bytes)
    }
}

/// The codec used by containers unless told otherwise: order-preserving keys
/// and borsh values.
pub type DefaultCodec = PairOfCodecs<OrderedKeyCodec, BorshCodec>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_keys_sort_numerically() {
        let mut encoded: Vec<Vec<u8>> = [256u64, 1, 65_536, 2, 255]
            .iter()
            .map(OrderedKey::to_key_bytes)
            .collect();
        encoded.sort();
        let decoded: Vec<u64> = encoded
            .iter()
            .map(|b| u64::from_key_bytes(b).unwrap())
            .collect();
        assert_eq!(decoded, vec![1, 2, 255, 256, 65_536]);
    }

    #[test]
    fn u64_key_rejects_wrong_length() {
        assert!(u64::from_key_bytes(&[1, 2, 3]).is_err());
    }
}

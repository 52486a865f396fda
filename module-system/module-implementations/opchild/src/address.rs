//! Bech32 addresses.
//!
//! An account, its validator operator and its consensus key share the same
//! raw byte representation and differ only in the human readable part.

use std::fmt;
use std::str::FromStr;

use bech32::{FromBase32, ToBase32, Variant};
use opchild_state::codec::OrderedKey;
use opchild_state::StateError;

use crate::OpChildError;

/// Prefix of account addresses.
pub const ACCOUNT_HRP: &str = "init";
/// Prefix of validator operator addresses.
pub const VALOPER_HRP: &str = "initvaloper";
/// Prefix of validator consensus addresses.
pub const VALCONS_HRP: &str = "initvalcons";

/// Longest address accepted, in bytes.
pub const MAX_ADDRESS_LEN: usize = 255;

/// Encodes `bytes` as a bech32 string with the given prefix.
pub fn to_bech32(hrp: &str, bytes: &[u8]) -> Result<String, OpChildError> {
    bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
        .map_err(|e| OpChildError::invalid_address(hex::encode(bytes), e))
}

/// Decodes any bech32 string into its prefix and payload.
pub fn from_bech32(address: &str) -> Result<(String, Vec<u8>), OpChildError> {
    let (hrp, data, _) =
        bech32::decode(address).map_err(|e| OpChildError::invalid_address(address, e))?;
    let bytes =
        Vec::<u8>::from_base32(&data).map_err(|e| OpChildError::invalid_address(address, e))?;
    if bytes.is_empty() || bytes.len() > MAX_ADDRESS_LEN {
        return Err(OpChildError::invalid_address(
            address,
            format!("length {} out of range", bytes.len()),
        ));
    }
    Ok((hrp, bytes))
}

macro_rules! bech32_address {
    ($(#[$meta:meta])* $name:ident, $hrp:expr) => {
        $(#[$meta])*
        #[derive(
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            borsh::BorshSerialize,
            borsh::BorshDeserialize,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Vec<u8>);

        impl $name {
            /// The human readable part of this address kind.
            pub const HRP: &'static str = $hrp;

            /// Wraps raw address bytes.
            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// Returns the raw address bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Parses a bech32 string, requiring this kind's prefix.
            pub fn parse(address: &str) -> Result<Self, OpChildError> {
                let (hrp, bytes) = from_bech32(address)?;
                if hrp != Self::HRP {
                    return Err(OpChildError::invalid_address(
                        address,
                        format!("expected prefix {}, got {}", Self::HRP, hrp),
                    ));
                }
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match to_bech32(Self::HRP, &self.0) {
                    Ok(s) => f.write_str(&s),
                    Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = OpChildError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = OpChildError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl From<$name> for String {
            fn from(address: $name) -> Self {
                address.to_string()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        /// Keys are `len ‖ bytes` so that variable-length addresses never
        /// prefix one another.
        impl OrderedKey for $name {
            fn to_key_bytes(&self) -> Vec<u8> {
                let mut key = Vec::with_capacity(self.0.len() + 1);
                key.push(self.0.len() as u8);
                key.extend_from_slice(&self.0);
                key
            }

            fn from_key_bytes(bytes: &[u8]) -> Result<Self, StateError> {
                match bytes.split_first() {
                    Some((len, rest)) if *len as usize == rest.len() => Ok(Self(rest.to_vec())),
                    _ => Err(StateError::KeyDecode(format!(
                        "malformed length-prefixed address 0x{}",
                        hex::encode(bytes)
                    ))),
                }
            }
        }
    };
}

bech32_address!(
    /// An account address (`init1…`).
    AccAddress,
    ACCOUNT_HRP
);

bech32_address!(
    /// A validator operator address (`initvaloper1…`).
    ValAddress,
    VALOPER_HRP
);

bech32_address!(
    /// A validator consensus address (`initvalcons1…`), the first 20 bytes
    /// of the SHA-256 of the consensus public key.
    ConsAddress,
    VALCONS_HRP
);

impl From<&ValAddress> for AccAddress {
    fn from(address: &ValAddress) -> Self {
        Self(address.0.clone())
    }
}

impl From<&AccAddress> for ValAddress {
    fn from(address: &AccAddress) -> Self {
        Self(address.0.clone())
    }
}

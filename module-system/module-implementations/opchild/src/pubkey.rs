use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::ConsAddress;
use crate::OpChildError;

pub const ED25519_TYPE_URL: &str = "/cosmos.crypto.ed25519.PubKey";
pub const SECP256K1_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";

/// Key type names as listed in the consensus params.
pub const ED25519_KEY_TYPE: &str = "ed25519";
pub const SECP256K1_KEY_TYPE: &str = "secp256k1";

const SECP256K1_KEY_LEN: usize = 33;

/// A consensus public key, tagged by algorithm.
#[derive(
    Clone, PartialEq, Eq, borsh::BorshSerialize, borsh::BorshDeserialize, Serialize, Deserialize,
)]
#[serde(try_from = "PubKeyJson", into = "PubKeyJson")]
pub enum PubKey {
    Ed25519([u8; 32]),
    /// Compressed SEC1 point, always 33 bytes.
    Secp256k1(Vec<u8>),
}

/// The JSON shape of a key: `{"@type": "<type url>", "key": "<base64>"}`.
#[derive(Clone, Serialize, Deserialize)]
pub struct PubKeyJson {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub key: String,
}

impl PubKey {
    /// Builds a key from its type URL and raw bytes.
    pub fn from_type_url(type_url: &str, key: &[u8]) -> Result<Self, OpChildError> {
        match type_url {
            ED25519_TYPE_URL => {
                let key: [u8; 32] = key.try_into().map_err(|_| {
                    OpChildError::Codec(format!("ed25519 key must be 32 bytes, got {}", key.len()))
                })?;
                Ok(Self::Ed25519(key))
            }
            SECP256K1_TYPE_URL => {
                if key.len() != SECP256K1_KEY_LEN {
                    return Err(OpChildError::Codec(format!(
                        "secp256k1 key must be {SECP256K1_KEY_LEN} bytes, got {}",
                        key.len()
                    )));
                }
                Ok(Self::Secp256k1(key.to_vec()))
            }
            other => Err(OpChildError::UnsupportedPubKey(other.to_owned())),
        }
    }

    /// Parses the JSON form used by executor change plans.
    pub fn from_json(json: &str) -> Result<Self, OpChildError> {
        let raw: PubKeyJson =
            serde_json::from_str(json).map_err(|e| OpChildError::Codec(e.to_string()))?;
        raw.try_into()
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => ED25519_TYPE_URL,
            Self::Secp256k1(_) => SECP256K1_TYPE_URL,
        }
    }

    /// The algorithm name used by the consensus params.
    pub fn key_type(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => ED25519_KEY_TYPE,
            Self::Secp256k1(_) => SECP256K1_KEY_TYPE,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(key) => key,
            Self::Secp256k1(key) => key,
        }
    }

    /// `SHA-256(key)[..20]`, the CometBFT address of an ed25519 key.
    pub fn cons_address(&self) -> ConsAddress {
        let digest = Sha256::digest(self.as_bytes());
        ConsAddress::from_bytes(digest[..20].to_vec())
    }

    /// Verifies `signature` over `msg`.
    ///
    /// Only ed25519 keys can sign vote extensions.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), OpChildError> {
        match self {
            Self::Ed25519(key) => {
                let key = VerifyingKey::from_bytes(key)
                    .map_err(|e| OpChildError::InvalidVoteExtension(e.to_string()))?;
                let signature = Signature::from_slice(signature)
                    .map_err(|e| OpChildError::InvalidVoteExtension(e.to_string()))?;
                key.verify(msg, &signature)
                    .map_err(|e| OpChildError::InvalidVoteExtension(e.to_string()))
            }
            Self::Secp256k1(_) => Err(OpChildError::UnsupportedPubKey(
                SECP256K1_KEY_TYPE.to_owned(),
            )),
        }
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.key_type(), hex::encode(self.as_bytes()))
    }
}

impl From<PubKey> for PubKeyJson {
    fn from(key: PubKey) -> Self {
        Self {
            type_url: key.type_url().to_owned(),
            key: BASE64.encode(key.as_bytes()),
        }
    }
}

impl TryFrom<PubKeyJson> for PubKey {
    type Error = OpChildError;

    fn try_from(raw: PubKeyJson) -> Result<Self, Self::Error> {
        let bytes = BASE64
            .decode(raw.key.as_bytes())
            .map_err(|e| OpChildError::Codec(e.to_string()))?;
        PubKey::from_type_url(&raw.type_url, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::*;

    #[test]
    fn parses_json_form() {
        let key = PubKey::Ed25519([5u8; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains(ED25519_TYPE_URL));
        assert_eq!(PubKey::from_json(&json).unwrap(), key);
    }

    #[test]
    fn rejects_unknown_type_url() {
        let json = r#"{"@type": "/cosmos.crypto.sr25519.PubKey", "key": "AAAA"}"#;
        assert!(matches!(
            PubKey::from_json(json),
            Err(OpChildError::UnsupportedPubKey(_))
        ));
    }

    #[test]
    fn cons_address_is_truncated_sha256() {
        let key = PubKey::Ed25519([1u8; 32]);
        let expected = Sha256::digest([1u8; 32]);
        assert_eq!(key.cons_address().as_bytes(), &expected[..20]);
    }

    #[test]
    fn verifies_ed25519_signatures() {
        let signer = SigningKey::from_bytes(&[3u8; 32]);
        let key = PubKey::Ed25519(signer.verifying_key().to_bytes());
        let signature = signer.sign(b"payload").to_bytes();

        key.verify(b"payload", &signature).unwrap();
        assert!(key.verify(b"other", &signature).is_err());
    }
}

//! Withdrawal commitments and their membership proofs.

use opchild_state::{Storage, StorageKey, StorageProof};
use sha2::{Digest, Sha256};

use crate::keys::withdrawal_commitment_key;
use crate::types::{Coin, WithdrawalCommitment};
use crate::OpChildError;

/// `SHA-256(be64(sequence) ‖ receiver ‖ coin)`, with the coin written as
/// `{amount}{denom}`.
pub fn withdrawal_commitment(sequence: u64, receiver: &str, coin: &Coin) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_be_bytes());
    hasher.update(receiver.as_bytes());
    hasher.update(coin.to_string().as_bytes());
    hasher.finalize().into()
}

/// Verifies that the withdrawal `(sequence, receiver, coin)` is committed
/// in the state whose root is `app_hash`.
pub fn verify_commitment<S: Storage>(
    app_hash: S::Root,
    sequence: u64,
    receiver: &str,
    coin: &Coin,
    proof: StorageProof<S::Proof>,
) -> Result<(), OpChildError> {
    let expected_key = StorageKey::from(withdrawal_commitment_key(sequence));
    if proof.key != expected_key {
        return Err(OpChildError::InvalidSequence(format!(
            "proof is for key {}, expected {}",
            proof.key, expected_key
        )));
    }

    let (_, value) = S::open_proof(app_hash, proof)?;
    let value = value.ok_or_else(|| {
        OpChildError::InvalidSequence(format!("no withdrawal commitment for sequence {sequence}"))
    })?;
    let stored: WithdrawalCommitment = borsh::BorshDeserialize::try_from_slice(value.value())
        .map_err(|e| OpChildError::Codec(e.to_string()))?;

    if stored.commitment != withdrawal_commitment(sequence, receiver, coin) {
        return Err(OpChildError::InvalidAmount(format!(
            "commitment mismatch for sequence {sequence}"
        )));
    }
    Ok(())
}

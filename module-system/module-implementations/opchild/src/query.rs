//! Defines the queries exposed by the OPChild module, along with the relevant types.
use opchild_state::{Storage, StorageKey, StorageProof, WorkingSet};
use serde::{Deserialize, Serialize};

use crate::address::ValAddress;
use crate::executor::ExecutorChangePlan;
use crate::keys::withdrawal_commitment_key;
use crate::types::{
    BridgeInfo, DenomPair, HistoricalInfo, HostValidator, Params, Validator, WithdrawalCommitment,
};
use crate::{OpChild, OpChildError};

/// Structure returned by the `next_l2_sequence` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextL2SequenceResponse {
    pub next_l2_sequence: u64,
}

/// Structure returned by the `host_validators` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostValidatorsResponse {
    /// L1 height the mirrored set was reported at.
    pub height: u64,
    pub validators: Vec<HostValidator>,
}

impl<S: Storage> OpChild<S> {
    /// Returns the module parameters. They are written at genesis, so their
    /// absence is a state error.
    pub fn get_params(&self, working_set: &WorkingSet<S>) -> Result<Params, OpChildError> {
        Ok(self.params.get_or_err(working_set)?)
    }

    /// Returns the L2 sequence the next withdrawal will be assigned.
    pub fn get_next_l2_sequence(&self, working_set: &WorkingSet<S>) -> u64 {
        self.next_l2_sequence.get(working_set).unwrap_or(1)
    }

    /// Whether the deposit with L1 sequence `sequence` was finalized.
    pub fn is_finalized(&self, sequence: u64, working_set: &WorkingSet<S>) -> bool {
        self.finalized_l1_sequences
            .get(&sequence, working_set)
            .unwrap_or(false)
    }

    pub fn params(&self, working_set: &WorkingSet<S>) -> Result<Params, OpChildError> {
        self.get_params(working_set)
    }

    pub fn next_l2_sequence(&self, working_set: &WorkingSet<S>) -> NextL2SequenceResponse {
        NextL2SequenceResponse {
            next_l2_sequence: self.get_next_l2_sequence(working_set),
        }
    }

    pub fn validator(
        &self,
        validator_address: &str,
        working_set: &WorkingSet<S>,
    ) -> Result<Validator, OpChildError> {
        let operator = ValAddress::parse(validator_address)?;
        self.validators
            .get(&operator, working_set)
            .ok_or(OpChildError::ValidatorNotFound(operator.to_string()))
    }

    /// All registered validators, by operator address.
    pub fn validators(&self, working_set: &WorkingSet<S>) -> Result<Vec<Validator>, OpChildError> {
        Ok(self
            .validators
            .iter(working_set)?
            .into_iter()
            .map(|(_, validator)| validator)
            .collect())
    }

    pub fn bridge_info(&self, working_set: &WorkingSet<S>) -> Option<BridgeInfo> {
        self.bridge_info.get(working_set)
    }

    /// The L1 denom `denom` was bridged from.
    pub fn base_denom(&self, denom: &str, working_set: &WorkingSet<S>) -> Option<String> {
        self.denom_pairs.get(&denom.to_owned(), working_set)
    }

    pub fn denom_pairs(&self, working_set: &WorkingSet<S>) -> Result<Vec<DenomPair>, OpChildError> {
        Ok(self
            .denom_pairs
            .iter(working_set)?
            .into_iter()
            .map(|(denom, base_denom)| DenomPair { denom, base_denom })
            .collect())
    }

    pub fn withdrawal_commitment(
        &self,
        sequence: u64,
        working_set: &WorkingSet<S>,
    ) -> Option<WithdrawalCommitment> {
        self.withdrawal_commitments.get(&sequence, working_set)
    }

    /// Proves the commitment of withdrawal `sequence` against the latest
    /// committed state root.
    pub fn withdrawal_proof(
        &self,
        sequence: u64,
        working_set: &WorkingSet<S>,
    ) -> Result<StorageProof<S::Proof>, OpChildError> {
        let key = StorageKey::from(withdrawal_commitment_key(sequence));
        Ok(working_set.backing().get_with_proof(key)?)
    }

    pub fn historical_info(
        &self,
        height: u64,
        working_set: &WorkingSet<S>,
    ) -> Option<HistoricalInfo> {
        self.historical_infos.get(&height, working_set)
    }

    pub fn host_validators(
        &self,
        working_set: &WorkingSet<S>,
    ) -> Result<HostValidatorsResponse, OpChildError> {
        Ok(HostValidatorsResponse {
            height: self.host_height.get(working_set).unwrap_or_default(),
            validators: self
                .host_validators
                .iter(working_set)?
                .into_iter()
                .map(|(_, validator)| validator)
                .collect(),
        })
    }

    /// Registered executor change plans, by height.
    pub fn executor_change_plans(&self) -> Vec<ExecutorChangePlan> {
        self.plans().values().cloned().collect()
    }
}

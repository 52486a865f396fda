use opchild_state::{Storage, WorkingSet};
use serde::{Deserialize, Serialize};

use crate::address::ValAddress;
use crate::types::{
    BridgeInfo, DenomPair, Params, Validator, ValidatorUpdate, WithdrawalCommitment,
};
use crate::{OpChild, OpChildError};

/// Power of a validator as last reported to consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastValidatorPower {
    pub address: ValAddress,
    pub power: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalCommitmentEntry {
    pub sequence: u64,
    pub commitment: WithdrawalCommitment,
}

/// Config for the OPChild module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpChildConfig {
    pub params: Params,
    pub validators: Vec<Validator>,
    /// Only read when `exported` is set.
    #[serde(default)]
    pub last_validator_powers: Vec<LastValidatorPower>,
    /// Whether this state was produced by [`OpChild::export_genesis`]. A
    /// fresh chain derives its consensus set from `validators`; an exported
    /// one restores the set consensus already knows.
    #[serde(default)]
    pub exported: bool,
    #[serde(default)]
    pub bridge_info: Option<BridgeInfo>,
    #[serde(default)]
    pub finalized_l1_sequences: Vec<u64>,
    pub next_l2_sequence: u64,
    #[serde(default)]
    pub denom_pairs: Vec<DenomPair>,
    #[serde(default)]
    pub withdrawal_commitments: Vec<WithdrawalCommitmentEntry>,
}

impl Default for OpChildConfig {
    fn default() -> Self {
        Self {
            params: Params::default(),
            validators: Vec::new(),
            last_validator_powers: Vec::new(),
            exported: false,
            bridge_info: None,
            finalized_l1_sequences: Vec::new(),
            next_l2_sequence: 1,
            denom_pairs: Vec::new(),
            withdrawal_commitments: Vec::new(),
        }
    }
}

impl<S: Storage> OpChild<S> {
    /// Writes `config` into state and returns the initial validator set.
    pub fn genesis(
        &self,
        config: &OpChildConfig,
        working_set: &mut WorkingSet<S>,
    ) -> Result<Vec<ValidatorUpdate>, OpChildError> {
        config.params.validate()?;
        self.params.set(&config.params, working_set);

        if config.next_l2_sequence == 0 {
            return Err(OpChildError::InvalidSequence(
                "next l2 sequence must start at 1 or above".to_owned(),
            ));
        }
        self.next_l2_sequence
            .set(&config.next_l2_sequence, working_set);

        for validator in &config.validators {
            if self
                .validators
                .contains(&validator.operator_address, working_set)
            {
                return Err(OpChildError::DuplicateValidator(
                    validator.operator_address.to_string(),
                ));
            }
            let cons_addr = validator.consensus_pubkey.cons_address();
            if self
                .validators_by_cons_addr
                .contains(&cons_addr, working_set)
            {
                return Err(OpChildError::DuplicateValidator(cons_addr.to_string()));
            }
            if validator.cons_power <= 0 {
                return Err(OpChildError::InvalidParams(format!(
                    "genesis validator {} has non-positive power {}",
                    validator.operator_address, validator.cons_power
                )));
            }
            self.ensure_pubkey_allowed(&validator.consensus_pubkey)?;
            self.set_validator(validator, working_set);
        }

        let updates = if config.exported {
            let mut updates = Vec::with_capacity(config.last_validator_powers.len());
            for last in &config.last_validator_powers {
                let validator = self
                    .validators
                    .get(&last.address, working_set)
                    .ok_or_else(|| OpChildError::ValidatorNotFound(last.address.to_string()))?;
                self.last_validator_powers
                    .set(&last.address, &last.power, working_set);
                updates.push(ValidatorUpdate {
                    pub_key: validator.consensus_pubkey,
                    power: last.power,
                });
            }
            updates
        } else {
            self.apply_and_return_validator_set_updates(working_set)?
        };

        if let Some(bridge_info) = &config.bridge_info {
            bridge_info.validate()?;
            self.bridge_info.set(bridge_info, working_set);
        }
        for sequence in &config.finalized_l1_sequences {
            self.finalized_l1_sequences.set(sequence, &true, working_set);
        }
        for pair in &config.denom_pairs {
            self.denom_pairs
                .set(&pair.denom, &pair.base_denom, working_set);
        }
        for entry in &config.withdrawal_commitments {
            self.withdrawal_commitments
                .set(&entry.sequence, &entry.commitment, working_set);
        }

        tracing::info!(
            validators = config.validators.len(),
            exported = config.exported,
            "OPChild genesis"
        );
        Ok(updates)
    }

    /// Reads the module state back into a config [`OpChild::genesis`] can
    /// import.
    pub fn export_genesis(&self, working_set: &WorkingSet<S>) -> Result<OpChildConfig, OpChildError> {
        let last_validator_powers = self
            .last_validator_powers
            .iter(working_set)?
            .into_iter()
            .map(|(address, power)| LastValidatorPower { address, power })
            .collect();
        let finalized_l1_sequences = self
            .finalized_l1_sequences
            .iter(working_set)?
            .into_iter()
            .filter_map(|(sequence, finalized)| finalized.then_some(sequence))
            .collect();
        let withdrawal_commitments = self
            .withdrawal_commitments
            .iter(working_set)?
            .into_iter()
            .map(|(sequence, commitment)| WithdrawalCommitmentEntry {
                sequence,
                commitment,
            })
            .collect();

        Ok(OpChildConfig {
            params: self.get_params(working_set)?,
            validators: self.validators(working_set)?,
            last_validator_powers,
            exported: true,
            bridge_info: self.bridge_info.get(working_set),
            finalized_l1_sequences,
            next_l2_sequence: self.get_next_l2_sequence(working_set),
            denom_pairs: self.denom_pairs(working_set)?,
            withdrawal_commitments,
        })
    }
}

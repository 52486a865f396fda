use opchild_state::{Event, Storage, WorkingSet};

use crate::address::{AccAddress, ValAddress};
use crate::call::CallResponse;
use crate::events::*;
use crate::header::Header;
use crate::pubkey::PubKey;
use crate::types::{HistoricalInfo, Validator, ValidatorUpdate};
use crate::{OpChild, OpChildError};

impl<S: Storage> OpChild<S> {
    pub(crate) fn add_validator(
        &self,
        authority: &str,
        moniker: String,
        validator_address: &str,
        pubkey: PubKey,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        self.ensure_authority(authority)?;
        let operator = ValAddress::parse(validator_address)?;

        if self.validators.contains(&operator, working_set) {
            return Err(OpChildError::DuplicateValidator(operator.to_string()));
        }
        let cons_addr = pubkey.cons_address();
        if self
            .validators_by_cons_addr
            .contains(&cons_addr, working_set)
        {
            return Err(OpChildError::DuplicateValidator(cons_addr.to_string()));
        }
        self.ensure_pubkey_allowed(&pubkey)?;

        let validator = Validator {
            moniker,
            operator_address: operator.clone(),
            consensus_pubkey: pubkey,
            cons_power: 1,
        };
        self.set_validator(&validator, working_set);

        working_set.emit_event(
            Event::new(EVENT_ADD_VALIDATOR)
                .with_attribute(ATTR_VALIDATOR, &operator)
                .with_attribute(ATTR_MONIKER, &validator.moniker),
        );
        tracing::info!(validator = %operator, moniker = %validator.moniker, "Added validator");
        Ok(CallResponse::Empty)
    }

    /// Tombstones a validator; it leaves the registry at the next end block.
    pub(crate) fn remove_validator(
        &self,
        authority: &str,
        validator_address: &str,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        self.ensure_authority(authority)?;
        let operator = ValAddress::parse(validator_address)?;

        let mut validator = self
            .validators
            .get(&operator, working_set)
            .ok_or_else(|| OpChildError::ValidatorNotFound(operator.to_string()))?;
        validator.cons_power = 0;
        self.validators.set(&operator, &validator, working_set);

        working_set.emit_event(
            Event::new(EVENT_REMOVE_VALIDATOR).with_attribute(ATTR_VALIDATOR, &operator),
        );
        tracing::info!(validator = %operator, "Removed validator");
        Ok(CallResponse::Empty)
    }

    pub(crate) fn ensure_pubkey_allowed(&self, pubkey: &PubKey) -> Result<(), OpChildError> {
        let allowed = self.keepers.consensus.allowed_pubkey_types();
        if !allowed.iter().any(|t| t == pubkey.key_type()) {
            return Err(OpChildError::UnsupportedPubKey(pubkey.key_type().to_owned()));
        }
        Ok(())
    }

    /// Writes the validator and its consensus address index.
    pub(crate) fn set_validator(&self, validator: &Validator, working_set: &mut WorkingSet<S>) {
        self.validators
            .set(&validator.operator_address, validator, working_set);
        self.validators_by_cons_addr.set(
            &validator.consensus_pubkey.cons_address(),
            &validator.operator_address,
            working_set,
        );
    }

    /// Removes the validator. The consensus address index is left alone when
    /// a rotation already handed the key to another operator.
    pub(crate) fn delete_validator(&self, validator: &Validator, working_set: &mut WorkingSet<S>) {
        self.validators
            .delete(&validator.operator_address, working_set);
        let cons_addr = validator.consensus_pubkey.cons_address();
        if self.validators_by_cons_addr.get(&cons_addr, working_set).as_ref()
            == Some(&validator.operator_address)
        {
            self.validators_by_cons_addr.delete(&cons_addr, working_set);
        }
    }

    /// Whether `address` is the account of a registered validator.
    pub(crate) fn is_validator_account(
        &self,
        address: &AccAddress,
        working_set: &WorkingSet<S>,
    ) -> bool {
        self.validators
            .contains(&ValAddress::from(address), working_set)
    }

    /// Diffs the current validators against the powers last reported to
    /// consensus and returns the updates to apply.
    ///
    /// Validators with a positive power are reported when their power
    /// changed. Validators that were reported before but are no longer
    /// bonded are deleted from the registry and reported with power zero.
    pub(crate) fn apply_and_return_validator_set_updates(
        &self,
        working_set: &mut WorkingSet<S>,
    ) -> Result<Vec<ValidatorUpdate>, OpChildError> {
        let max_validators = self.get_params(working_set)?.max_validators as usize;
        let mut last = self.last_validator_powers.iter(working_set)?;
        let mut updates = Vec::new();

        for (cons_addr, pub_key) in self.retired_consensus_keys.iter(working_set)? {
            self.retired_consensus_keys.delete(&cons_addr, working_set);
            updates.push(ValidatorUpdate { pub_key, power: 0 });
        }

        let mut bonded = Vec::new();
        for (operator, validator) in self.validators.iter(working_set)? {
            if !validator.is_tombstoned() {
                bonded.push(validator);
            } else if !last.iter().any(|(addr, _)| addr == &operator) {
                // Never reported to consensus, so there is nothing to retract.
                self.delete_validator(&validator, working_set);
            }
        }

        for validator in bonded.into_iter().take(max_validators) {
            let operator = &validator.operator_address;
            let power = validator.cons_power;
            let previous = last
                .iter()
                .position(|(addr, _)| addr == operator)
                .map(|i| last.remove(i).1);

            if previous != Some(power) {
                updates.push(ValidatorUpdate {
                    pub_key: validator.consensus_pubkey.clone(),
                    power,
                });
                self.last_validator_powers.set(operator, &power, working_set);
            }
        }

        // What is left of `last` is no longer bonded.
        last.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
        for (operator, _) in last {
            self.last_validator_powers.delete(&operator, working_set);
            match self.validators.get(&operator, working_set) {
                Some(validator) => {
                    self.delete_validator(&validator, working_set);
                    updates.push(ValidatorUpdate {
                        pub_key: validator.consensus_pubkey,
                        power: 0,
                    });
                }
                None => {
                    // Shutdown clears the registry but consensus keeps its set.
                    tracing::warn!(validator = %operator, "Departed validator missing from registry");
                }
            }
        }

        if !updates.is_empty() {
            tracing::info!(updates = updates.len(), "Validator set updates");
        }
        Ok(updates)
    }

    /// Validators with a last reported power, by power descending and then
    /// by operator address.
    pub(crate) fn last_validators(
        &self,
        working_set: &WorkingSet<S>,
    ) -> Result<Vec<Validator>, OpChildError> {
        let mut validators: Vec<(i64, Validator)> = Vec::new();
        for (operator, power) in self.last_validator_powers.iter(working_set)? {
            if let Some(validator) = self.validators.get(&operator, working_set) {
                validators.push((power, validator));
            }
        }
        validators.sort_by(|(pa, a), (pb, b)| {
            pb.cmp(pa)
                .then_with(|| a.operator_address.as_bytes().cmp(b.operator_address.as_bytes()))
        });
        Ok(validators.into_iter().map(|(_, v)| v).collect())
    }

    /// Prunes the historical ring down to `historical_entries` heights and
    /// records `header` with the current set at its height.
    pub(crate) fn track_historical_info(
        &self,
        header: &Header,
        working_set: &mut WorkingSet<S>,
    ) -> Result<(), OpChildError> {
        let entries = self.get_params(working_set)?.historical_entries as u64;
        let height = u64::try_from(header.height).unwrap_or_default();

        // Entries form one contiguous range, so walk down from the newest
        // height to prune and stop at the first gap.
        if let Some(mut to_prune) = height.checked_sub(entries) {
            loop {
                if self.historical_infos.get(&to_prune, working_set).is_none() {
                    break;
                }
                self.historical_infos.delete(&to_prune, working_set);
                match to_prune.checked_sub(1) {
                    Some(next) => to_prune = next,
                    None => break,
                }
            }
        }

        if entries == 0 {
            return Ok(());
        }

        let info = HistoricalInfo {
            header: header.clone(),
            valset: self.last_validators(working_set)?,
        };
        self.historical_infos.set(&height, &info, working_set);
        Ok(())
    }
}

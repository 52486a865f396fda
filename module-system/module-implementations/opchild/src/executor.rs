//! Scheduled rotation of the bridge executors and the validator identity.

use std::collections::BTreeMap;
use std::sync::{MutexGuard, PoisonError};

use opchild_state::{Event, Storage, WorkingSet};
use serde::{Deserialize, Serialize};

use crate::address::{AccAddress, ValAddress};
use crate::events::*;
use crate::pubkey::PubKey;
use crate::types::Validator;
use crate::{OpChild, OpChildError};

/// A plan as submitted by the operator, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorChangePlanRequest {
    pub proposal_id: u64,
    pub height: u64,
    /// Operator address of the validator that takes over.
    pub next_validator: String,
    pub moniker: String,
    /// `{"@type": ..., "key": ...}` form of the consensus key.
    pub cons_pubkey_json: String,
    pub info: String,
    pub next_executors: Vec<String>,
}

/// A validated plan, applied at the begin block of `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorChangePlan {
    pub proposal_id: u64,
    pub height: u64,
    pub next_validator: Validator,
    pub next_executors: Vec<AccAddress>,
    pub info: String,
}

impl ExecutorChangePlanRequest {
    fn validate(self) -> Result<ExecutorChangePlan, OpChildError> {
        let invalid = |msg: String| OpChildError::InvalidExecutorChangePlan(msg);

        if self.proposal_id == 0 {
            return Err(invalid("proposal id must be non-zero".to_owned()));
        }
        if self.height == 0 {
            return Err(invalid("height must be non-zero".to_owned()));
        }
        let operator = ValAddress::parse(&self.next_validator)
            .map_err(|e| invalid(format!("next validator: {e}")))?;
        let pubkey = PubKey::from_json(&self.cons_pubkey_json)
            .map_err(|e| invalid(format!("consensus pubkey: {e}")))?;
        if self.next_executors.is_empty() {
            return Err(invalid("no next executors".to_owned()));
        }
        let next_executors = self
            .next_executors
            .iter()
            .map(|executor| AccAddress::parse(executor))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(format!("next executor: {e}")))?;

        Ok(ExecutorChangePlan {
            proposal_id: self.proposal_id,
            height: self.height,
            next_validator: Validator {
                moniker: self.moniker,
                operator_address: operator,
                consensus_pubkey: pubkey,
                cons_power: 1,
            },
            next_executors,
            info: self.info,
        })
    }
}

impl<S: Storage> OpChild<S> {
    pub(crate) fn plans(&self) -> MutexGuard<'_, BTreeMap<u64, ExecutorChangePlan>> {
        // Plans are only ever inserted or removed whole.
        self.executor_change_plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules an executor change. Only one plan may target a height.
    pub fn register_executor_change_plan(
        &self,
        request: ExecutorChangePlanRequest,
    ) -> Result<(), OpChildError> {
        let plan = request.validate()?;
        self.ensure_pubkey_allowed(&plan.next_validator.consensus_pubkey)
            .map_err(|e| OpChildError::InvalidExecutorChangePlan(e.to_string()))?;

        let mut plans = self.plans();
        if plans.contains_key(&plan.height) {
            return Err(OpChildError::InvalidExecutorChangePlan(format!(
                "a plan is already scheduled at height {}",
                plan.height
            )));
        }
        tracing::info!(
            proposal_id = plan.proposal_id,
            height = plan.height,
            validator = %plan.next_validator.operator_address,
            "Registered executor change plan"
        );
        plans.insert(plan.height, plan);
        Ok(())
    }

    /// Applies the plan scheduled at `height`, if any: every current
    /// validator is tombstoned, the next validator joins with power 1 and
    /// the bridge executors are replaced.
    pub(crate) fn apply_executor_change_plan(
        &self,
        height: u64,
        working_set: &mut WorkingSet<S>,
    ) -> Result<bool, OpChildError> {
        let Some(plan) = self.plans().get(&height).cloned() else {
            return Ok(false);
        };

        for (operator, mut validator) in self.validators.iter(working_set)? {
            validator.cons_power = 0;
            self.validators.set(&operator, &validator, working_set);
        }
        self.rotate_consensus_key(&plan.next_validator, working_set);
        self.set_validator(&plan.next_validator, working_set);

        let mut params = self.get_params(working_set)?;
        params.bridge_executors = plan.next_executors.iter().map(ToString::to_string).collect();
        self.params.set(&params, working_set);

        working_set.emit_event(
            Event::new(EVENT_EXECUTOR_CHANGE)
                .with_attribute(ATTR_PROPOSAL_ID, plan.proposal_id)
                .with_attribute(ATTR_HEIGHT, height)
                .with_attribute(ATTR_VALIDATOR, &plan.next_validator.operator_address)
                .with_attribute(ATTR_NEXT_EXECUTORS, params.bridge_executors.join(",")),
        );
        tracing::info!(
            proposal_id = plan.proposal_id,
            height,
            validator = %plan.next_validator.operator_address,
            "Applied executor change plan"
        );

        self.plans().remove(&height);
        Ok(true)
    }

    /// When the next validator is already registered under another key, the
    /// old key is queued for retraction and the operator is reported again
    /// with its new key.
    fn rotate_consensus_key(&self, next: &Validator, working_set: &mut WorkingSet<S>) {
        let Some(current) = self.validators.get(&next.operator_address, working_set) else {
            return;
        };
        if current.consensus_pubkey == next.consensus_pubkey {
            return;
        }

        let old_cons_addr = current.consensus_pubkey.cons_address();
        if self.validators_by_cons_addr.get(&old_cons_addr, working_set).as_ref()
            == Some(&next.operator_address)
        {
            self.validators_by_cons_addr.delete(&old_cons_addr, working_set);
        }
        if self
            .last_validator_powers
            .remove(&next.operator_address, working_set)
            .is_some()
        {
            self.retired_consensus_keys
                .set(&old_cons_addr, &current.consensus_pubkey, working_set);
        }
        tracing::info!(
            validator = %next.operator_address,
            "Rotating consensus key of validator"
        );
    }
}

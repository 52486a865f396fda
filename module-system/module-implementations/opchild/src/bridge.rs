use opchild_state::{Event, Storage, WorkingSet};

use crate::address::AccAddress;
use crate::call::CallResponse;
use crate::capabilities::{Context, MessageRouter};
use crate::commitment::withdrawal_commitment;
use crate::events::*;
use crate::types::{Coin, Timestamp, WithdrawalCommitment};
use crate::{OpChild, OpChildError};

/// A deposit relayed from L1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub sender: String,
    pub from: String,
    pub to: String,
    pub amount: Coin,
    pub base_denom: String,
    pub sequence: u64,
    pub height: u64,
    pub data: Vec<u8>,
}

impl<S: Storage> OpChild<S> {
    /// The checks a deposit must pass before it touches any state: a bridge
    /// executor sent it, the coin is well formed and its L1 sequence is new.
    pub(crate) fn check_deposit(
        &self,
        deposit: &Deposit,
        working_set: &WorkingSet<S>,
    ) -> Result<AccAddress, OpChildError> {
        let sender = AccAddress::parse(&deposit.sender)?;
        let params = self.get_params(working_set)?;
        if !params.is_bridge_executor(&sender) {
            return Err(OpChildError::Unauthorized(format!(
                "{sender} is not a bridge executor"
            )));
        }

        let to = AccAddress::parse(&deposit.to)?;
        deposit.amount.validate()?;
        if deposit.base_denom.is_empty() {
            return Err(OpChildError::InvalidAmount("empty base denom".to_owned()));
        }
        if deposit.sequence == 0 {
            return Err(OpChildError::InvalidSequence(
                "l1 sequence must be non-zero".to_owned(),
            ));
        }
        if self.is_finalized(deposit.sequence, working_set) {
            return Err(OpChildError::AlreadyFinalized(deposit.sequence));
        }
        if let Some(existing) = self.denom_pairs.get(&deposit.amount.denom, working_set) {
            if existing != deposit.base_denom {
                return Err(OpChildError::DenomPairMismatch {
                    denom: deposit.amount.denom.clone(),
                    existing,
                    given: deposit.base_denom.clone(),
                });
            }
        }

        Ok(to)
    }

    pub(crate) fn finalize_token_deposit(
        &self,
        deposit: Deposit,
        context: &Context,
        router: &dyn MessageRouter<S>,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        let to = self.check_deposit(&deposit, working_set)?;

        if deposit.amount.is_zero() {
            // An empty deposit only asks for the account to exist.
            if !self.keepers.accounts.has_account(&to, working_set) {
                self.keepers.accounts.create_account(&to, working_set)?;
            }
        } else {
            self.keepers.bank.mint_coins(&deposit.amount, working_set)?;
            self.keepers
                .bank
                .send_from_module(&to, &deposit.amount, working_set)?;
        }

        self.finalized_l1_sequences
            .set(&deposit.sequence, &true, working_set);
        self.denom_pairs
            .set(&deposit.amount.denom, &deposit.base_denom, working_set);

        let mut event = Event::new(EVENT_FINALIZE_TOKEN_DEPOSIT)
            .with_attribute(ATTR_L1_SEQUENCE, deposit.sequence)
            .with_attribute(ATTR_SENDER, &deposit.from)
            .with_attribute(ATTR_RECIPIENT, &deposit.to)
            .with_attribute(ATTR_DENOM, &deposit.amount.denom)
            .with_attribute(ATTR_BASE_DENOM, &deposit.base_denom)
            .with_attribute(ATTR_AMOUNT, deposit.amount.amount)
            .with_attribute(ATTR_FINALIZE_HEIGHT, deposit.height);

        let hook_max_gas = self.get_params(working_set)?.hook_max_gas;
        let hook_success = if !deposit.data.is_empty() && hook_max_gas > 0 {
            let outcome = self.run_hook(&deposit.data, hook_max_gas, context, router, working_set)?;
            event = event.with_attribute(ATTR_HOOK_SUCCESS, outcome.success);
            if let Some(reason) = &outcome.reason {
                event = event.with_attribute(ATTR_HOOK_REASON, reason);
            }
            Some(outcome.success)
        } else {
            None
        };

        working_set.emit_event(event);
        tracing::info!(
            l1_sequence = deposit.sequence,
            recipient = %deposit.to,
            amount = %deposit.amount,
            ?hook_success,
            "Finalized token deposit"
        );

        Ok(CallResponse::Deposit { hook_success })
    }

    /// Burns `amount` from `sender` and stores the commitment L1 will prove
    /// the withdrawal against. Returns the withdrawal's L2 sequence.
    pub(crate) fn initiate_token_withdrawal(
        &self,
        sender: &str,
        to: &str,
        amount: Coin,
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> Result<u64, OpChildError> {
        let sender_addr = AccAddress::parse(sender)?;
        amount.validate_positive()?;
        if to.is_empty() {
            return Err(OpChildError::invalid_address(to, "empty l1 receiver"));
        }
        let base_denom = self
            .denom_pairs
            .get(&amount.denom, working_set)
            .ok_or_else(|| OpChildError::UnknownDenom(amount.denom.clone()))?;

        let sequence = self.get_next_l2_sequence(working_set);
        self.next_l2_sequence.set(&(sequence + 1), working_set);

        self.keepers
            .bank
            .send_to_module(&sender_addr, &amount, working_set)?;
        self.keepers.bank.burn_coins(&amount, working_set)?;

        let commitment = WithdrawalCommitment {
            commitment: withdrawal_commitment(sequence, to, &amount),
            submit_time: context.time,
        };
        self.withdrawal_commitments
            .set(&sequence, &commitment, working_set);

        working_set.emit_event(
            Event::new(EVENT_INITIATE_TOKEN_WITHDRAWAL)
                .with_attribute(ATTR_FROM, sender)
                .with_attribute(ATTR_TO, to)
                .with_attribute(ATTR_DENOM, &amount.denom)
                .with_attribute(ATTR_BASE_DENOM, &base_denom)
                .with_attribute(ATTR_AMOUNT, amount.amount)
                .with_attribute(ATTR_L2_SEQUENCE, sequence),
        );
        tracing::info!(l2_sequence = sequence, from = sender, to, amount = %amount, "Initiated token withdrawal");

        Ok(sequence)
    }

    /// Evicts commitments older than twice the finalization period, oldest
    /// first, stopping at the first one still live.
    pub(crate) fn prune_withdrawal_commitments(
        &self,
        now: Timestamp,
        working_set: &mut WorkingSet<S>,
    ) -> Result<usize, OpChildError> {
        let Some(bridge_info) = self.bridge_info.get(working_set) else {
            return Ok(0);
        };
        let retention = bridge_info
            .bridge_config
            .finalization_period_secs
            .saturating_mul(2)
            .min(i64::MAX as u64) as i64;

        let expired = self
            .withdrawal_commitments
            .entries(working_set)
            .take_while(|entry| match entry {
                Ok((_, commitment)) => {
                    now.seconds > commitment.submit_time.seconds.saturating_add(retention)
                }
                Err(_) => true,
            })
            .map(|entry| entry.map(|(sequence, _)| sequence))
            .collect::<Result<Vec<u64>, _>>()?;

        let pruned = expired.len();
        for sequence in expired {
            self.withdrawal_commitments.delete(&sequence, working_set);
        }

        if pruned > 0 {
            tracing::debug!(pruned, "Pruned withdrawal commitments");
        }
        Ok(pruned)
    }
}

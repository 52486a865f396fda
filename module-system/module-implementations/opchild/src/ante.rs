//! Mempool-side checks and lane matchers.

use std::sync::Arc;

use opchild_state::{Storage, WorkingSet};

use crate::call::{CallMessage, MSG_FINALIZE_TOKEN_DEPOSIT, MSG_UPDATE_ORACLE};
use crate::capabilities::{AnteHandler, Context, Tx};
use crate::types::Params;
use crate::{OpChild, OpChildError};

impl<S: Storage> OpChild<S> {
    /// Fails with [`OpChildError::RedundantTx`] when the transaction carries
    /// deposits and every one of them is already finalized.
    pub fn check_redundant_bridge_tx(
        &self,
        tx: &Tx,
        working_set: &WorkingSet<S>,
    ) -> Result<(), OpChildError> {
        let mut deposits = 0usize;
        for msg in tx
            .messages
            .iter()
            .filter(|msg| msg.type_url == MSG_FINALIZE_TOKEN_DEPOSIT)
        {
            deposits += 1;
            let Ok(CallMessage::FinalizeTokenDeposit {
                sender,
                from,
                to,
                amount,
                base_denom,
                sequence,
                height,
                data,
            }) = CallMessage::from_any(msg)
            else {
                return Ok(());
            };
            let deposit = crate::bridge::Deposit {
                sender,
                from,
                to,
                amount,
                base_denom,
                sequence,
                height,
                data,
            };
            if !matches!(
                self.check_deposit(&deposit, working_set),
                Err(OpChildError::AlreadyFinalized(_))
            ) {
                return Ok(());
            }
        }

        if deposits > 0 {
            tracing::debug!(deposits, "Rejecting redundant bridge tx");
            return Err(OpChildError::RedundantTx);
        }
        Ok(())
    }
}

/// Ante decorator rejecting relayed deposits that were all finalized
/// already. Only active in check and re-check mode.
pub struct RedundantBridgeDecorator<S: Storage> {
    opchild: Arc<OpChild<S>>,
    next: Arc<dyn AnteHandler<S>>,
}

impl<S: Storage> RedundantBridgeDecorator<S> {
    pub fn new(opchild: Arc<OpChild<S>>, next: Arc<dyn AnteHandler<S>>) -> Self {
        Self { opchild, next }
    }
}

impl<S: Storage> AnteHandler<S> for RedundantBridgeDecorator<S> {
    fn ante(
        &self,
        tx: &Tx,
        context: &Context,
        simulate: bool,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        if context.is_check_tx() && !simulate {
            self.opchild.check_redundant_bridge_tx(tx, working_set)?;
        }
        self.next.ante(tx, context, simulate, working_set)
    }
}

/// Transactions made only of oracle updates go to the system lane.
pub fn is_system_lane_tx(tx: &Tx) -> bool {
    !tx.messages.is_empty() && tx.messages.iter().all(|msg| msg.type_url == MSG_UPDATE_ORACLE)
}

/// Transactions signed only by whitelisted accounts go to the free lane.
pub fn is_free_lane_tx(tx: &Tx, params: &Params) -> bool {
    !tx.signers.is_empty()
        && tx
            .signers
            .iter()
            .all(|signer| params.is_fee_whitelisted(signer))
}

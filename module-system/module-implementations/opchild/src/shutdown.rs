use opchild_state::{Event, Storage, WorkingSet};

use crate::address::to_bech32;
use crate::capabilities::Context;
use crate::events::*;
use crate::{OpChild, OpChildError};

impl<S: Storage> OpChild<S> {
    /// Dissolves the bridge side of the rollup.
    ///
    /// Every balance of a bridged denom is withdrawn to the L1 account with
    /// the same bytes as its holder, and the validator registry is emptied.
    /// Running it again finds nothing left to do.
    pub(crate) fn shutdown(
        &self,
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> Result<(), OpChildError> {
        let l1_hrp = self
            .bridge_info
            .get_or_err(working_set)?
            .l1_hrp()?;

        let mut withdrawals = 0usize;
        for (holder, coin) in self.keepers.bank.all_balances(working_set)? {
            if coin.is_zero() || !self.denom_pairs.contains(&coin.denom, working_set) {
                continue;
            }
            let receiver = to_bech32(&l1_hrp, holder.as_bytes())?;
            self.initiate_token_withdrawal(
                &holder.to_string(),
                &receiver,
                coin,
                context,
                working_set,
            )?;
            withdrawals += 1;
        }

        let validators = self.validators.keys(working_set)?.len();
        self.validators.clear(working_set);
        self.validators_by_cons_addr.clear(working_set);

        if withdrawals > 0 || validators > 0 {
            working_set.emit_event(
                Event::new(EVENT_SHUTDOWN)
                    .with_attribute(ATTR_MESSAGES, withdrawals)
                    .with_attribute(ATTR_HEIGHT, context.height),
            );
        }
        tracing::info!(withdrawals, validators, "Shut down bridge");
        Ok(())
    }
}

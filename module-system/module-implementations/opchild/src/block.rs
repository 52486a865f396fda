use opchild_state::{Storage, WorkingSet};

use crate::capabilities::Context;
use crate::header::Header;
use crate::types::ValidatorUpdate;
use crate::{OpChild, OpChildError};

impl<S: Storage> OpChild<S> {
    /// Runs at the beginning of every block, before any transaction.
    pub fn begin_block(
        &self,
        context: &Context,
        header: &Header,
        working_set: &mut WorkingSet<S>,
    ) -> Result<(), OpChildError> {
        self.track_historical_info(header, working_set)?;
        self.prune_withdrawal_commitments(context.time, working_set)?;
        self.apply_executor_change_plan(context.height, working_set)?;
        Ok(())
    }

    /// Runs at the end of every block and returns the validator updates to
    /// hand to consensus.
    pub fn end_block(
        &self,
        _context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> Result<Vec<ValidatorUpdate>, OpChildError> {
        self.apply_and_return_validator_set_updates(working_set)
    }
}

//! Execution of deposit hooks.
//!
//! A hook is a transaction carried by a deposit. It runs after the deposit
//! has been applied, inside its own branch and under its own gas meter, and
//! its failure never reverts the deposit.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use opchild_state::{GasMeter, Storage, WorkingSet};

use crate::capabilities::{Context, ExecMode, MessageRouter};
use crate::{OpChild, OpChildError};

/// Longest failure reason kept, in bytes.
pub const MAX_HOOK_REASON_LEN: usize = 128;

/// The result of running a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    pub success: bool,
    pub reason: Option<String>,
    pub gas_used: u64,
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_HOOK_REASON_LEN {
        return reason.to_owned();
    }
    let mut end = MAX_HOOK_REASON_LEN;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_owned()
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_owned()
    }
}

impl<S: Storage> OpChild<S> {
    /// Runs the hook `data` with at most `hook_max_gas` gas.
    ///
    /// The hook's gas, capped at its limit, is charged to the caller's meter
    /// whatever the outcome. Only an error from that final charge is
    /// returned; hook failures are reported in the outcome.
    pub(crate) fn run_hook(
        &self,
        data: &[u8],
        hook_max_gas: u64,
        context: &Context,
        router: &dyn MessageRouter<S>,
        working_set: &mut WorkingSet<S>,
    ) -> Result<HookOutcome, OpChildError> {
        let limit = working_set.gas_meter().remaining().min(hook_max_gas);
        let parent_meter = working_set.replace_gas_meter(GasMeter::new(limit));

        let depth = working_set.branch_depth();
        working_set.branch();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute_hook(data, context, router, working_set)
        }));

        // A panic may leave branches of the hook's own open.
        while working_set.branch_depth() > depth + 1 {
            working_set.discard_branch()?;
        }

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(payload) => Some(panic_reason(payload.as_ref())),
        };
        match failure {
            None => working_set.commit_branch()?,
            Some(_) => working_set.discard_branch()?,
        }

        let hook_meter = working_set.replace_gas_meter(parent_meter);
        let gas_used = hook_meter.consumed_to_limit();
        working_set.charge_gas(gas_used, "deposit hook")?;

        let outcome = HookOutcome {
            success: failure.is_none(),
            reason: failure.as_deref().map(truncate_reason),
            gas_used,
        };
        if let Some(reason) = &outcome.reason {
            tracing::warn!(%reason, gas_used, "Deposit hook failed");
        } else {
            tracing::debug!(gas_used, "Deposit hook succeeded");
        }
        Ok(outcome)
    }

    fn execute_hook(
        &self,
        data: &[u8],
        context: &Context,
        router: &dyn MessageRouter<S>,
        working_set: &mut WorkingSet<S>,
    ) -> Result<(), OpChildError> {
        let tx = self
            .keepers
            .tx_decoder
            .decode(data)
            .map_err(|e| OpChildError::Codec(format!("failed to decode hook tx: {e}")))?;

        let hook_context = context.clone().with_exec_mode(ExecMode::Deliver);
        self.keepers
            .ante
            .ante(&tx, &hook_context, false, working_set)?;

        for msg in &tx.messages {
            router.dispatch(msg, &hook_context, working_set)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_cut_on_char_boundaries() {
        let long = "é".repeat(100);
        let cut = truncate_reason(&long);
        assert!(cut.len() <= MAX_HOOK_REASON_LEN);
        assert!(long.starts_with(&cut));
        assert_eq!(truncate_reason("short"), "short");
    }
}

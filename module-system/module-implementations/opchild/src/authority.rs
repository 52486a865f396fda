use opchild_state::{Event, Storage, WorkingSet};

use crate::address::AccAddress;
use crate::call::{CallResponse, LegacyContent};
use crate::capabilities::{AnyMsg, Context, MessageRouter};
use crate::events::*;
use crate::types::{BridgeInfo, Coin, Params};
use crate::{OpChild, OpChildError};

impl<S: Storage> OpChild<S> {
    pub(crate) fn update_params(
        &self,
        authority: &str,
        params: Params,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        self.ensure_authority(authority)?;
        params.validate()?;
        self.params.set(&params, working_set);

        working_set.emit_event(Event::new(EVENT_UPDATE_PARAMS));
        tracing::info!(?params, "Updated params");
        Ok(CallResponse::Empty)
    }

    pub(crate) fn spend_fee_pool(
        &self,
        authority: &str,
        recipient: &str,
        amount: Vec<Coin>,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        self.ensure_authority(authority)?;
        let recipient_addr = AccAddress::parse(recipient)?;
        for coin in &amount {
            coin.validate_positive()?;
        }

        self.keepers
            .bank
            .spend_from_fee_collector(&recipient_addr, &amount, working_set)?;

        let amount_str = amount
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        working_set.emit_event(
            Event::new(EVENT_SPEND_FEE_POOL)
                .with_attribute(ATTR_RECIPIENT, recipient)
                .with_attribute(ATTR_AMOUNT, &amount_str),
        );
        tracing::info!(recipient, amount = %amount_str, "Spent fee pool");
        Ok(CallResponse::Empty)
    }

    /// Creates or updates the bridge info. The bridge identity (id, address
    /// and L1 chain) can not change once set. Observing the bridge as
    /// disabled shuts the rollup's bridge side down.
    pub(crate) fn set_bridge_info(
        &self,
        sender: &str,
        bridge_info: BridgeInfo,
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        AccAddress::parse(sender)?;
        bridge_info.validate()?;

        if let Some(current) = self.bridge_info.get(working_set) {
            if current.bridge_id != bridge_info.bridge_id
                || current.bridge_addr != bridge_info.bridge_addr
                || current.l1_chain_id != bridge_info.l1_chain_id
            {
                return Err(OpChildError::InvalidBridgeInfo(format!(
                    "bridge {} at {} on {} can not be replaced",
                    current.bridge_id, current.bridge_addr, current.l1_chain_id
                )));
            }
        }

        self.bridge_info.set(&bridge_info, working_set);
        working_set.emit_event(
            Event::new(EVENT_SET_BRIDGE_INFO)
                .with_attribute(ATTR_BRIDGE_ID, bridge_info.bridge_id)
                .with_attribute(ATTR_BRIDGE_ADDR, &bridge_info.bridge_addr)
                .with_attribute(ATTR_L1_CHAIN_ID, &bridge_info.l1_chain_id)
                .with_attribute(ATTR_L1_CLIENT_ID, &bridge_info.l1_client_id),
        );
        tracing::info!(bridge_id = bridge_info.bridge_id, "Set bridge info");

        if bridge_info.bridge_config.bridge_disabled {
            self.shutdown(context, working_set)?;
        }
        Ok(CallResponse::Empty)
    }

    /// Routes `messages` through the host router as the module authority.
    /// Either every message succeeds or none has any effect.
    pub(crate) fn execute_messages(
        &self,
        sender: &str,
        messages: Vec<AnyMsg>,
        context: &Context,
        router: &dyn MessageRouter<S>,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        let sender_addr = AccAddress::parse(sender)?;
        let params = self.get_params(working_set)?;
        if !self.is_validator_account(&sender_addr, working_set) && !params.is_admin(&sender_addr)
        {
            return Err(OpChildError::Unauthorized(format!(
                "{sender_addr} is neither a validator nor the admin"
            )));
        }
        if messages.is_empty() {
            return Err(OpChildError::InvalidExecuteMsg("no messages".to_owned()));
        }

        for msg in &messages {
            let signers = router
                .signers(msg)
                .map_err(|e| OpChildError::InvalidExecuteMsg(format!("{}: {e}", msg.type_url)))?;
            if signers.as_slice() != std::slice::from_ref(&self.authority) {
                return Err(OpChildError::Unauthorized(format!(
                    "{} must be signed by the authority {} alone",
                    msg.type_url, self.authority
                )));
            }
        }

        working_set.with_branch(|working_set| -> Result<(), OpChildError> {
            for msg in &messages {
                router.dispatch(msg, context, working_set)?;
            }
            Ok(())
        })?;

        working_set.emit_event(
            Event::new(EVENT_EXECUTE_MESSAGES)
                .with_attribute(ATTR_SENDER, sender)
                .with_attribute(ATTR_MESSAGES, messages.len()),
        );
        tracing::info!(sender, messages = messages.len(), "Executed authority messages");
        Ok(CallResponse::Empty)
    }

    pub(crate) fn execute_legacy_contents(
        &self,
        sender: &str,
        contents: Vec<LegacyContent>,
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        AccAddress::parse(sender)?;

        working_set.with_branch(|working_set| -> Result<(), OpChildError> {
            for content in &contents {
                self.legacy_router
                    .dispatch(&content.route, context, &content.data, working_set)?;
            }
            Ok(())
        })?;

        working_set.emit_event(
            Event::new(EVENT_EXECUTE_LEGACY_CONTENTS)
                .with_attribute(ATTR_SENDER, sender)
                .with_attribute(ATTR_MESSAGES, contents.len()),
        );
        Ok(CallResponse::Empty)
    }
}

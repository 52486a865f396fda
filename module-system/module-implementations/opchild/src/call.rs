use borsh::{BorshDeserialize, BorshSerialize};
use opchild_state::{Storage, WorkingSet};
use serde::{Deserialize, Serialize};

use crate::capabilities::{AnyMsg, Context, CurrencyPair, MessageRouter};
use crate::pubkey::PubKey;
use crate::types::{BridgeInfo, Coin, Params};
use crate::{OpChild, OpChildError};

pub const MSG_FINALIZE_TOKEN_DEPOSIT: &str = "/opinit.opchild.v1.MsgFinalizeTokenDeposit";
pub const MSG_INITIATE_TOKEN_WITHDRAWAL: &str = "/opinit.opchild.v1.MsgInitiateTokenWithdrawal";
pub const MSG_ADD_VALIDATOR: &str = "/opinit.opchild.v1.MsgAddValidator";
pub const MSG_REMOVE_VALIDATOR: &str = "/opinit.opchild.v1.MsgRemoveValidator";
pub const MSG_UPDATE_PARAMS: &str = "/opinit.opchild.v1.MsgUpdateParams";
pub const MSG_SPEND_FEE_POOL: &str = "/opinit.opchild.v1.MsgSpendFeePool";
pub const MSG_SET_BRIDGE_INFO: &str = "/opinit.opchild.v1.MsgSetBridgeInfo";
pub const MSG_EXECUTE_MESSAGES: &str = "/opinit.opchild.v1.MsgExecuteMessages";
pub const MSG_EXECUTE_LEGACY_CONTENTS: &str = "/opinit.opchild.v1.MsgExecuteLegacyContents";
pub const MSG_UPDATE_ORACLE: &str = "/opinit.opchild.v1.MsgUpdateOracle";

/// A governance content routed through the legacy router.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct LegacyContent {
    pub route: String,
    pub data: Vec<u8>,
}

/// This enumeration represents the available call messages for interacting
/// with the OPChild module.
///
/// Addresses are carried as bech32 strings and parsed by the handlers.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum CallMessage {
    /// Mints an L1 deposit on L2. Only a bridge executor may send it.
    FinalizeTokenDeposit {
        sender: String,
        /// L1 depositor, kept verbatim.
        from: String,
        to: String,
        amount: Coin,
        /// The L1 denom `amount.denom` was bridged from.
        base_denom: String,
        sequence: u64,
        /// L1 height the deposit was observed at.
        height: u64,
        /// Optional hook transaction.
        data: Vec<u8>,
    },
    /// Burns `amount` from `sender` and commits to its release on L1.
    InitiateTokenWithdrawal {
        sender: String,
        /// L1 receiver, kept verbatim.
        to: String,
        amount: Coin,
    },
    AddValidator {
        authority: String,
        moniker: String,
        validator_address: String,
        pubkey: PubKey,
    },
    RemoveValidator {
        authority: String,
        validator_address: String,
    },
    UpdateParams {
        authority: String,
        params: Params,
    },
    SpendFeePool {
        authority: String,
        recipient: String,
        amount: Vec<Coin>,
    },
    SetBridgeInfo {
        sender: String,
        bridge_info: BridgeInfo,
    },
    /// Runs messages signed by the module authority.
    ExecuteMessages {
        sender: String,
        messages: Vec<AnyMsg>,
    },
    ExecuteLegacyContents {
        sender: String,
        contents: Vec<LegacyContent>,
    },
    /// Relays L1 oracle votes; `data` is an encoded extended commit.
    UpdateOracle {
        sender: String,
        height: u64,
        data: Vec<u8>,
    },
}

impl CallMessage {
    pub fn type_url(&self) -> &'static str {
        match self {
            Self::FinalizeTokenDeposit { .. } => MSG_FINALIZE_TOKEN_DEPOSIT,
            Self::InitiateTokenWithdrawal { .. } => MSG_INITIATE_TOKEN_WITHDRAWAL,
            Self::AddValidator { .. } => MSG_ADD_VALIDATOR,
            Self::RemoveValidator { .. } => MSG_REMOVE_VALIDATOR,
            Self::UpdateParams { .. } => MSG_UPDATE_PARAMS,
            Self::SpendFeePool { .. } => MSG_SPEND_FEE_POOL,
            Self::SetBridgeInfo { .. } => MSG_SET_BRIDGE_INFO,
            Self::ExecuteMessages { .. } => MSG_EXECUTE_MESSAGES,
            Self::ExecuteLegacyContents { .. } => MSG_EXECUTE_LEGACY_CONTENTS,
            Self::UpdateOracle { .. } => MSG_UPDATE_ORACLE,
        }
    }

    /// The address expected to have signed the message.
    pub fn signer(&self) -> &str {
        match self {
            Self::FinalizeTokenDeposit { sender, .. }
            | Self::InitiateTokenWithdrawal { sender, .. }
            | Self::SetBridgeInfo { sender, .. }
            | Self::ExecuteMessages { sender, .. }
            | Self::ExecuteLegacyContents { sender, .. }
            | Self::UpdateOracle { sender, .. } => sender,
            Self::AddValidator { authority, .. }
            | Self::RemoveValidator { authority, .. }
            | Self::UpdateParams { authority, .. }
            | Self::SpendFeePool { authority, .. } => authority,
        }
    }

    pub fn to_any(&self) -> AnyMsg {
        let value = self.try_to_vec().expect("Failed to serialize call message");
        AnyMsg::new(self.type_url(), value)
    }

    /// Decodes a module message, checking that the payload matches its tag.
    pub fn from_any(msg: &AnyMsg) -> Result<Self, OpChildError> {
        if !is_module_message(&msg.type_url) {
            return Err(OpChildError::InvalidExecuteMsg(format!(
                "unknown message type {}",
                msg.type_url
            )));
        }
        let decoded = Self::try_from_slice(&msg.value)
            .map_err(|e| OpChildError::InvalidExecuteMsg(e.to_string()))?;
        if decoded.type_url() != msg.type_url {
            return Err(OpChildError::InvalidExecuteMsg(format!(
                "payload of {} tagged as {}",
                decoded.type_url(),
                msg.type_url
            )));
        }
        Ok(decoded)
    }
}

pub fn is_module_message(type_url: &str) -> bool {
    type_url.starts_with("/opinit.opchild.v1.Msg")
}

/// What a successful call produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallResponse {
    #[default]
    Empty,
    Deposit {
        /// `None` when no hook ran.
        hook_success: Option<bool>,
    },
    Withdrawal {
        l2_sequence: u64,
    },
    Oracle {
        updated: Vec<CurrencyPair>,
        /// Pairs whose stored price is not older than this update.
        rejected: Vec<CurrencyPair>,
    },
}

impl<S: Storage> OpChild<S> {
    /// Executes one message. Every message runs in its own branch of the
    /// working set, so a failed message leaves no trace.
    pub fn call(
        &self,
        msg: CallMessage,
        context: &Context,
        router: &dyn MessageRouter<S>,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        working_set.with_branch(|working_set| match msg {
            CallMessage::FinalizeTokenDeposit {
                sender,
                from,
                to,
                amount,
                base_denom,
                sequence,
                height,
                data,
            } => self.finalize_token_deposit(
                crate::bridge::Deposit {
                    sender,
                    from,
                    to,
                    amount,
                    base_denom,
                    sequence,
                    height,
                    data,
                },
                context,
                router,
                working_set,
            ),
            CallMessage::InitiateTokenWithdrawal { sender, to, amount } => {
                let l2_sequence =
                    self.initiate_token_withdrawal(&sender, &to, amount, context, working_set)?;
                Ok(CallResponse::Withdrawal { l2_sequence })
            }
            CallMessage::AddValidator {
                authority,
                moniker,
                validator_address,
                pubkey,
            } => self.add_validator(&authority, moniker, &validator_address, pubkey, working_set),
            CallMessage::RemoveValidator {
                authority,
                validator_address,
            } => self.remove_validator(&authority, &validator_address, working_set),
            CallMessage::UpdateParams { authority, params } => {
                self.update_params(&authority, params, working_set)
            }
            CallMessage::SpendFeePool {
                authority,
                recipient,
                amount,
            } => self.spend_fee_pool(&authority, &recipient, amount, working_set),
            CallMessage::SetBridgeInfo {
                sender,
                bridge_info,
            } => self.set_bridge_info(&sender, bridge_info, context, working_set),
            CallMessage::ExecuteMessages { sender, messages } => {
                self.execute_messages(&sender, messages, context, router, working_set)
            }
            CallMessage::ExecuteLegacyContents { sender, contents } => {
                self.execute_legacy_contents(&sender, contents, context, working_set)
            }
            CallMessage::UpdateOracle {
                sender,
                height,
                data,
            } => self.update_oracle(&sender, height, &data, context, working_set),
        })
    }
}

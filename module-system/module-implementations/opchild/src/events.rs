//! Event types and attribute keys emitted by the module.

pub const EVENT_FINALIZE_TOKEN_DEPOSIT: &str = "finalize_token_deposit";
pub const EVENT_INITIATE_TOKEN_WITHDRAWAL: &str = "initiate_token_withdrawal";
pub const EVENT_ADD_VALIDATOR: &str = "add_validator";
pub const EVENT_REMOVE_VALIDATOR: &str = "remove_validator";
pub const EVENT_UPDATE_PARAMS: &str = "update_params";
pub const EVENT_SPEND_FEE_POOL: &str = "spend_fee_pool";
pub const EVENT_UPDATE_ORACLE: &str = "update_oracle";
pub const EVENT_SET_BRIDGE_INFO: &str = "set_bridge_info";
pub const EVENT_EXECUTE_MESSAGES: &str = "execute_messages";
pub const EVENT_EXECUTE_LEGACY_CONTENTS: &str = "execute_legacy_contents";
pub const EVENT_EXECUTOR_CHANGE: &str = "executor_change";
pub const EVENT_SHUTDOWN: &str = "shutdown";

pub const ATTR_L1_SEQUENCE: &str = "l1_sequence";
pub const ATTR_L2_SEQUENCE: &str = "l2_sequence";
pub const ATTR_SENDER: &str = "sender";
pub const ATTR_RECIPIENT: &str = "recipient";
pub const ATTR_FROM: &str = "from";
pub const ATTR_TO: &str = "to";
pub const ATTR_DENOM: &str = "denom";
pub const ATTR_BASE_DENOM: &str = "base_denom";
pub const ATTR_AMOUNT: &str = "amount";
pub const ATTR_FINALIZE_HEIGHT: &str = "finalize_height";
pub const ATTR_HOOK_SUCCESS: &str = "hook_success";
pub const ATTR_HOOK_REASON: &str = "hook_reason";
pub const ATTR_VALIDATOR: &str = "validator";
pub const ATTR_MONIKER: &str = "moniker";
pub const ATTR_HEIGHT: &str = "height";
pub const ATTR_BRIDGE_ID: &str = "bridge_id";
pub const ATTR_BRIDGE_ADDR: &str = "bridge_addr";
pub const ATTR_L1_CHAIN_ID: &str = "l1_chain_id";
pub const ATTR_L1_CLIENT_ID: &str = "l1_client_id";
pub const ATTR_PROPOSAL_ID: &str = "proposal_id";
pub const ATTR_NEXT_EXECUTORS: &str = "next_executors";
pub const ATTR_PAIRS_UPDATED: &str = "pairs_updated";
pub const ATTR_PAIRS_REJECTED: &str = "pairs_rejected";
pub const ATTR_MESSAGES: &str = "messages";

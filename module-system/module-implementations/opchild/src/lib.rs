//! The OPChild module: the L2 half of an optimistic-rollup bridge.
//!
//! It finalizes deposits coming from L1, commits to withdrawals going back,
//! drives the L2 validator set from authority messages and ingests oracle
//! prices signed by the L1 validator set.

pub mod address;
mod ante;
mod authority;
mod block;
mod bridge;
pub mod call;
pub mod capabilities;
pub mod commitment;
mod error;
pub mod events;
mod executor;
pub mod genesis;
pub mod header;
pub mod keys;
mod legacy;
pub mod merkle;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod oracle;
pub mod pubkey;
pub mod query;
mod sandbox;
mod shutdown;
pub mod types;
mod validators;

use std::collections::BTreeMap;
use std::sync::Mutex;

pub use ante::{is_free_lane_tx, is_system_lane_tx, RedundantBridgeDecorator};
pub use bridge::Deposit;
pub use call::{CallMessage, CallResponse, LegacyContent};
pub use error::OpChildError;
pub use executor::{ExecutorChangePlan, ExecutorChangePlanRequest};
pub use genesis::OpChildConfig;
pub use legacy::{legacy_handler, LegacyHandler, LegacyRouter};
use opchild_state::{StateMap, StateValue, Storage};
pub use sandbox::HookOutcome;

use crate::address::{AccAddress, ConsAddress, ValAddress};
use crate::capabilities::Keepers;
use crate::keys::prefix;
use crate::pubkey::PubKey;
use crate::types::{BridgeInfo, HistoricalInfo, HostValidator, Params, Validator, WithdrawalCommitment};

/// The OPChild module.
///
/// All persistent state lives in the working set passed to each call, under
/// the prefixes listed in [`keys`]. Executor change plans are configuration
/// of the running node and are kept in memory.
pub struct OpChild<S: Storage> {
    /// The only signer accepted for authority messages.
    pub(crate) authority: AccAddress,

    pub(crate) keepers: Keepers<S>,

    pub(crate) legacy_router: LegacyRouter<S>,

    /// Registered plans, keyed by the height they apply at.
    pub(crate) executor_change_plans: Mutex<BTreeMap<u64, ExecutorChangePlan>>,

    pub(crate) next_l2_sequence: StateValue<u64>,

    pub(crate) finalized_l1_sequences: StateMap<u64, bool>,

    pub(crate) bridge_info: StateValue<BridgeInfo>,

    pub(crate) params: StateValue<Params>,

    /// Mirror of the L1 validator set, keyed by consensus address.
    pub(crate) host_validators: StateMap<ConsAddress, HostValidator>,

    pub(crate) host_height: StateValue<u64>,

    /// Powers as last reported to consensus.
    pub(crate) last_validator_powers: StateMap<ValAddress, i64>,

    pub(crate) validators: StateMap<ValAddress, Validator>,

    pub(crate) validators_by_cons_addr: StateMap<ConsAddress, ValAddress>,

    /// Consensus keys replaced by a rotation, retracted at the next end block.
    pub(crate) retired_consensus_keys: StateMap<ConsAddress, PubKey>,

    pub(crate) historical_infos: StateMap<u64, HistoricalInfo>,

    /// L2 denom to the L1 denom it was bridged from.
    pub(crate) denom_pairs: StateMap<String, String>,

    pub(crate) withdrawal_commitments: StateMap<u64, WithdrawalCommitment>,
}

impl<S: Storage> OpChild<S> {
    /// Creates the module. `legacy_router` is sealed here and can not gain
    /// routes afterwards.
    pub fn new(authority: AccAddress, keepers: Keepers<S>, mut legacy_router: LegacyRouter<S>) -> Self {
        legacy_router.seal();
        Self {
            authority,
            keepers,
            legacy_router,
            executor_change_plans: Mutex::new(BTreeMap::new()),
            next_l2_sequence: StateValue::new(prefix(keys::NEXT_L2_SEQUENCE)),
            finalized_l1_sequences: StateMap::new(prefix(keys::FINALIZED_L1_SEQUENCES)),
            bridge_info: StateValue::new(prefix(keys::BRIDGE_INFO)),
            params: StateValue::new(prefix(keys::PARAMS)),
            host_validators: StateMap::new(prefix(keys::HOST_VALIDATORS)),
            host_height: StateValue::new(prefix(keys::HOST_HEIGHT)),
            last_validator_powers: StateMap::new(prefix(keys::LAST_VALIDATOR_POWERS)),
            validators: StateMap::new(prefix(keys::VALIDATORS)),
            validators_by_cons_addr: StateMap::new(prefix(keys::VALIDATORS_BY_CONS_ADDR)),
            retired_consensus_keys: StateMap::new(prefix(keys::RETIRED_CONSENSUS_KEYS)),
            historical_infos: StateMap::new(prefix(keys::HISTORICAL_INFOS)),
            denom_pairs: StateMap::new(prefix(keys::DENOM_PAIRS)),
            withdrawal_commitments: StateMap::new(prefix(keys::WITHDRAWAL_COMMITMENTS)),
        }
    }

    pub fn authority(&self) -> &AccAddress {
        &self.authority
    }

    pub fn keepers(&self) -> &Keepers<S> {
        &self.keepers
    }

    /// Checks that `sender` is the module authority.
    pub(crate) fn ensure_authority(&self, sender: &str) -> Result<(), OpChildError> {
        let sender = AccAddress::parse(sender)?;
        if sender != self.authority {
            return Err(OpChildError::Unauthorized(format!(
                "expected {}, got {}",
                self.authority, sender
            )));
        }
        Ok(())
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::anyhow;
use ed25519_dalek::SigningKey;
use opchild::address::{to_bech32, AccAddress, ValAddress};
use opchild::capabilities::{BankKeeper, Context, Tx};
use opchild::mocks::{module_address, test_address, MockApp, MockHost};
use opchild::pubkey::PubKey;
use opchild::types::{
    BatchChainType, BatchInfo, BridgeConfig, BridgeInfo, Coin, Params, Timestamp, Validator,
};
use opchild::{
    legacy_handler, CallMessage, CallResponse, LegacyRouter, OpChild, OpChildConfig, OpChildError,
};
use opchild_state::{ProverStorage, Storage, WorkingSet};

pub type S = ProverStorage;

pub const CHAIN_ID: &str = "opchild-1";
pub const HOST_CHAIN_ID: &str = "l1-1";
pub const DENOM: &str = "umin";
pub const BASE_DENOM: &str = "uinit";

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn authority() -> AccAddress {
    module_address("gov")
}

pub fn executor() -> AccAddress {
    test_address("executor")
}

pub fn admin() -> AccAddress {
    test_address("admin")
}

pub fn whitelisted() -> AccAddress {
    test_address("whitelisted")
}

pub fn user(name: &str) -> AccAddress {
    test_address(name)
}

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn pubkey(seed: u8) -> PubKey {
    PubKey::Ed25519(signing_key(seed).verifying_key().to_bytes())
}

pub fn val_address(seed: u8) -> ValAddress {
    ValAddress::from_bytes(vec![seed; 20])
}

pub fn validator(seed: u8) -> Validator {
    Validator {
        moniker: format!("validator-{seed}"),
        operator_address: val_address(seed),
        consensus_pubkey: pubkey(seed),
        cons_power: 1,
    }
}

pub fn context(height: u64, seconds: i64) -> Context {
    Context::new(CHAIN_ID, height, Timestamp::from_seconds(seconds))
}

pub fn default_params() -> Params {
    Params {
        bridge_executors: vec![executor().to_string()],
        admin: admin().to_string(),
        fee_whitelist: vec![whitelisted().to_string()],
        host_chain_id: HOST_CHAIN_ID.to_owned(),
        ..Params::default()
    }
}

/// Genesis with the default params and validator 1.
pub fn default_config() -> OpChildConfig {
    OpChildConfig {
        params: default_params(),
        validators: vec![validator(1)],
        ..OpChildConfig::default()
    }
}

pub fn bridge_info(finalization_period_secs: u64) -> BridgeInfo {
    BridgeInfo {
        bridge_id: 1,
        bridge_addr: to_bech32("init", &[9; 20]).unwrap(),
        l1_chain_id: HOST_CHAIN_ID.to_owned(),
        l1_client_id: "07-tendermint-0".to_owned(),
        bridge_config: BridgeConfig {
            challenger: "init1challenger".to_owned(),
            proposer: "init1proposer".to_owned(),
            batch_info: BatchInfo {
                submitter: "init1submitter".to_owned(),
                chain_type: BatchChainType::L1,
            },
            submission_interval_secs: 60,
            finalization_period_secs,
            submission_start_height: 1,
            oracle_enabled: true,
            metadata: Vec::new(),
            bridge_disabled: false,
            bridge_disabled_at: None,
        },
    }
}

pub fn deposit(sequence: u64, to: &AccAddress, amount: u128, data: Vec<u8>) -> CallMessage {
    CallMessage::FinalizeTokenDeposit {
        sender: executor().to_string(),
        from: "init1depositor".to_owned(),
        to: to.to_string(),
        amount: Coin::new(amount, DENOM),
        base_denom: BASE_DENOM.to_owned(),
        sequence,
        height: 10,
        data,
    }
}

pub fn withdrawal(sender: &AccAddress, to: &str, amount: u128) -> CallMessage {
    CallMessage::InitiateTokenWithdrawal {
        sender: sender.to_string(),
        to: to.to_owned(),
        amount: Coin::new(amount, DENOM),
    }
}

/// Encodes a hook transaction the way the mock decoder reads it.
pub fn hook_tx(tx: &Tx) -> Vec<u8> {
    borsh::BorshSerialize::try_to_vec(tx).unwrap()
}

/// The module behind a mock application, over a fresh storage.
pub struct TestChain {
    pub storage: S,
    pub host: MockHost,
    pub opchild: Arc<OpChild<S>>,
    pub app: MockApp<S>,
}

/// Routes registered on every test chain: `fund` credits one `umin` to the
/// account whose bytes are the content, `fail` always errors.
pub fn legacy_router(host: &MockHost) -> LegacyRouter<S> {
    let mut router = LegacyRouter::new();
    let bank = host.bank.clone();
    router
        .add_route(
            "fund",
            legacy_handler(move |_, data, working_set| {
                bank.fund(
                    &AccAddress::from_bytes(data.to_vec()),
                    &Coin::new(1, DENOM),
                    working_set,
                );
                Ok(())
            }),
        )
        .unwrap()
        .add_route("fail", legacy_handler(|_, _, _| Err(anyhow!("legacy failure"))))
        .unwrap();
    router
}

impl TestChain {
    pub fn new() -> Self {
        Self::with_host(MockHost::default())
    }

    pub fn with_host(host: MockHost) -> Self {
        init_logging();
        let opchild = Arc::new(OpChild::new(
            authority(),
            host.keepers(),
            legacy_router(&host),
        ));
        let app = MockApp::new(opchild.clone(), host.clone());
        Self {
            storage: S::temporary(),
            host,
            opchild,
            app,
        }
    }

    /// A chain whose genesis ran with `config` and was committed.
    pub fn with_genesis(config: &OpChildConfig) -> Self {
        let chain = Self::new();
        let mut working_set = chain.working_set();
        chain.opchild.genesis(config, &mut working_set).unwrap();
        chain.commit(working_set);
        chain
    }

    pub fn working_set(&self) -> WorkingSet<S> {
        WorkingSet::new(self.storage.clone())
    }

    pub fn commit(&self, working_set: WorkingSet<S>) -> <S as Storage>::Root {
        working_set.checkpoint().commit().unwrap()
    }

    pub fn call(
        &self,
        msg: CallMessage,
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        self.opchild.call(msg, context, &self.app, working_set)
    }

    pub fn balance(&self, address: &AccAddress, working_set: &WorkingSet<S>) -> u128 {
        BankKeeper::<S>::balance(self.host.bank.as_ref(), address, DENOM, working_set)
    }

    pub fn set_bridge_info(&self, finalization_period_secs: u64, working_set: &mut WorkingSet<S>) {
        self.call(
            CallMessage::SetBridgeInfo {
                sender: user("anyone").to_string(),
                bridge_info: bridge_info(finalization_period_secs),
            },
            &context(1, 0),
            working_set,
        )
        .unwrap();
    }
}

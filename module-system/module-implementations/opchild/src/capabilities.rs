//! Interfaces of the host application the module depends on.
//!
//! The host owns the bank, the accounts, the transaction format and the
//! message router; the module reaches them only through these traits. Every
//! capability operates on the same [`WorkingSet`] as the module, so writes
//! they make are branched and reverted together with the module's own.

use std::fmt;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use opchild_state::{Storage, WorkingSet};
use serde::{Deserialize, Serialize};

use crate::address::AccAddress;
use crate::types::{Coin, Timestamp};

/// How the current transaction is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Mempool admission.
    Check,
    /// Mempool re-validation after a block.
    ReCheck,
    /// Gas estimation.
    Simulate,
    /// Block execution.
    Deliver,
}

/// Block-level context of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub chain_id: String,
    pub height: u64,
    pub time: Timestamp,
    pub exec_mode: ExecMode,
}

impl Context {
    pub fn new(chain_id: impl Into<String>, height: u64, time: Timestamp) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
            exec_mode: ExecMode::Deliver,
        }
    }

    #[must_use]
    pub fn with_exec_mode(mut self, exec_mode: ExecMode) -> Self {
        self.exec_mode = exec_mode;
        self
    }

    pub fn is_check_tx(&self) -> bool {
        matches!(self.exec_mode, ExecMode::Check | ExecMode::ReCheck)
    }
}

/// A message tagged with its type URL.
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct AnyMsg {
    pub type_url: String,
    pub value: Vec<u8>,
}

impl AnyMsg {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }
}

/// A decoded transaction.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Tx {
    pub messages: Vec<AnyMsg>,
    pub signers: Vec<AccAddress>,
}

/// An oracle currency pair such as `BTC/USD`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_owned(),
            quote: quote.to_owned(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A price as stored by the oracle.
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct QuotePrice {
    pub price: u128,
    pub block_timestamp: Timestamp,
    pub block_height: u64,
}

pub trait BankKeeper<S: Storage> {
    /// Mints `coin` into the module account.
    fn mint_coins(&self, coin: &Coin, working_set: &mut WorkingSet<S>) -> anyhow::Result<()>;

    /// Burns `coin` from the module account.
    fn burn_coins(&self, coin: &Coin, working_set: &mut WorkingSet<S>) -> anyhow::Result<()>;

    fn send_from_module(
        &self,
        to: &AccAddress,
        coin: &Coin,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;

    fn send_to_module(
        &self,
        from: &AccAddress,
        coin: &Coin,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;

    fn send(
        &self,
        from: &AccAddress,
        to: &AccAddress,
        coin: &Coin,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;

    fn balance(&self, address: &AccAddress, denom: &str, working_set: &WorkingSet<S>) -> u128;

    /// Every non-zero balance, ordered by address then denom.
    fn all_balances(&self, working_set: &WorkingSet<S>) -> anyhow::Result<Vec<(AccAddress, Coin)>>;

    fn spend_from_fee_collector(
        &self,
        to: &AccAddress,
        coins: &[Coin],
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;
}

pub trait AccountKeeper<S: Storage> {
    fn has_account(&self, address: &AccAddress, working_set: &WorkingSet<S>) -> bool;

    fn create_account(
        &self,
        address: &AccAddress,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;
}

pub trait TxDecoder {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Tx>;
}

/// The host's ante pipeline.
pub trait AnteHandler<S: Storage> {
    fn ante(
        &self,
        tx: &Tx,
        context: &Context,
        simulate: bool,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;
}

/// Dispatches messages to their handlers, this module's included.
pub trait MessageRouter<S: Storage> {
    /// The signers the message declares. Fails for unknown type URLs.
    fn signers(&self, msg: &AnyMsg) -> anyhow::Result<Vec<AccAddress>>;

    fn dispatch(
        &self,
        msg: &AnyMsg,
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;
}

pub trait OracleKeeper<S: Storage> {
    /// Known pairs with their numeric ids, ordered by id.
    fn currency_pairs(&self, working_set: &WorkingSet<S>) -> anyhow::Result<Vec<(u64, CurrencyPair)>>;

    fn get_price(
        &self,
        pair: &CurrencyPair,
        working_set: &WorkingSet<S>,
    ) -> anyhow::Result<Option<QuotePrice>>;

    fn set_price(
        &self,
        pair: &CurrencyPair,
        price: QuotePrice,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()>;
}

pub trait ConsensusParams {
    /// Allowed validator key types, e.g. `ed25519`.
    fn allowed_pubkey_types(&self) -> Vec<String>;
}

/// The host capabilities handed to the module at construction.
pub struct Keepers<S: Storage> {
    pub bank: Arc<dyn BankKeeper<S>>,
    pub accounts: Arc<dyn AccountKeeper<S>>,
    pub tx_decoder: Arc<dyn TxDecoder>,
    pub ante: Arc<dyn AnteHandler<S>>,
    pub oracle: Arc<dyn OracleKeeper<S>>,
    pub consensus: Arc<dyn ConsensusParams>,
}

impl<S: Storage> Clone for Keepers<S> {
    fn clone(&self) -> Self {
        Self {
            bank: self.bank.clone(),
            accounts: self.accounts.clone(),
            tx_decoder: self.tx_decoder.clone(),
            ante: self.ante.clone(),
            oracle: self.oracle.clone(),
            consensus: self.consensus.clone(),
        }
    }
}

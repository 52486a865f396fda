//! In-memory host capabilities for tests.
//!
//! Everything here keeps its state in the same [`WorkingSet`] as the module,
//! under prefixes of its own, so branch reverts cover it too.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure};
use borsh::{BorshDeserialize, BorshSerialize};
use opchild_state::{Prefix, StateMap, Storage, WorkingSet};
use sha2::{Digest, Sha256};

use crate::address::AccAddress;
use crate::ante::RedundantBridgeDecorator;
use crate::call::{is_module_message, CallMessage};
use crate::capabilities::{
    AccountKeeper, AnteHandler, AnyMsg, BankKeeper, ConsensusParams, Context, CurrencyPair,
    Keepers, MessageRouter, OracleKeeper, QuotePrice, Tx, TxDecoder,
};
use crate::oracle::timestamp_pair;
use crate::pubkey::ED25519_KEY_TYPE;
use crate::types::Coin;
use crate::OpChild;

const BALANCES_PREFIX: u8 = 0xe1;
const ACCOUNTS_PREFIX: u8 = 0xe2;
const PRICES_PREFIX: u8 = 0xe3;

/// Gas the mock ante charges for every message of a transaction.
pub const ANTE_GAS_PER_MSG: u64 = 1_000;

pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_PANIC: &str = "/opchild.mock.MsgPanic";
pub const MSG_CONSUME_GAS: &str = "/opchild.mock.MsgConsumeGas";

/// The account of the module named `name`.
pub fn module_address(name: &str) -> AccAddress {
    AccAddress::from_bytes(&Sha256::digest(name.as_bytes())[..20])
}

/// A deterministic account address for tests.
pub fn test_address(seed: &str) -> AccAddress {
    module_address(&format!("test/{seed}"))
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MsgSend {
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

/// Panics when dispatched.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MsgPanic {
    pub signer: String,
}

/// Charges `amount` gas when dispatched.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MsgConsumeGas {
    pub signer: String,
    pub amount: u64,
}

fn to_any<T: BorshSerialize>(type_url: &str, msg: &T) -> AnyMsg {
    AnyMsg::new(type_url, msg.try_to_vec().expect("mock message must serialize"))
}

impl MsgSend {
    pub fn to_any(&self) -> AnyMsg {
        to_any(MSG_SEND, self)
    }
}

impl MsgPanic {
    pub fn to_any(&self) -> AnyMsg {
        to_any(MSG_PANIC, self)
    }
}

impl MsgConsumeGas {
    pub fn to_any(&self) -> AnyMsg {
        to_any(MSG_CONSUME_GAS, self)
    }
}

/// Balances per account, with a module account and a fee collector.
pub struct MockBank {
    balances: StateMap<AccAddress, BTreeMap<String, u128>>,
    module_account: AccAddress,
    fee_collector: AccAddress,
}

impl Default for MockBank {
    fn default() -> Self {
        Self {
            balances: StateMap::new(Prefix::from(BALANCES_PREFIX)),
            module_account: module_address("opchild"),
            fee_collector: module_address("fee_collector"),
        }
    }
}

impl MockBank {
    pub fn module_account(&self) -> &AccAddress {
        &self.module_account
    }

    pub fn fee_collector(&self) -> &AccAddress {
        &self.fee_collector
    }

    /// Credits `coin` out of thin air.
    pub fn fund<S: Storage>(&self, to: &AccAddress, coin: &Coin, working_set: &mut WorkingSet<S>) {
        self.add(to, coin, working_set);
    }

    fn add<S: Storage>(&self, to: &AccAddress, coin: &Coin, working_set: &mut WorkingSet<S>) {
        let mut balances = self.balances.get(to, working_set).unwrap_or_default();
        *balances.entry(coin.denom.clone()).or_default() += coin.amount;
        self.balances.set(to, &balances, working_set);
    }

    fn sub<S: Storage>(
        &self,
        from: &AccAddress,
        coin: &Coin,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        let mut balances = self.balances.get(from, working_set).unwrap_or_default();
        let balance = balances.entry(coin.denom.clone()).or_default();
        ensure!(
            *balance >= coin.amount,
            "insufficient funds: {from} has {}{}, needs {coin}",
            balance,
            coin.denom
        );
        *balance -= coin.amount;
        balances.retain(|_, amount| *amount > 0);
        if balances.is_empty() {
            self.balances.delete(from, working_set);
        } else {
            self.balances.set(from, &balances, working_set);
        }
        Ok(())
    }
}

impl<S: Storage> BankKeeper<S> for MockBank {
    fn mint_coins(&self, coin: &Coin, working_set: &mut WorkingSet<S>) -> anyhow::Result<()> {
        self.add(&self.module_account, coin, working_set);
        Ok(())
    }

    fn burn_coins(&self, coin: &Coin, working_set: &mut WorkingSet<S>) -> anyhow::Result<()> {
        self.sub(&self.module_account, coin, working_set)
    }

    fn send_from_module(
        &self,
        to: &AccAddress,
        coin: &Coin,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        self.sub(&self.module_account, coin, working_set)?;
        self.add(to, coin, working_set);
        Ok(())
    }

    fn send_to_module(
        &self,
        from: &AccAddress,
        coin: &Coin,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        self.sub(from, coin, working_set)?;
        self.add(&self.module_account, coin, working_set);
        Ok(())
    }

    fn send(
        &self,
        from: &AccAddress,
        to: &AccAddress,
        coin: &Coin,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        self.sub(from, coin, working_set)?;
        self.add(to, coin, working_set);
        Ok(())
    }

    fn balance(&self, address: &AccAddress, denom: &str, working_set: &WorkingSet<S>) -> u128 {
        self.balances
            .get(address, working_set)
            .and_then(|balances| balances.get(denom).copied())
            .unwrap_or_default()
    }

    fn all_balances(&self, working_set: &WorkingSet<S>) -> anyhow::Result<Vec<(AccAddress, Coin)>> {
        let mut all = Vec::new();
        for (address, balances) in self.balances.iter(working_set)? {
            for (denom, amount) in balances {
                all.push((address.clone(), Coin::new(amount, denom)));
            }
        }
        Ok(all)
    }

    fn spend_from_fee_collector(
        &self,
        to: &AccAddress,
        coins: &[Coin],
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        for coin in coins {
            self.sub(&self.fee_collector, coin, working_set)?;
            self.add(to, coin, working_set);
        }
        Ok(())
    }
}

pub struct MockAccounts {
    accounts: StateMap<AccAddress, bool>,
}

impl Default for MockAccounts {
    fn default() -> Self {
        Self {
            accounts: StateMap::new(Prefix::from(ACCOUNTS_PREFIX)),
        }
    }
}

impl<S: Storage> AccountKeeper<S> for MockAccounts {
    fn has_account(&self, address: &AccAddress, working_set: &WorkingSet<S>) -> bool {
        self.accounts.contains(address, working_set)
    }

    fn create_account(
        &self,
        address: &AccAddress,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        ensure!(
            !self.accounts.contains(address, working_set),
            "account {address} already exists"
        );
        self.accounts.set(address, &true, working_set);
        Ok(())
    }
}

/// Decodes borsh-encoded [`Tx`]s.
#[derive(Default)]
pub struct MockTxDecoder;

impl TxDecoder for MockTxDecoder {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Tx> {
        Ok(Tx::try_from_slice(bytes)?)
    }
}

/// Requires at least one signer and charges [`ANTE_GAS_PER_MSG`] per
/// message.
#[derive(Default)]
pub struct MockAnte;

impl<S: Storage> AnteHandler<S> for MockAnte {
    fn ante(
        &self,
        tx: &Tx,
        _context: &Context,
        _simulate: bool,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        ensure!(!tx.signers.is_empty(), "tx has no signers");
        ensure!(!tx.messages.is_empty(), "tx has no messages");
        working_set.charge_gas(ANTE_GAS_PER_MSG * tx.messages.len() as u64, "ante")?;
        Ok(())
    }
}

/// Known pairs are fixed at construction; prices live in state.
pub struct MockOracle {
    pairs: Vec<(u64, CurrencyPair)>,
    prices: StateMap<String, QuotePrice>,
}

impl MockOracle {
    pub fn new(pairs: Vec<(u64, CurrencyPair)>) -> Self {
        Self {
            pairs,
            prices: StateMap::new(Prefix::from(PRICES_PREFIX)),
        }
    }
}

impl Default for MockOracle {
    /// The timestamp pair with id 0, then `BTC/USD` and `ETH/USD`.
    fn default() -> Self {
        Self::new(vec![
            (0, timestamp_pair()),
            (1, CurrencyPair::new("BTC", "USD")),
            (2, CurrencyPair::new("ETH", "USD")),
        ])
    }
}

impl<S: Storage> OracleKeeper<S> for MockOracle {
    fn currency_pairs(&self, _working_set: &WorkingSet<S>) -> anyhow::Result<Vec<(u64, CurrencyPair)>> {
        Ok(self.pairs.clone())
    }

    fn get_price(
        &self,
        pair: &CurrencyPair,
        working_set: &WorkingSet<S>,
    ) -> anyhow::Result<Option<QuotePrice>> {
        Ok(self.prices.get(&pair.to_string(), working_set))
    }

    fn set_price(
        &self,
        pair: &CurrencyPair,
        price: QuotePrice,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        self.prices.set(&pair.to_string(), &price, working_set);
        Ok(())
    }
}

pub struct MockConsensusParams {
    pub pubkey_types: Vec<String>,
}

impl Default for MockConsensusParams {
    fn default() -> Self {
        Self {
            pubkey_types: vec![ED25519_KEY_TYPE.to_owned()],
        }
    }
}

impl ConsensusParams for MockConsensusParams {
    fn allowed_pubkey_types(&self) -> Vec<String> {
        self.pubkey_types.clone()
    }
}

/// The mock capabilities, kept by concrete type so tests can reach them.
#[derive(Clone)]
pub struct MockHost {
    pub bank: Arc<MockBank>,
    pub accounts: Arc<MockAccounts>,
    pub oracle: Arc<MockOracle>,
    pub consensus: Arc<MockConsensusParams>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            bank: Arc::new(MockBank::default()),
            accounts: Arc::new(MockAccounts::default()),
            oracle: Arc::new(MockOracle::default()),
            consensus: Arc::new(MockConsensusParams::default()),
        }
    }
}

impl MockHost {
    pub fn keepers<S: Storage>(&self) -> Keepers<S> {
        Keepers {
            bank: self.bank.clone(),
            accounts: self.accounts.clone(),
            tx_decoder: Arc::new(MockTxDecoder),
            ante: Arc::new(MockAnte),
            oracle: self.oracle.clone(),
            consensus: self.consensus.clone(),
        }
    }
}

/// A tiny application: the OPChild module, a bank send and two test
/// messages, behind the redundant-bridge ante.
pub struct MockApp<S: Storage> {
    pub opchild: Arc<OpChild<S>>,
    pub host: MockHost,
    ante: RedundantBridgeDecorator<S>,
}

impl<S: Storage> MockApp<S> {
    pub fn new(opchild: Arc<OpChild<S>>, host: MockHost) -> Self {
        let ante = RedundantBridgeDecorator::new(opchild.clone(), Arc::new(MockAnte));
        Self {
            opchild,
            host,
            ante,
        }
    }

    /// Runs the ante in check mode without touching state.
    pub fn check_tx(&self, tx: &Tx, context: &Context, working_set: &mut WorkingSet<S>) -> anyhow::Result<()> {
        let context = context
            .clone()
            .with_exec_mode(crate::capabilities::ExecMode::Check);
        working_set.branch();
        let result = self.ante.ante(tx, &context, false, working_set);
        working_set.discard_branch()?;
        result
    }

    /// Runs the ante, then every message; all or nothing.
    pub fn deliver_tx(&self, tx: &Tx, context: &Context, working_set: &mut WorkingSet<S>) -> anyhow::Result<()> {
        working_set.with_branch(|working_set| {
            self.ante.ante(tx, context, false, working_set)?;
            for msg in &tx.messages {
                self.dispatch(msg, context, working_set)?;
            }
            Ok(())
        })
    }
}

impl<S: Storage> MessageRouter<S> for MockApp<S> {
    fn signers(&self, msg: &AnyMsg) -> anyhow::Result<Vec<AccAddress>> {
        let signer = match msg.type_url.as_str() {
            url if is_module_message(url) => CallMessage::from_any(msg)?.signer().to_owned(),
            MSG_SEND => MsgSend::try_from_slice(&msg.value)?.from_address,
            MSG_PANIC => MsgPanic::try_from_slice(&msg.value)?.signer,
            MSG_CONSUME_GAS => MsgConsumeGas::try_from_slice(&msg.value)?.signer,
            url => bail!("unknown message type {url}"),
        };
        Ok(vec![AccAddress::parse(&signer)?])
    }

    fn dispatch(
        &self,
        msg: &AnyMsg,
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> anyhow::Result<()> {
        match msg.type_url.as_str() {
            url if is_module_message(url) => {
                let call = CallMessage::from_any(msg)?;
                self.opchild.call(call, context, self, working_set)?;
            }
            MSG_SEND => {
                let send = MsgSend::try_from_slice(&msg.value)?;
                let from = AccAddress::parse(&send.from_address)?;
                let to = AccAddress::parse(&send.to_address)?;
                for coin in &send.amount {
                    BankKeeper::<S>::send(self.host.bank.as_ref(), &from, &to, coin, working_set)?;
                }
            }
            MSG_PANIC => panic!("mock message panicked"),
            MSG_CONSUME_GAS => {
                let consume = MsgConsumeGas::try_from_slice(&msg.value)?;
                working_set.charge_gas(consume.amount, "mock consume gas")?;
            }
            url => return Err(anyhow!("unknown message type {url}")),
        }
        Ok(())
    }
}

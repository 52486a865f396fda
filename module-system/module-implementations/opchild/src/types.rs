use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::address::{from_bech32, AccAddress, ValAddress};
use crate::header::Header;
use crate::pubkey::PubKey;
use crate::OpChildError;

/// Seconds and nanoseconds since the Unix epoch.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Splits a nanosecond count since the epoch.
    pub fn from_unix_nanos(nanos: u128) -> Self {
        Self {
            seconds: (nanos / 1_000_000_000).min(i64::MAX as u128) as i64,
            nanos: (nanos % 1_000_000_000) as u32,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Checks a denom against `[a-zA-Z][a-zA-Z0-9/:._-]{2,127}`.
pub fn validate_denom(denom: &str) -> Result<(), OpChildError> {
    let mut chars = denom.chars();
    let first_ok = chars.next().map_or(false, |c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c));
    if !first_ok || !rest_ok || !(3..=128).contains(&denom.len()) {
        return Err(OpChildError::InvalidAmount(format!("invalid denom: {denom}")));
    }
    Ok(())
}

/// An amount of a single denomination.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Valid denom; the amount may be zero.
    pub fn validate(&self) -> Result<(), OpChildError> {
        validate_denom(&self.denom)
    }

    /// Valid denom and a non-zero amount.
    pub fn validate_positive(&self) -> Result<(), OpChildError> {
        self.validate()?;
        if self.is_zero() {
            return Err(OpChildError::InvalidAmount(format!("zero amount of {}", self.denom)));
        }
        Ok(())
    }
}

/// `{amount}{denom}`, e.g. `40umin`.
impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A decimal amount of a denomination, kept in its canonical string form.
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct DecCoin {
    pub denom: String,
    pub amount: String,
}

impl DecCoin {
    pub fn new(amount: &str, denom: &str) -> Self {
        Self {
            denom: denom.to_owned(),
            amount: amount.to_owned(),
        }
    }

    pub fn validate(&self) -> Result<(), OpChildError> {
        validate_denom(&self.denom)?;
        let (int, frac) = match self.amount.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (self.amount.as_str(), ""),
        };
        let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if int.is_empty() || !digits(int) || !digits(frac) || frac.len() > 18 {
            return Err(OpChildError::InvalidAmount(format!(
                "invalid decimal amount: {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Module parameters.
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Params {
    pub max_validators: u32,
    pub historical_entries: u32,
    /// Sorted by denom, without duplicates.
    pub min_gas_prices: Vec<DecCoin>,
    pub bridge_executors: Vec<String>,
    pub admin: String,
    pub fee_whitelist: Vec<String>,
    pub host_chain_id: String,
    pub hook_max_gas: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_validators: 100,
            historical_entries: 10,
            min_gas_prices: vec![DecCoin::new("0.15", "umin")],
            bridge_executors: Vec::new(),
            admin: String::new(),
            fee_whitelist: Vec::new(),
            host_chain_id: String::new(),
            hook_max_gas: 3_000_000,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), OpChildError> {
        if self.max_validators == 0 {
            return Err(OpChildError::InvalidParams(
                "max validators must be greater than zero".to_owned(),
            ));
        }

        for coin in &self.min_gas_prices {
            coin.validate()
                .map_err(|e| OpChildError::InvalidParams(e.to_string()))?;
        }
        if self
            .min_gas_prices
            .windows(2)
            .any(|pair| pair[0].denom >= pair[1].denom)
        {
            return Err(OpChildError::InvalidParams(
                "min gas prices must be sorted by denom without duplicates".to_owned(),
            ));
        }

        for executor in &self.bridge_executors {
            AccAddress::parse(executor).map_err(|e| OpChildError::InvalidParams(e.to_string()))?;
        }
        if !self.admin.is_empty() {
            AccAddress::parse(&self.admin)
                .map_err(|e| OpChildError::InvalidParams(e.to_string()))?;
        }
        for addr in &self.fee_whitelist {
            AccAddress::parse(addr).map_err(|e| OpChildError::InvalidParams(e.to_string()))?;
        }

        Ok(())
    }

    pub fn is_bridge_executor(&self, address: &AccAddress) -> bool {
        self.bridge_executors
            .iter()
            .any(|executor| AccAddress::parse(executor).map_or(false, |e| &e == address))
    }

    pub fn is_admin(&self, address: &AccAddress) -> bool {
        AccAddress::parse(&self.admin).map_or(false, |admin| &admin == address)
    }

    pub fn is_fee_whitelisted(&self, address: &AccAddress) -> bool {
        self.fee_whitelist
            .iter()
            .any(|entry| AccAddress::parse(entry).map_or(false, |e| &e == address))
    }
}

/// A member of the driven validator set.
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Validator {
    pub moniker: String,
    pub operator_address: ValAddress,
    pub consensus_pubkey: PubKey,
    /// Zero marks the validator for removal at the next end block.
    pub cons_power: i64,
}

impl Validator {
    pub fn is_tombstoned(&self) -> bool {
        self.cons_power == 0
    }
}

/// A `(pubkey, power)` pair handed back to consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PubKey,
    pub power: i64,
}

/// Header and validator set recorded at a height.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct HistoricalInfo {
    pub header: Header,
    /// Sorted by power, descending, then by operator address.
    pub valset: Vec<Validator>,
}

/// A withdrawal commitment as stored under its L2 sequence.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct WithdrawalCommitment {
    pub commitment: [u8; 32],
    pub submit_time: Timestamp,
}

/// Where batches are submitted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BatchChainType {
    L1,
    Celestia,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BatchInfo {
    pub submitter: String,
    pub chain_type: BatchChainType,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub challenger: String,
    pub proposer: String,
    pub batch_info: BatchInfo,
    pub submission_interval_secs: u64,
    pub finalization_period_secs: u64,
    pub submission_start_height: u64,
    pub oracle_enabled: bool,
    pub metadata: Vec<u8>,
    pub bridge_disabled: bool,
    pub bridge_disabled_at: Option<Timestamp>,
}

/// The L1 side of this rollup's bridge.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BridgeInfo {
    pub bridge_id: u64,
    pub bridge_addr: String,
    pub l1_chain_id: String,
    pub l1_client_id: String,
    pub bridge_config: BridgeConfig,
}

impl BridgeInfo {
    pub fn validate(&self) -> Result<(), OpChildError> {
        let invalid = |msg: &str| Err(OpChildError::InvalidBridgeInfo(msg.to_owned()));
        if self.bridge_id == 0 {
            return invalid("bridge id must be non-zero");
        }
        if self.l1_chain_id.is_empty() {
            return invalid("l1 chain id must not be empty");
        }
        if self.l1_client_id.is_empty() {
            return invalid("l1 client id must not be empty");
        }
        from_bech32(&self.bridge_addr)
            .map_err(|e| OpChildError::InvalidBridgeInfo(e.to_string()))?;

        let config = &self.bridge_config;
        if config.challenger.is_empty() || config.proposer.is_empty() {
            return invalid("challenger and proposer must be set");
        }
        if config.batch_info.submitter.is_empty() {
            return invalid("batch submitter must be set");
        }
        if config.submission_interval_secs == 0 || config.finalization_period_secs == 0 {
            return invalid("submission interval and finalization period must be non-zero");
        }
        if config.bridge_disabled != config.bridge_disabled_at.is_some() {
            return invalid("bridge_disabled_at must be set exactly when the bridge is disabled");
        }
        Ok(())
    }

    /// The bech32 prefix of L1 accounts, taken from the bridge address.
    pub fn l1_hrp(&self) -> Result<String, OpChildError> {
        Ok(from_bech32(&self.bridge_addr)?.0)
    }
}

/// An L1 validator as mirrored on L2 for oracle verification.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct HostValidator {
    pub pub_key: PubKey,
    pub power: i64,
}

/// L2 denom and the L1 denom it was bridged from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomPair {
    pub denom: String,
    pub base_denom: String,
}

use opchild_state::StateError;
use thiserror::Error;

/// Errors returned by the OPChild module.
#[derive(Debug, Error)]
pub enum OpChildError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("deposit already finalized: l1 sequence {0}")]
    AlreadyFinalized(u64),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid sequence: {0}")]
    InvalidSequence(String),
    #[error("validator already exists: {0}")]
    DuplicateValidator(String),
    #[error("validator pubkey type {0} is not supported")]
    UnsupportedPubKey(String),
    #[error("invalid executor change plan: {0}")]
    InvalidExecutorChangePlan(String),
    #[error("invalid oracle timestamp for {pair}: {reason}")]
    InvalidOracleTimestamp { pair: String, reason: String },
    #[error("invalid host validator set: {0}")]
    InvalidHostValidatorSet(String),
    #[error("oracle validators not registered: {0}")]
    OracleValidatorsNotRegistered(String),
    #[error("redundant bridge transaction")]
    RedundantTx,
    #[error("invalid execute message: {0}")]
    InvalidExecuteMsg(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("invalid bridge info: {0}")]
    InvalidBridgeInfo(String),
    #[error("validator not found: {0}")]
    ValidatorNotFound(String),
    #[error("insufficient voting power: got {got}, need more than {threshold} of {total}")]
    InsufficientVotingPower { got: i64, threshold: i64, total: i64 },
    #[error("invalid vote extension: {0}")]
    InvalidVoteExtension(String),
    #[error("unknown denom: {0}")]
    UnknownDenom(String),
    #[error("denom {denom} is paired with {existing}, not {given}")]
    DenomPairMismatch {
        denom: String,
        existing: String,
        given: String,
    },
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Host(anyhow::Error),
}

impl OpChildError {
    pub(crate) fn invalid_address(address: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Host capabilities may hand back errors raised by this module when they
/// route a message back into it; keep their kind.
impl From<anyhow::Error> for OpChildError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<OpChildError>() {
            Ok(err) => err,
            Err(err) => Self::Host(err),
        }
    }
}

impl From<prost::DecodeError> for OpChildError {
    fn from(err: prost::DecodeError) -> Self {
        Self::Codec(err.to_string())
    }
}

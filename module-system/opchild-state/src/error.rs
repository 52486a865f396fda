use thiserror::Error;

/// Errors raised by the state layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A required value is absent.
    #[error("Value not found for prefix: {0} and: storage key {1}")]
    MissingValue(String, String),
    /// Stored key bytes could not be decoded.
    #[error("failed to decode key: {0}")]
    KeyDecode(String),
    /// Stored value bytes could not be decoded.
    #[error("failed to decode value at key 0x{key}: {reason}")]
    ValueDecode {
        /// Hex-encoded storage key.
        key: String,
        /// Codec error message.
        reason: String,
    },
    /// The gas meter ran out.
    #[error("out of gas in location: {descriptor}; gasWanted: {limit}, gasUsed: {used}")]
    OutOfGas {
        /// What was being charged.
        descriptor: String,
        /// The meter limit.
        limit: u64,
        /// Gas consumed including the failed charge.
        used: u64,
    },
    /// `commit_branch`/`discard_branch` without a matching `branch`.
    #[error("no open branch on the working set")]
    NoOpenBranch,
}

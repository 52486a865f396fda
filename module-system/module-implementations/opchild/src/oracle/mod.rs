//! Ingestion of L1 oracle prices.
//!
//! L1 validators attach their price observations to their commit votes as
//! vote extensions. A relayer brings the extended commit of an L1 block to
//! L2, where the signatures are checked against a mirror of the L1
//! validator set before the prices are aggregated and written.

mod aggregate;
pub mod proto;

use std::collections::BTreeMap;

pub use aggregate::weighted_median;
use opchild_state::{Event, Storage, WorkingSet};
use prost::Message;

use self::proto::{
    decode_price, BlockIdFlag, CanonicalVoteExtension, ExtendedCommitInfo, OracleVoteExtension,
};
use crate::address::{AccAddress, ConsAddress};
use crate::call::CallResponse;
use crate::capabilities::{Context, CurrencyPair, QuotePrice};
use crate::events::*;
use crate::types::{HostValidator, Timestamp};
use crate::{OpChild, OpChildError};

/// The pair whose aggregated value is the time of the update, in
/// nanoseconds since the epoch.
pub const TIMESTAMP_BASE: &str = "TIMESTAMP";
pub const TIMESTAMP_QUOTE: &str = "NANOSECOND";

pub fn timestamp_pair() -> CurrencyPair {
    CurrencyPair::new(TIMESTAMP_BASE, TIMESTAMP_QUOTE)
}

/// The bytes L1 validators sign for their vote extensions.
pub fn canonical_vote_extension_bytes(
    extension: &[u8],
    height: i64,
    round: i64,
    chain_id: &str,
) -> Vec<u8> {
    CanonicalVoteExtension {
        extension: extension.to_vec(),
        height,
        round,
        chain_id: chain_id.to_owned(),
    }
    .encode_length_delimited_to_vec()
}

/// A vote that passed verification.
struct VerifiedVote {
    power: i64,
    prices: BTreeMap<u64, u128>,
}

impl<S: Storage> OpChild<S> {
    /// Replaces the mirror of the L1 validator set.
    ///
    /// Reports for another chain, or older than the mirror, are ignored.
    /// Returns whether the mirror was replaced.
    pub fn update_host_validator_set(
        &self,
        host_chain_id: &str,
        host_height: u64,
        validators: Vec<HostValidator>,
        working_set: &mut WorkingSet<S>,
    ) -> Result<bool, OpChildError> {
        let params = self.get_params(working_set)?;
        if host_chain_id.is_empty() || host_chain_id != params.host_chain_id {
            tracing::debug!(host_chain_id, "Ignoring validator set of foreign chain");
            return Ok(false);
        }
        let last_height = self.host_height.get(working_set).unwrap_or_default();
        if host_height < last_height {
            tracing::debug!(host_height, last_height, "Ignoring stale host validator set");
            return Ok(false);
        }

        total_host_power(&validators)?;
        let mut cons_addrs = Vec::with_capacity(validators.len());
        for validator in &validators {
            let cons_addr = validator.pub_key.cons_address();
            if cons_addrs.contains(&cons_addr) {
                return Err(OpChildError::InvalidHostValidatorSet(format!(
                    "duplicate validator {cons_addr}"
                )));
            }
            cons_addrs.push(cons_addr);
        }

        self.host_validators.clear(working_set);
        for validator in &validators {
            self.host_validators
                .set(&validator.pub_key.cons_address(), validator, working_set);
        }
        self.host_height.set(&host_height, working_set);

        tracing::debug!(host_height, validators = validators.len(), "Updated host validator set");
        Ok(true)
    }

    pub(crate) fn update_oracle(
        &self,
        sender: &str,
        height: u64,
        data: &[u8],
        context: &Context,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, OpChildError> {
        let sender = AccAddress::parse(sender)?;
        let params = self.get_params(working_set)?;
        if !self.is_validator_account(&sender, working_set) && !params.is_bridge_executor(&sender)
        {
            return Err(OpChildError::Unauthorized(format!(
                "{sender} is neither a validator nor a bridge executor"
            )));
        }

        let mirror: BTreeMap<ConsAddress, HostValidator> =
            self.host_validators.iter(working_set)?.into_iter().collect();
        if mirror.is_empty() {
            return Err(OpChildError::OracleValidatorsNotRegistered(
                "no host validators".to_owned(),
            ));
        }
        let host_height = self.host_height.get(working_set).unwrap_or_default();
        if host_height < height {
            return Err(OpChildError::OracleValidatorsNotRegistered(format!(
                "host validator set is at height {host_height}, votes are from {height}"
            )));
        }

        let commit = ExtendedCommitInfo::decode(data)?;
        let votes = verify_vote_extensions(&params.host_chain_id, height, &commit, &mirror)?;

        let mut aggregated = Vec::new();
        for (id, pair) in self.keepers.oracle.currency_pairs(working_set)? {
            let reports = votes
                .iter()
                .filter_map(|vote| vote.prices.get(&id).map(|price| (*price, vote.power)))
                .collect();
            if let Some(price) = weighted_median(reports) {
                aggregated.push((pair, price));
            }
        }

        let timestamp_pair = timestamp_pair();
        let updated_time = aggregated
            .iter()
            .find(|(pair, _)| pair == &timestamp_pair)
            .map(|(_, nanos)| Timestamp::from_unix_nanos(*nanos))
            .ok_or_else(|| OpChildError::InvalidOracleTimestamp {
                pair: timestamp_pair.to_string(),
                reason: "no aggregated update time".to_owned(),
            })?;

        let mut updated = Vec::new();
        let mut rejected = Vec::new();
        for (pair, price) in aggregated {
            match self.write_price(&pair, price, updated_time, context.height, working_set) {
                Ok(()) => updated.push(pair),
                Err(err @ OpChildError::InvalidOracleTimestamp { .. }) => {
                    tracing::warn!(%pair, %err, "Rejected oracle price");
                    rejected.push(pair);
                }
                Err(err) => return Err(err),
            }
        }

        working_set.emit_event(
            Event::new(EVENT_UPDATE_ORACLE)
                .with_attribute(ATTR_HEIGHT, height)
                .with_attribute(ATTR_PAIRS_UPDATED, updated.len())
                .with_attribute(ATTR_PAIRS_REJECTED, rejected.len()),
        );
        tracing::info!(
            l1_height = height,
            updated = updated.len(),
            rejected = rejected.len(),
            "Oracle updated"
        );

        Ok(CallResponse::Oracle { updated, rejected })
    }

    /// Writes a price unless the stored one is at least as recent.
    fn write_price(
        &self,
        pair: &CurrencyPair,
        price: u128,
        updated_time: Timestamp,
        height: u64,
        working_set: &mut WorkingSet<S>,
    ) -> Result<(), OpChildError> {
        if let Some(current) = self.keepers.oracle.get_price(pair, working_set)? {
            if current.block_timestamp.seconds >= updated_time.seconds {
                return Err(OpChildError::InvalidOracleTimestamp {
                    pair: pair.to_string(),
                    reason: format!(
                        "stored price is from {}, update is from {}",
                        current.block_timestamp, updated_time
                    ),
                });
            }
        }

        self.keepers.oracle.set_price(
            pair,
            QuotePrice {
                price,
                block_timestamp: updated_time,
                block_height: height,
            },
            working_set,
        )?;
        Ok(())
    }
}

/// Sum of the mirrored powers. Every power must be positive and the sum must
/// fit in an `i64`.
fn total_host_power<'a>(
    validators: impl IntoIterator<Item = &'a HostValidator>,
) -> Result<i64, OpChildError> {
    validators.into_iter().try_fold(0i64, |total, validator| {
        if validator.power <= 0 {
            return Err(OpChildError::InvalidHostValidatorSet(format!(
                "validator {} has non-positive power {}",
                validator.pub_key.cons_address(),
                validator.power
            )));
        }
        total.checked_add(validator.power).ok_or_else(|| {
            OpChildError::InvalidHostValidatorSet("total power overflows".to_owned())
        })
    })
}

/// Checks every vote of `commit` against the mirrored set and requires more
/// than two thirds of the mirrored power to have signed.
fn verify_vote_extensions(
    chain_id: &str,
    height: u64,
    commit: &ExtendedCommitInfo,
    mirror: &BTreeMap<ConsAddress, HostValidator>,
) -> Result<Vec<VerifiedVote>, OpChildError> {
    let total_power = total_host_power(mirror.values())?;
    let height = i64::try_from(height)
        .map_err(|_| OpChildError::InvalidVoteExtension(format!("height {height} too large")))?;

    let mut seen = Vec::new();
    let mut signed_power: i64 = 0;
    let mut votes = Vec::new();

    for vote in &commit.votes {
        let Some(validator) = &vote.validator else {
            continue;
        };
        let cons_addr = ConsAddress::from_bytes(validator.address.clone());
        let Some(host_validator) = mirror.get(&cons_addr) else {
            tracing::debug!(validator = %cons_addr, "Skipping vote of unknown validator");
            continue;
        };
        if seen.contains(&cons_addr) {
            return Err(OpChildError::InvalidVoteExtension(format!(
                "duplicate vote from {cons_addr}"
            )));
        }
        seen.push(cons_addr.clone());

        match BlockIdFlag::try_from(vote.block_id_flag) {
            Ok(BlockIdFlag::Commit) => {
                if vote.vote_extension.is_empty() || vote.extension_signature.is_empty() {
                    return Err(OpChildError::InvalidVoteExtension(format!(
                        "commit vote of {cons_addr} lacks an extension or its signature"
                    )));
                }
            }
            Ok(BlockIdFlag::Absent | BlockIdFlag::Nil) => {
                if !vote.vote_extension.is_empty() || !vote.extension_signature.is_empty() {
                    return Err(OpChildError::InvalidVoteExtension(format!(
                        "non-commit vote of {cons_addr} carries an extension"
                    )));
                }
                continue;
            }
            _ => {
                return Err(OpChildError::InvalidVoteExtension(format!(
                    "invalid block id flag {} from {cons_addr}",
                    vote.block_id_flag
                )));
            }
        }

        let preimage = canonical_vote_extension_bytes(
            &vote.vote_extension,
            height,
            i64::from(commit.round),
            chain_id,
        );
        host_validator
            .pub_key
            .verify(&preimage, &vote.extension_signature)?;
        signed_power = signed_power.saturating_add(host_validator.power);

        let prices = match OracleVoteExtension::decode(vote.vote_extension.as_slice()) {
            Ok(extension) => extension
                .prices
                .iter()
                .filter_map(|(id, bytes)| decode_price(bytes).map(|price| (*id, price)))
                .collect(),
            Err(err) => {
                tracing::warn!(validator = %cons_addr, %err, "Undecodable oracle vote extension");
                BTreeMap::new()
            }
        };
        votes.push(VerifiedVote {
            power: host_validator.power,
            prices,
        });
    }

    // Fits in i64 as it never exceeds the total.
    let threshold = (i128::from(total_power) * 2 / 3) as i64;
    if signed_power <= threshold {
        return Err(OpChildError::InsufficientVotingPower {
            got: signed_power,
            threshold,
            total: total_power,
        });
    }
    Ok(votes)
}

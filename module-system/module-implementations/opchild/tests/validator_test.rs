mod helpers;

use std::collections::BTreeMap;

use helpers::*;
use opchild::header::Header;
use opchild::pubkey::PubKey;
use opchild::types::{Timestamp, ValidatorUpdate};
use opchild::{CallMessage, ExecutorChangePlanRequest, OpChildError};
use opchild_state::WorkingSet;
use proptest::prelude::*;

fn add(seed: u8) -> CallMessage {
    CallMessage::AddValidator {
        authority: authority().to_string(),
        moniker: format!("validator-{seed}"),
        validator_address: val_address(seed).to_string(),
        pubkey: pubkey(seed),
    }
}

fn remove(seed: u8) -> CallMessage {
    CallMessage::RemoveValidator {
        authority: authority().to_string(),
        validator_address: val_address(seed).to_string(),
    }
}

fn begin_block(chain: &TestChain, height: u64, working_set: &mut WorkingSet<S>) {
    let header = Header {
        chain_id: CHAIN_ID.to_owned(),
        height: height as i64,
        time: Timestamp::from_seconds(height as i64),
        ..Default::default()
    };
    chain
        .opchild
        .begin_block(&context(height, height as i64), &header, working_set)
        .unwrap();
}

fn end_block(chain: &TestChain, working_set: &mut WorkingSet<S>) -> Vec<ValidatorUpdate> {
    chain.opchild.end_block(&context(1, 1), working_set).unwrap()
}

fn update(seed: u8, power: i64) -> ValidatorUpdate {
    ValidatorUpdate {
        pub_key: pubkey(seed),
        power,
    }
}

#[test]
fn genesis_reports_the_initial_set() {
    let chain = TestChain::new();
    let mut working_set = chain.working_set();
    let updates = chain
        .opchild
        .genesis(&default_config(), &mut working_set)
        .unwrap();
    assert_eq!(updates, vec![update(1, 1)]);
    // Nothing changed since genesis.
    assert!(end_block(&chain, &mut working_set).is_empty());
}

#[test]
fn added_validator_joins_at_end_block() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    chain.call(add(2), &context(2, 2), &mut working_set).unwrap();
    let stored = chain
        .opchild
        .validator(&val_address(2).to_string(), &working_set)
        .unwrap();
    assert_eq!(stored, validator(2));

    assert_eq!(end_block(&chain, &mut working_set), vec![update(2, 1)]);
    assert!(end_block(&chain, &mut working_set).is_empty());
}

#[test]
fn add_validator_checks() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    let mut not_authority = add(2);
    if let CallMessage::AddValidator { authority, .. } = &mut not_authority {
        *authority = admin().to_string();
    }
    assert!(matches!(
        chain.call(not_authority, &context(2, 2), &mut working_set),
        Err(OpChildError::Unauthorized(_))
    ));

    assert!(matches!(
        chain.call(add(1), &context(2, 2), &mut working_set),
        Err(OpChildError::DuplicateValidator(_))
    ));

    let same_key = CallMessage::AddValidator {
        authority: authority().to_string(),
        moniker: "copycat".to_owned(),
        validator_address: val_address(3).to_string(),
        pubkey: pubkey(1),
    };
    assert!(matches!(
        chain.call(same_key, &context(2, 2), &mut working_set),
        Err(OpChildError::DuplicateValidator(_))
    ));

    let secp = CallMessage::AddValidator {
        authority: authority().to_string(),
        moniker: "secp".to_owned(),
        validator_address: val_address(4).to_string(),
        pubkey: PubKey::Secp256k1(vec![2; 33]),
    };
    assert!(matches!(
        chain.call(secp, &context(2, 2), &mut working_set),
        Err(OpChildError::UnsupportedPubKey(_))
    ));

    assert_eq!(chain.opchild.validators(&working_set).unwrap().len(), 1);
}

#[test]
fn only_max_validators_are_reported() {
    let mut config = default_config();
    config.params.max_validators = 1;
    config.validators.push(validator(2));

    let chain = TestChain::new();
    let mut working_set = chain.working_set();
    assert_eq!(
        chain.opchild.genesis(&config, &mut working_set).unwrap(),
        vec![update(1, 1)]
    );
    assert!(end_block(&chain, &mut working_set).is_empty());

    // Validator 2 takes the freed slot.
    chain.call(remove(1), &context(2, 2), &mut working_set).unwrap();
    assert_eq!(
        end_block(&chain, &mut working_set),
        vec![update(2, 1), update(1, 0)]
    );
    assert_eq!(
        chain.opchild.validators(&working_set).unwrap(),
        vec![validator(2)]
    );
    assert!(end_block(&chain, &mut working_set).is_empty());
}

#[test]
fn removed_validator_leaves_at_end_block() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    chain.call(remove(1), &context(2, 2), &mut working_set).unwrap();
    let tombstoned = chain
        .opchild
        .validator(&val_address(1).to_string(), &working_set)
        .unwrap();
    assert_eq!(tombstoned.cons_power, 0);

    assert_eq!(end_block(&chain, &mut working_set), vec![update(1, 0)]);
    assert!(matches!(
        chain
            .opchild
            .validator(&val_address(1).to_string(), &working_set),
        Err(OpChildError::ValidatorNotFound(_))
    ));

    // The consensus key is free again.
    chain.call(add(1), &context(3, 3), &mut working_set).unwrap();
}

#[test]
fn removing_an_unknown_validator_fails() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();
    assert!(matches!(
        chain.call(remove(9), &context(2, 2), &mut working_set),
        Err(OpChildError::ValidatorNotFound(_))
    ));
}

#[test]
fn historical_info_keeps_the_configured_window() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    for height in 1..=15 {
        begin_block(&chain, height, &mut working_set);
    }

    for height in 1..=5 {
        assert!(chain.opchild.historical_info(height, &working_set).is_none());
    }
    for height in 6..=15 {
        let info = chain.opchild.historical_info(height, &working_set).unwrap();
        assert_eq!(info.header.height, height as i64);
        assert_eq!(info.valset, vec![validator(1)]);
    }
}

#[test]
fn historical_info_is_off_with_zero_entries() {
    let mut config = default_config();
    config.params.historical_entries = 0;
    let chain = TestChain::with_genesis(&config);
    let mut working_set = chain.working_set();

    begin_block(&chain, 1, &mut working_set);
    assert!(chain.opchild.historical_info(1, &working_set).is_none());
}

#[test]
fn historical_valset_is_sorted_by_power_then_address() {
    let mut config = default_config();
    config.validators = vec![validator(3), validator(2)];
    let chain = TestChain::with_genesis(&config);
    let mut working_set = chain.working_set();

    begin_block(&chain, 1, &mut working_set);
    let info = chain.opchild.historical_info(1, &working_set).unwrap();
    assert_eq!(info.valset, vec![validator(2), validator(3)]);
}

fn plan(height: u64, next: u8, executors: Vec<String>) -> ExecutorChangePlanRequest {
    ExecutorChangePlanRequest {
        proposal_id: 1,
        height,
        next_validator: val_address(next).to_string(),
        moniker: format!("validator-{next}"),
        cons_pubkey_json: serde_json::to_string(&pubkey(next)).unwrap(),
        info: "rotate".to_owned(),
        next_executors: executors,
    }
}

#[test]
fn executor_rotation_at_height() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();
    let e2 = user("executor-2");

    chain
        .opchild
        .register_executor_change_plan(plan(100, 2, vec![e2.to_string()]))
        .unwrap();
    assert!(matches!(
        chain
            .opchild
            .register_executor_change_plan(plan(100, 3, vec![e2.to_string()])),
        Err(OpChildError::InvalidExecutorChangePlan(_))
    ));
    assert_eq!(chain.opchild.executor_change_plans().len(), 1);

    begin_block(&chain, 99, &mut working_set);
    assert!(end_block(&chain, &mut working_set).is_empty());

    begin_block(&chain, 100, &mut working_set);
    let params = chain.opchild.params(&working_set).unwrap();
    assert_eq!(params.bridge_executors, vec![e2.to_string()]);
    assert_eq!(
        chain
            .opchild
            .validator(&val_address(1).to_string(), &working_set)
            .unwrap()
            .cons_power,
        0
    );

    let mut updates = end_block(&chain, &mut working_set);
    updates.sort_by_key(|update| update.power);
    assert_eq!(updates, vec![update(1, 0), update(2, 1)]);
    assert_eq!(
        chain.opchild.validators(&working_set).unwrap(),
        vec![validator(2)]
    );
    assert!(chain.opchild.executor_change_plans().is_empty());
}

#[test]
fn rotation_to_a_new_key_of_the_same_operator() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    let mut request = plan(5, 1, vec![user("executor-2").to_string()]);
    request.cons_pubkey_json = serde_json::to_string(&pubkey(9)).unwrap();
    chain.opchild.register_executor_change_plan(request).unwrap();

    begin_block(&chain, 5, &mut working_set);
    assert_eq!(
        end_block(&chain, &mut working_set),
        vec![update(1, 0), update(9, 1)]
    );
    assert!(end_block(&chain, &mut working_set).is_empty());

    let rotated = chain
        .opchild
        .validator(&val_address(1).to_string(), &working_set)
        .unwrap();
    assert_eq!(rotated.consensus_pubkey, pubkey(9));
    assert_eq!(rotated.cons_power, 1);

    // The retired key is free for another operator.
    chain
        .call(
            CallMessage::AddValidator {
                authority: authority().to_string(),
                moniker: "validator-2".to_owned(),
                validator_address: val_address(2).to_string(),
                pubkey: pubkey(1),
            },
            &context(6, 6),
            &mut working_set,
        )
        .unwrap();
    assert!(matches!(
        chain.call(
            CallMessage::AddValidator {
                authority: authority().to_string(),
                moniker: "validator-3".to_owned(),
                validator_address: val_address(3).to_string(),
                pubkey: pubkey(9),
            },
            &context(6, 6),
            &mut working_set,
        ),
        Err(OpChildError::DuplicateValidator(_))
    ));
}

#[test]
fn invalid_executor_change_plans() {
    let chain = TestChain::with_genesis(&default_config());
    let e2 = user("executor-2").to_string();

    let mut no_proposal = plan(100, 2, vec![e2.clone()]);
    no_proposal.proposal_id = 0;
    let mut bad_validator = plan(100, 2, vec![e2.clone()]);
    bad_validator.next_validator = user("not-a-valoper").to_string();
    let mut bad_key = plan(100, 2, vec![e2.clone()]);
    bad_key.cons_pubkey_json = r#"{"@type":"/unknown.PubKey","key":"AA=="}"#.to_owned();
    let no_executors = plan(100, 2, vec![]);

    for request in [no_proposal, bad_validator, bad_key, no_executors] {
        assert!(matches!(
            chain.opchild.register_executor_change_plan(request),
            Err(OpChildError::InvalidExecutorChangePlan(_))
        ));
    }
    assert!(chain.opchild.executor_change_plans().is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    Remove(u8),
    EndBlock,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u8..8).prop_map(Op::Add),
        (1u8..8).prop_map(Op::Remove),
        Just(Op::EndBlock),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn updates_track_the_bonded_set(ops in prop::collection::vec(op(), 1..30)) {
        let chain = TestChain::new();
        let mut working_set = chain.working_set();

        // The set consensus knows, built only from reported updates.
        let mut consensus: BTreeMap<Vec<u8>, i64> = BTreeMap::new();
        let apply = |consensus: &mut BTreeMap<Vec<u8>, i64>, updates: Vec<ValidatorUpdate>| {
            for update in updates {
                if update.power == 0 {
                    consensus.remove(update.pub_key.as_bytes());
                } else {
                    consensus.insert(update.pub_key.as_bytes().to_vec(), update.power);
                }
            }
        };

        let genesis = chain.opchild.genesis(&default_config(), &mut working_set).unwrap();
        apply(&mut consensus, genesis);

        for op in ops.into_iter().chain(std::iter::once(Op::EndBlock)) {
            match op {
                Op::Add(seed) => {
                    let _ = chain.call(add(seed), &context(2, 2), &mut working_set);
                }
                Op::Remove(seed) => {
                    let _ = chain.call(remove(seed), &context(2, 2), &mut working_set);
                }
                Op::EndBlock => {
                    let updates = end_block(&chain, &mut working_set);
                    apply(&mut consensus, updates);

                    let bonded: BTreeMap<Vec<u8>, i64> = chain
                        .opchild
                        .validators(&working_set)
                        .unwrap()
                        .into_iter()
                        .filter(|validator| validator.cons_power > 0)
                        .map(|validator| (validator.consensus_pubkey.as_bytes().to_vec(), validator.cons_power))
                        .collect();
                    prop_assert_eq!(&consensus, &bonded);
                    // Tombstoned validators never survive an end block.
                    prop_assert!(chain
                        .opchild
                        .validators(&working_set)
                        .unwrap()
                        .iter()
                        .all(|validator| validator.cons_power > 0));
                }
            }
        }
    }
}

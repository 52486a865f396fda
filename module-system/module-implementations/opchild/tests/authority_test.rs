mod helpers;

use helpers::*;
use opchild::address::{to_bech32, AccAddress};
use opchild::capabilities::{AnyMsg, BankKeeper};
use opchild::events::*;
use opchild::mocks::MsgSend;
use opchild::types::{Coin, DecCoin, Timestamp};
use opchild::{CallMessage, LegacyContent, OpChildError};

fn add_validator(seed: u8) -> AnyMsg {
    CallMessage::AddValidator {
        authority: authority().to_string(),
        moniker: format!("validator-{seed}"),
        validator_address: val_address(seed).to_string(),
        pubkey: pubkey(seed),
    }
    .to_any()
}

fn execute(sender: &AccAddress, messages: Vec<AnyMsg>) -> CallMessage {
    CallMessage::ExecuteMessages {
        sender: sender.to_string(),
        messages,
    }
}

#[test]
fn update_params_requires_the_authority() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    let mut params = default_params();
    params.max_validators = 7;
    params.min_gas_prices = vec![DecCoin::new("0.01", "uatom"), DecCoin::new("0.2", "umin")];

    let by_admin = CallMessage::UpdateParams {
        authority: admin().to_string(),
        params: params.clone(),
    };
    assert!(matches!(
        chain.call(by_admin, &context(2, 2), &mut working_set),
        Err(OpChildError::Unauthorized(_))
    ));

    let mut unsorted = params.clone();
    unsorted.min_gas_prices.reverse();
    let invalid = CallMessage::UpdateParams {
        authority: authority().to_string(),
        params: unsorted,
    };
    assert!(matches!(
        chain.call(invalid, &context(2, 2), &mut working_set),
        Err(OpChildError::InvalidParams(_))
    ));

    let valid = CallMessage::UpdateParams {
        authority: authority().to_string(),
        params: params.clone(),
    };
    chain.call(valid, &context(2, 2), &mut working_set).unwrap();
    assert_eq!(chain.opchild.params(&working_set).unwrap(), params);
}

#[test]
fn spend_fee_pool_pays_out_of_the_collector() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();
    let recipient = user("recipient");
    let collector = chain.host.bank.fee_collector().clone();
    chain
        .host
        .bank
        .fund(&collector, &Coin::new(50, DENOM), &mut working_set);

    let spend = |amount| CallMessage::SpendFeePool {
        authority: authority().to_string(),
        recipient: recipient.to_string(),
        amount: vec![Coin::new(amount, DENOM)],
    };

    chain.call(spend(30), &context(2, 2), &mut working_set).unwrap();
    assert_eq!(chain.balance(&recipient, &working_set), 30);
    assert_eq!(chain.balance(&collector, &working_set), 20);
    let event = working_set
        .events()
        .iter()
        .find(|event| event.ty() == EVENT_SPEND_FEE_POOL)
        .unwrap();
    assert_eq!(event.attribute(ATTR_AMOUNT), Some("30umin"));

    assert!(matches!(
        chain.call(spend(21), &context(2, 2), &mut working_set),
        Err(OpChildError::Host(_))
    ));
    assert!(matches!(
        chain.call(spend(0), &context(2, 2), &mut working_set),
        Err(OpChildError::InvalidAmount(_))
    ));
    assert_eq!(chain.balance(&collector, &working_set), 20);
}

#[test]
fn execute_messages_runs_as_the_authority() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    chain
        .call(
            execute(&admin(), vec![add_validator(2), add_validator(3)]),
            &context(2, 2),
            &mut working_set,
        )
        .unwrap();
    assert_eq!(chain.opchild.validators(&working_set).unwrap().len(), 3);

    // Validator accounts may execute too.
    let validator_account = AccAddress::from(&val_address(1));
    chain
        .call(
            execute(&validator_account, vec![add_validator(4)]),
            &context(2, 2),
            &mut working_set,
        )
        .unwrap();
    assert_eq!(chain.opchild.validators(&working_set).unwrap().len(), 4);
}

#[test]
fn execute_messages_checks_sender_and_signers() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    assert!(matches!(
        chain.call(
            execute(&user("stranger"), vec![add_validator(2)]),
            &context(2, 2),
            &mut working_set
        ),
        Err(OpChildError::Unauthorized(_))
    ));
    assert!(matches!(
        chain.call(execute(&admin(), vec![]), &context(2, 2), &mut working_set),
        Err(OpChildError::InvalidExecuteMsg(_))
    ));

    let user_send = MsgSend {
        from_address: user("victim").to_string(),
        to_address: admin().to_string(),
        amount: vec![Coin::new(1, DENOM)],
    }
    .to_any();
    assert!(matches!(
        chain.call(execute(&admin(), vec![user_send]), &context(2, 2), &mut working_set),
        Err(OpChildError::Unauthorized(_))
    ));

    let unknown = AnyMsg::new("/unknown.Msg", vec![]);
    assert!(matches!(
        chain.call(execute(&admin(), vec![unknown]), &context(2, 2), &mut working_set),
        Err(OpChildError::InvalidExecuteMsg(_))
    ));
}

#[test]
fn execute_messages_is_atomic() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();

    // The second message duplicates the genesis validator.
    let result = chain.call(
        execute(&admin(), vec![add_validator(2), add_validator(1)]),
        &context(2, 2),
        &mut working_set,
    );
    assert!(matches!(result, Err(OpChildError::DuplicateValidator(_))));
    assert_eq!(chain.opchild.validators(&working_set).unwrap(), vec![validator(1)]);
    assert!(working_set
        .events()
        .iter()
        .all(|event| event.ty() != EVENT_ADD_VALIDATOR));
}

#[test]
fn legacy_contents_are_routed() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();
    let funded = user("funded");

    let contents = |routes: &[&str]| CallMessage::ExecuteLegacyContents {
        sender: authority().to_string(),
        contents: routes
            .iter()
            .map(|route| LegacyContent {
                route: (*route).to_owned(),
                data: funded.as_bytes().to_vec(),
            })
            .collect(),
    };

    chain
        .call(contents(&["fund", "fund"]), &context(2, 2), &mut working_set)
        .unwrap();
    assert_eq!(chain.balance(&funded, &working_set), 2);

    assert!(chain
        .call(contents(&["fund", "fail"]), &context(2, 2), &mut working_set)
        .is_err());
    assert!(matches!(
        chain.call(contents(&["fund", "missing"]), &context(2, 2), &mut working_set),
        Err(OpChildError::InvalidRoute(_))
    ));
    assert_eq!(chain.balance(&funded, &working_set), 2);
}

#[test]
fn bridge_identity_is_immutable() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();
    chain.set_bridge_info(3600, &mut working_set);

    let mut longer = bridge_info(7200);
    longer.l1_client_id = "07-tendermint-1".to_owned();
    chain
        .call(
            CallMessage::SetBridgeInfo {
                sender: user("relayer").to_string(),
                bridge_info: longer.clone(),
            },
            &context(2, 2),
            &mut working_set,
        )
        .unwrap();
    assert_eq!(chain.opchild.bridge_info(&working_set), Some(longer));

    let mut other_bridge = bridge_info(3600);
    other_bridge.bridge_id = 2;
    let mut other_chain = bridge_info(3600);
    other_chain.l1_chain_id = "l1-2".to_owned();
    for info in [other_bridge, other_chain] {
        assert!(matches!(
            chain.call(
                CallMessage::SetBridgeInfo {
                    sender: user("relayer").to_string(),
                    bridge_info: info,
                },
                &context(2, 2),
                &mut working_set,
            ),
            Err(OpChildError::InvalidBridgeInfo(_))
        ));
    }
}

#[test]
fn disabled_bridge_shuts_down() {
    let chain = TestChain::with_genesis(&default_config());
    let mut working_set = chain.working_set();
    chain.set_bridge_info(3600, &mut working_set);

    let holder = user("holder");
    chain
        .call(deposit(1, &holder, 100, vec![]), &context(2, 2), &mut working_set)
        .unwrap();
    // Not bridged, so it stays on L2.
    chain
        .host
        .bank
        .fund(&holder, &Coin::new(5, "unative"), &mut working_set);

    let mut disabled = bridge_info(3600);
    disabled.bridge_config.bridge_disabled = true;
    disabled.bridge_config.bridge_disabled_at = Some(Timestamp::from_seconds(3));
    let disable = CallMessage::SetBridgeInfo {
        sender: user("relayer").to_string(),
        bridge_info: disabled,
    };
    chain.call(disable.clone(), &context(3, 3), &mut working_set).unwrap();

    assert_eq!(chain.balance(&holder, &working_set), 0);
    assert_eq!(
        BankKeeper::<S>::balance(chain.host.bank.as_ref(), &holder, "unative", &working_set),
        5
    );
    assert!(chain.opchild.withdrawal_commitment(1, &working_set).is_some());
    let withdrawal = working_set
        .events()
        .iter()
        .find(|event| event.ty() == EVENT_INITIATE_TOKEN_WITHDRAWAL)
        .unwrap();
    let l1_holder = to_bech32("init", holder.as_bytes()).unwrap();
    assert_eq!(withdrawal.attribute(ATTR_TO), Some(l1_holder.as_str()));
    assert!(chain.opchild.validators(&working_set).unwrap().is_empty());
    assert!(working_set
        .events()
        .iter()
        .any(|event| event.ty() == EVENT_SHUTDOWN));

    // A second observation finds nothing left.
    working_set.take_events();
    chain.call(disable, &context(4, 4), &mut working_set).unwrap();
    assert!(chain.opchild.withdrawal_commitment(2, &working_set).is_none());
    assert!(working_set
        .events()
        .iter()
        .all(|event| event.ty() != EVENT_SHUTDOWN));
}

#![allow(non_snake_case)]

use super::*;
use crate::{
    config::NetworkConfig,
    gateway::in_memory::{
        InMemoryContracts,
        InMemoryWallet,
    },
    quiz::FailReason,
    tally::VoteCount,
};
use proptest::prelude::*;
use std::time::Duration;

type Controller = BattleController<InMemoryWallet, InMemoryContracts>;

const CHAIN_ID: u64 = 133;

fn alice() -> Address {
    Address::from_bytes([0xa1; 20])
}

fn bob() -> Address {
    Address::from_bytes([0xb0; 20])
}

fn statements(items: &[(&str, bool)]) -> Vec<Statement> {
    items
        .iter()
        .map(|(text, answer)| Statement::new(*text, *answer))
        .collect()
}

fn create_form(items: &[(&str, bool)]) -> CreateBattleForm {
    CreateBattleForm {
        title: "A vs B".to_string(),
        option_a: "A".to_string(),
        bet_amount: "0.01".to_string(),
        quiz_count: items.len(),
        statements: statements(items),
        photo: None,
    }
}

fn accept_form(items: &[(&str, bool)]) -> AcceptForm {
    AcceptForm {
        option_b: "B".to_string(),
        statements: statements(items),
        photo: None,
    }
}

fn controller_with(config: BattleConfig) -> Controller {
    let wallet = InMemoryWallet::new(CHAIN_ID)
        .with_account(alice(), Wei(10_000_000_000_000_000_000))
        .with_account(bob(), Wei(5_000_000_000_000_000_000));
    BattleController::new(config, wallet, InMemoryContracts::new())
}

fn controller() -> Controller {
    controller_with(BattleConfig::default())
}

fn local_controller() -> Controller {
    controller_with(BattleConfig {
        deploy_contracts: false,
        ..BattleConfig::default()
    })
}

async fn switch_to(controller: &mut Controller, account: Address) {
    controller.wallet().select_account(&account).unwrap();
    let accounts = controller.wallet().accounts().unwrap();
    controller.on_accounts_changed(&accounts);
}

/// Alice creates, Bob accepts.
async fn active_battle(
    controller: &mut Controller,
    a: &[(&str, bool)],
    b: &[(&str, bool)],
) -> BattleId {
    controller.connect_wallet().await.unwrap();
    let id = controller.create_battle(create_form(a)).await.unwrap();
    switch_to(controller, bob()).await;
    controller.accept_battle(id, accept_form(b)).await.unwrap();
    id
}

#[tokio::test]
async fn create_battle__valid_form__enters_waiting_view_with_contract() {
    // given
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();

    // when
    let id = controller
        .create_battle(create_form(&[("Q1", true)]))
        .await
        .unwrap();

    // then
    let battle = controller.store().get(id).unwrap();
    assert!(battle.is_waiting());
    assert_eq!(battle.phase, BattlePhase::Waiting);
    assert_eq!(battle.my_choice, Some(Choice::A));
    assert_eq!(battle.bet_amount, Wei(10_000_000_000_000_000));
    assert_eq!(battle.creator, Some(alice()));
    assert!(battle.escrow.is_some());
    assert_eq!(battle.chain_battle_id, Some(1));
    assert_eq!(controller.waiting().len(), 1);
    assert!(controller.hot().is_empty());
    assert_eq!(controller.mine().len(), 1);
}

#[tokio::test]
async fn create_battle__missing_fields__are_rejected_without_mutation() {
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();

    let blank_title = CreateBattleForm {
        title: "  ".to_string(),
        ..create_form(&[("Q1", true)])
    };
    let blank_amount = CreateBattleForm {
        bet_amount: String::new(),
        ..create_form(&[("Q1", true)])
    };

    assert_eq!(
        controller.create_battle(blank_title).await,
        Err(Rejection::MissingField("title"))
    );
    assert_eq!(
        controller.create_battle(blank_amount).await,
        Err(Rejection::MissingField("bet amount"))
    );
    assert!(controller.store().is_empty());
    assert_eq!(controller.contracts().battle_count().unwrap(), 0);
}

#[tokio::test]
async fn create_battle__statement_count_mismatch__is_rejected() {
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    let form = CreateBattleForm {
        quiz_count: 2,
        ..create_form(&[("Q1", true)])
    };

    let result = controller.create_battle(form).await;

    assert_eq!(
        result,
        Err(Rejection::QuizCountMismatch {
            expected: 2,
            actual: 1
        })
    );
    assert!(controller.store().is_empty());
}

#[tokio::test]
async fn create_battle__quiz_count_out_of_range__is_rejected() {
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    let six: Vec<(&str, bool)> = vec![("Q", true); 6];

    let result = controller.create_battle(create_form(&six)).await;

    assert_eq!(result, Err(Rejection::QuizCountOutOfRange(6)));
}

#[tokio::test]
async fn create_battle__zero_or_malformed_amount__is_rejected() {
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();

    let zero = CreateBattleForm {
        bet_amount: "0".to_string(),
        ..create_form(&[("Q1", true)])
    };
    let garbage = CreateBattleForm {
        bet_amount: "ten".to_string(),
        ..create_form(&[("Q1", true)])
    };

    assert_eq!(
        controller.create_battle(zero).await,
        Err(Rejection::InvalidAmount("0".to_string()))
    );
    assert!(matches!(
        controller.create_battle(garbage).await,
        Err(Rejection::InvalidAmount(_))
    ));
}

#[tokio::test]
async fn create_battle__deployment_fails__surfaces_failure_and_keeps_store_clean() {
    // given
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    controller
        .contracts()
        .fail_next("gas estimation failed")
        .unwrap();

    // when
    let result = controller.create_battle(create_form(&[("Q1", true)])).await;

    // then
    assert_eq!(
        result,
        Err(Rejection::Collaborator("gas estimation failed".to_string()))
    );
    assert!(controller.store().is_empty());
    assert_eq!(controller.store().pending().count(), 0);
}

#[tokio::test]
async fn create_battle__deploying_without_wallet__is_rejected() {
    let mut controller = controller();

    let result = controller.create_battle(create_form(&[("Q1", true)])).await;

    assert_eq!(result, Err(Rejection::WalletNotConnected));
}

#[tokio::test]
async fn create_battle__local_mode__needs_no_wallet_or_contract() {
    let mut controller = local_controller();

    let id = controller
        .create_battle(create_form(&[("Q1", true)]))
        .await
        .unwrap();

    let battle = controller.store().get(id).unwrap();
    assert_eq!(battle.escrow, None);
    assert_eq!(battle.chain_battle_id, None);
    assert_eq!(controller.contracts().battle_count().unwrap(), 0);
}

#[tokio::test]
async fn accept_battle__valid_challenge__moves_battle_to_hot_view() {
    // given
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    let id = controller
        .create_battle(create_form(&[("Q1", true)]))
        .await
        .unwrap();
    switch_to(&mut controller, bob()).await;

    // when
    controller
        .accept_battle(id, accept_form(&[("Q2", false)]))
        .await
        .unwrap();

    // then
    let battle = controller.store().get(id).unwrap();
    assert!(!battle.is_waiting());
    assert_eq!(battle.phase, BattlePhase::Active);
    assert_eq!(battle.participants, 2);
    assert_eq!(battle.label(Choice::B), "B");
    assert_eq!(battle.challenger, Some(bob()));
    assert_eq!(battle.my_choice, Some(Choice::B));
    assert!(battle.side_betting.is_some());
    assert!(controller.waiting().is_empty());
    assert_eq!(controller.hot()[0].id, id);
}

#[tokio::test]
async fn accept_battle__wrong_statement_count__leaves_battle_waiting() {
    let mut controller = local_controller();
    let id = controller
        .create_battle(create_form(&[("Q1", true), ("Q2", true)]))
        .await
        .unwrap();

    let result = controller
        .accept_battle(id, accept_form(&[("Q3", true)]))
        .await;

    assert_eq!(
        result,
        Err(Rejection::QuizCountMismatch {
            expected: 2,
            actual: 1
        })
    );
    assert!(controller.store().get(id).unwrap().is_waiting());
}

#[tokio::test]
async fn accept_battle__skip_quiz_validation__drops_blank_statements() {
    let mut controller = controller_with(BattleConfig {
        deploy_contracts: false,
        skip_quiz_validation: true,
        ..BattleConfig::default()
    });
    let id = controller
        .create_battle(create_form(&[("Q1", true), ("Q2", true)]))
        .await
        .unwrap();

    controller
        .accept_battle(id, accept_form(&[("Q3", true), ("  ", false)]))
        .await
        .unwrap();

    let option_b = controller.store().get(id).unwrap().option_b.clone().unwrap();
    assert_eq!(option_b.statements, statements(&[("Q3", true)]));
}

#[tokio::test]
async fn accept_battle__already_accepted__is_rejected() {
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("Q1", true)], &[("Q2", true)]).await;

    let result = controller
        .accept_battle(id, accept_form(&[("Q3", true)]))
        .await;

    assert_eq!(result, Err(Rejection::NotWaiting(id)));
}

#[tokio::test]
async fn accept_battle__contract_refuses__keeps_battle_waiting() {
    // given
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    let id = controller
        .create_battle(create_form(&[("Q1", true)]))
        .await
        .unwrap();

    // when
    let result = controller
        .accept_battle(id, accept_form(&[("Q2", true)]))
        .await;

    // then
    assert!(matches!(result, Err(Rejection::Collaborator(_))));
    assert!(controller.store().get(id).unwrap().is_waiting());
    assert_eq!(controller.store().pending().count(), 0);
}

#[tokio::test]
async fn join_committee__presents_side_a_then_side_b() {
    // given
    let mut controller = controller();
    let id = active_battle(
        &mut controller,
        &[("A0", true), ("A1", false)],
        &[("B0", true), ("B1", false)],
    )
    .await;
    let now = Instant::now();

    // when
    let first = controller.join_committee(id, now).unwrap();

    // then
    assert_eq!(first.question, "A0");
    assert_eq!(first.player, Choice::A);
    assert!(controller.is_committee_mode());
    assert_eq!(
        controller.store().get(id).unwrap().phase,
        BattlePhase::CommitteeRecruiting
    );

    let mut seen = vec![(first.question, first.player)];
    for answer in [true, false, true] {
        controller.answer_question(answer, now).unwrap();
        let current = controller.current_question().unwrap();
        seen.push((current.question.clone(), current.player));
    }
    assert_eq!(
        seen,
        vec![
            ("A0".to_string(), Choice::A),
            ("A1".to_string(), Choice::A),
            ("B0".to_string(), Choice::B),
            ("B1".to_string(), Choice::B),
        ]
    );
}

#[tokio::test]
async fn join_committee__battle_without_quiz_data__is_a_hard_stop() {
    // given
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    let id = controller
        .create_battle(create_form(&[("Q1", true)]))
        .await
        .unwrap();
    let chain_id = controller.store().get(id).unwrap().chain_battle_id.unwrap();
    controller
        .contracts()
        .accept_battle(chain_id, &bob(), "B")
        .await
        .unwrap();
    controller.refresh_from_chain().await.unwrap();

    // when
    let result = controller.join_committee(id, Instant::now());

    // then
    assert_eq!(result, Err(Rejection::NoQuizzes(id)));
    assert!(!controller.is_committee_mode());
    assert_eq!(controller.store().get(id).unwrap().phase, BattlePhase::Active);
}

#[tokio::test]
async fn join_committee__waiting_battle__is_rejected() {
    let mut controller = local_controller();
    let id = controller
        .create_battle(create_form(&[("Q1", true)]))
        .await
        .unwrap();

    let result = controller.join_committee(id, Instant::now());

    assert_eq!(result, Err(Rejection::NotActive(id)));
}

#[tokio::test]
async fn join_committee__second_session__is_rejected() {
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("Q1", true)], &[("Q2", true)]).await;
    let now = Instant::now();
    controller.join_committee(id, now).unwrap();

    assert_eq!(
        controller.join_committee(id, now),
        Err(Rejection::SessionInProgress)
    );
}

#[tokio::test]
async fn answer_question__incorrect__disqualifies_and_restores_phase() {
    // given
    let mut controller = controller();
    let id = active_battle(
        &mut controller,
        &[("S1", true), ("S2", false)],
        &[("S3", true), ("S4", true)],
    )
    .await;
    let now = Instant::now();
    controller.join_committee(id, now).unwrap();
    controller.answer_question(true, now).unwrap();

    // when
    let step = controller.answer_question(true, now).unwrap();

    // then
    assert_eq!(
        step,
        QuizStep::Failed {
            at: 1,
            reason: FailReason::Incorrect
        }
    );
    assert!(!controller.is_committee_mode());
    assert!(controller.vote_prompt().is_none());
    assert_eq!(controller.store().get(id).unwrap().phase, BattlePhase::Active);
    assert_eq!(
        controller.answer_question(true, now),
        Err(Rejection::NoSession)
    );
}

#[tokio::test(start_paused = true)]
async fn tick__deadline_reached__times_out_like_a_wrong_answer() {
    // given
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    controller.join_committee(id, Instant::now()).unwrap();

    // when
    tokio::time::advance(Duration::from_millis(2_999)).await;
    let early = controller.tick(Instant::now());
    tokio::time::advance(Duration::from_millis(1)).await;
    let late = controller.tick(Instant::now());

    // then
    assert_eq!(early, None);
    assert_eq!(
        late,
        Some(QuizStep::Failed {
            at: 0,
            reason: FailReason::TimedOut
        })
    );
    assert!(!controller.is_committee_mode());
    assert_eq!(controller.last_score(), None);
    assert_eq!(controller.store().get(id).unwrap().phase, BattlePhase::Active);
}

#[tokio::test(start_paused = true)]
async fn countdown__steps_down_between_answers() {
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    controller.join_committee(id, Instant::now()).unwrap();

    assert_eq!(controller.countdown(Instant::now()), Some(3.0));
    tokio::time::advance(Duration::from_millis(2_500)).await;
    assert_eq!(controller.countdown(Instant::now()), Some(0.5));

    controller.answer_question(true, Instant::now()).unwrap();
    assert_eq!(controller.countdown(Instant::now()), Some(3.0));
}

#[tokio::test(start_paused = true)]
async fn expire__stale_token_from_previous_question__is_ignored() {
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    controller.join_committee(id, Instant::now()).unwrap();
    let stale = controller.committee_token().unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;
    controller.answer_question(true, Instant::now()).unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;

    assert_eq!(controller.expire(stale, Instant::now()), None);
    assert!(controller.is_committee_mode());
}

#[tokio::test]
async fn abandon_committee__restores_prior_phase() {
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    controller.join_committee(id, Instant::now()).unwrap();

    assert!(controller.abandon_committee());
    assert!(!controller.abandon_committee());
    assert_eq!(controller.store().get(id).unwrap().phase, BattlePhase::Active);
}

#[tokio::test]
async fn submit_vote__requires_selection_then_records_choice() {
    // given
    let mut controller = controller();
    let id = active_battle(
        &mut controller,
        &[("S1", true), ("S2", false)],
        &[("S3", false), ("S4", false)],
    )
    .await;
    let now = Instant::now();
    controller.join_committee(id, now).unwrap();
    controller.answer_question(true, now).unwrap();
    controller.answer_question(false, now).unwrap();
    controller.answer_question(false, now).unwrap();
    let passed = controller.answer_question(false, now).unwrap();
    assert!(matches!(passed, QuizStep::Passed { .. }));
    assert_eq!(controller.last_score(), Some(QuizScore { a: 0, b: -2 }));
    assert_eq!(controller.vote_prompt().unwrap().selected(), None);
    assert_eq!(controller.store().get(id).unwrap().phase, BattlePhase::Voting);

    // when
    let unselected = controller.submit_vote();

    // then
    assert_eq!(unselected, Err(Rejection::NoVoteSelected));
    assert!(controller.vote_prompt().is_some());

    // when
    controller.select_vote(Choice::A).unwrap();
    let receipt = controller.submit_vote().unwrap();

    // then
    assert_eq!(
        receipt,
        VoteReceipt {
            battle: id,
            choice: Choice::A,
            label: "A".to_string(),
            count: VoteCount { a: 1, b: 0 },
            phase: BattlePhase::Voting,
        }
    );
    assert!(controller.vote_prompt().is_none());
    let battle = controller.store().get(id).unwrap();
    assert_eq!(battle.vote, Some(Choice::A));
    assert_eq!(battle.votes.len(), 1);
    assert_eq!(battle.phase, BattlePhase::Voting);
}

/// Joins the committee as the current account, answers every question
/// correctly and votes for `choice`.
fn qualify_and_vote(controller: &mut Controller, id: BattleId, choice: Choice) -> VoteReceipt {
    let now = Instant::now();
    controller.join_committee(id, now).unwrap();
    let answers: Vec<bool> = {
        let battle = controller.store().get(id).unwrap();
        let b = battle.option_b.as_ref().unwrap();
        battle
            .option_a
            .statements
            .iter()
            .chain(&b.statements)
            .map(|s| s.answer)
            .collect()
    };
    for answer in answers {
        controller.answer_question(answer, now).unwrap();
    }
    controller.select_vote(choice).unwrap();
    controller.submit_vote().unwrap()
}

#[tokio::test]
async fn submit_vote__two_members__both_count_and_committee_resolves() {
    // given
    let mut controller = controller_with(BattleConfig {
        minimum_committee: 2,
        ..BattleConfig::default()
    });
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", false)]).await;

    // when
    let first = qualify_and_vote(&mut controller, id, Choice::B);
    switch_to(&mut controller, alice()).await;
    let second = qualify_and_vote(&mut controller, id, Choice::B);

    // then
    assert_eq!(first.phase, BattlePhase::Voting);
    assert_eq!(second.phase, BattlePhase::Resolved);
    assert_eq!(second.count, VoteCount { a: 0, b: 2 });
    assert_eq!(second.count.leader(), Some(Choice::B));
    let battle = controller.store().get(id).unwrap();
    let voters: Vec<Option<Address>> = battle.votes.iter().map(|v| v.voter.clone()).collect();
    assert_eq!(voters, vec![Some(bob()), Some(alice())]);
    assert_eq!(
        controller.join_committee(id, Instant::now()),
        Err(Rejection::NotActive(id))
    );
}

#[tokio::test]
async fn join_committee__member_who_already_voted__is_rejected() {
    // given
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    qualify_and_vote(&mut controller, id, Choice::A);

    // when
    let again = controller.join_committee(id, Instant::now());

    // then
    assert_eq!(again, Err(Rejection::AlreadyVoted(id)));
    assert!(!controller.is_committee_mode());
    assert_eq!(controller.store().get(id).unwrap().phase, BattlePhase::Voting);
}

#[tokio::test]
async fn answer_question__failing_member_during_voting__keeps_voting_phase() {
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    qualify_and_vote(&mut controller, id, Choice::A);
    switch_to(&mut controller, alice()).await;
    let now = Instant::now();

    controller.join_committee(id, now).unwrap();
    let step = controller.answer_question(false, now).unwrap();

    assert!(matches!(step, QuizStep::Failed { at: 0, .. }));
    assert_eq!(controller.store().get(id).unwrap().phase, BattlePhase::Voting);
}

#[tokio::test]
async fn select_vote__without_prompt__is_rejected() {
    let mut controller = controller();

    assert_eq!(
        controller.select_vote(Choice::B),
        Err(Rejection::NoVotePrompt)
    );
    assert_eq!(controller.submit_vote(), Err(Rejection::NoVotePrompt));
}

#[tokio::test]
async fn place_side_bet__open_battle__reaches_side_betting_contract() {
    // given
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;

    // when
    controller
        .place_side_bet(id, Choice::B, "0.5")
        .await
        .unwrap();

    // then
    let bets = controller.contracts().side_bets().unwrap();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].bettor, bob());
    assert_eq!(bets[0].side, Choice::B);
    assert_eq!(bets[0].amount, Wei(500_000_000_000_000_000));
}

#[tokio::test]
async fn place_side_bet__local_or_waiting_battle__is_rejected() {
    let mut controller = local_controller();
    let id = controller
        .create_battle(create_form(&[("S1", true)]))
        .await
        .unwrap();

    assert_eq!(
        controller.place_side_bet(id, Choice::A, "1").await,
        Err(Rejection::NotActive(id))
    );

    controller
        .accept_battle(id, accept_form(&[("S2", true)]))
        .await
        .unwrap();
    assert_eq!(
        controller.place_side_bet(id, Choice::A, "1").await,
        Err(Rejection::NotDeployed(id))
    );
}

#[tokio::test]
async fn refresh_status__moves_phase_forward_only() {
    // given
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    let contract = controller.store().get(id).unwrap().side_betting.clone().unwrap();
    let voting = BattleStatus {
        is_active: true,
        voting_phase: true,
        ..BattleStatus::default()
    };
    controller.contracts().set_status(&contract, voting).unwrap();

    // when
    let advanced = controller.refresh_status(id).await.unwrap();
    controller
        .contracts()
        .set_status(&contract, BattleStatus::default())
        .unwrap();
    let after_regression = controller.refresh_status(id).await.unwrap();

    // then
    assert_eq!(advanced, BattlePhase::Voting);
    assert_eq!(after_regression, BattlePhase::Voting);
}

#[tokio::test]
async fn watch_status__delivers_updates_for_apply_status() {
    let mut controller = controller();
    let id = active_battle(&mut controller, &[("S1", true)], &[("S2", true)]).await;
    let contract = controller.store().get(id).unwrap().side_betting.clone().unwrap();
    let mut subscription = controller.watch_status(id).await.unwrap();

    let ended = BattleStatus {
        game_ended: true,
        ..BattleStatus::default()
    };
    controller.contracts().set_status(&contract, ended).unwrap();
    let update = subscription.changed().await.unwrap();

    assert_eq!(
        controller.apply_status(id, &update),
        Ok(BattlePhase::Resolved)
    );
}

#[tokio::test]
async fn on_chain_changed__other_network__records_warning() {
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    assert_eq!(controller.network_warning(), None);

    controller.on_chain_changed(1);

    assert!(controller.network_warning().unwrap().contains("HashKey Testnet"));
    controller.on_chain_changed(CHAIN_ID);
    assert_eq!(controller.network_warning(), None);
}

#[tokio::test]
async fn sync_account__follows_wallet_selection() {
    let mut controller = controller();
    controller.connect_wallet().await.unwrap();
    controller.wallet().select_account(&bob()).unwrap();

    let account = controller.sync_account().await.unwrap();

    assert_eq!(account, Some(bob()));
    assert_eq!(controller.session().unwrap().account, bob());

    controller.disconnect_wallet().await.unwrap();
    assert_eq!(controller.sync_account().await.unwrap(), None);
    assert_eq!(controller.session(), None);
}

#[tokio::test]
async fn on_accounts_changed__empty_list__disconnects() {
    let mut controller = controller_with(BattleConfig {
        network: NetworkConfig::local(),
        ..BattleConfig::default()
    });
    controller.connect_wallet().await.unwrap();
    assert!(controller.network_warning().is_some());

    controller.on_accounts_changed(&[]);

    assert_eq!(controller.session(), None);
    assert_eq!(controller.balance().await, Err(Rejection::WalletNotConnected));
}

#[tokio::test]
async fn refresh_from_chain__imports_unknown_battles() {
    let mut controller = controller();
    controller
        .contracts()
        .deploy_battle(DeployRequest {
            player1: bob(),
            minimum_committee: 3,
            bet_amount: Wei(1),
            side_a_label: "Cats".to_string(),
            duration_days: 7,
            title: "Cats vs Dogs".to_string(),
        })
        .await
        .unwrap();

    let count = controller.refresh_from_chain().await.unwrap();

    assert_eq!(count, 1);
    let waiting = controller.waiting();
    assert_eq!(waiting[0].title, "Cats vs Dogs");
    assert_eq!(waiting[0].label(Choice::A), "Cats");
    assert!(controller.mine().is_empty());
}

fn qualification_case() -> impl Strategy<Value = (Vec<bool>, Vec<bool>)> {
    (1usize..=5).prop_flat_map(|n| {
        (
            prop::collection::vec(any::<bool>(), 2 * n),
            prop::collection::vec(any::<bool>(), 2 * n),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 10, .. ProptestConfig::default() })]
    #[test]
    fn answer_question__qualifies_iff_every_answer_matches((expected, given) in qualification_case()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            _answer_question__qualifies_iff_every_answer_matches(expected, given).await.unwrap()
        });
    }
}

async fn _answer_question__qualifies_iff_every_answer_matches(
    expected: Vec<bool>,
    given: Vec<bool>,
) -> Result<(), TestCaseError> {
    // given
    let n = expected.len() / 2;
    let texts: Vec<String> = (0..expected.len()).map(|i| format!("S{i}")).collect();
    let items: Vec<(&str, bool)> = texts
        .iter()
        .map(String::as_str)
        .zip(expected.iter().copied())
        .collect();
    let mut controller = local_controller();
    let id = controller
        .create_battle(create_form(&items[..n]))
        .await
        .unwrap();
    controller
        .accept_battle(id, accept_form(&items[n..]))
        .await
        .unwrap();
    let now = Instant::now();
    controller.join_committee(id, now).unwrap();

    // when
    let mut last = None;
    for answer in &given {
        last = Some(controller.answer_question(*answer, now).unwrap());
        if last.as_ref().is_some_and(QuizStep::is_terminal) {
            break;
        }
    }

    // then
    let first_mismatch = expected.iter().zip(&given).position(|(e, g)| e != g);
    match first_mismatch {
        None => {
            prop_assert!(
                matches!(last, Some(QuizStep::Passed { answers: _ })),
                "expected the session to pass"
            );
            prop_assert!(controller.vote_prompt().is_some());
        }
        Some(at) => {
            prop_assert_eq!(
                last,
                Some(QuizStep::Failed {
                    at,
                    reason: FailReason::Incorrect
                })
            );
            prop_assert!(controller.vote_prompt().is_none());
        }
    }
    prop_assert!(!controller.is_committee_mode());
    Ok(())
}

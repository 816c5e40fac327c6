//! Settlement: exactly-once resolution, payouts, retries and failure
//! reporting.

mod common;

use std::sync::Arc;

use common::{FlakyStore, TestContext};
use shared::{Amount, GameType};

use backend::domain::{BetStatus, DrawStatus};
use backend::errors::SettlementError;

#[tokio::test]
async fn winners_are_paid_and_losers_are_not() {
    let ctx = TestContext::new();
    let winner = ctx.funded_account(1_000).await;
    let loser = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    let winning_bet = ctx
        .bets
        .place_bet(winner, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();
    let losing_bet = ctx
        .bets
        .place_bet(loser, draw.draw_id, "17", Amount::new_unchecked(300))
        .await
        .unwrap();

    let summary = ctx.settlement.settle(draw.draw_id, "42").await.unwrap();

    assert_eq!(summary.total_bets, 2);
    assert_eq!(summary.total_winners, 1);
    assert_eq!(summary.total_payout.as_minor(), 500 * 85);
    assert!(summary.failures.is_empty());

    assert_eq!(ctx.bet(winning_bet.bet_id).await.status, BetStatus::Won);
    assert_eq!(ctx.bet(losing_bet.bet_id).await.status, BetStatus::Lost);
    assert_eq!(ctx.balance(winner).await, 500 + 500 * 85);
    assert_eq!(ctx.balance(loser).await, 700);

    let stored = ctx.store.draw(draw.draw_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DrawStatus::Completed);
    assert_eq!(stored.winning_number.as_deref(), Some("42"));

    assert_eq!(
        ctx.notifier.winners(),
        vec![(winner, winning_bet.bet_id, 500 * 85)]
    );
    assert_eq!(
        ctx.notifier.broadcasts(),
        vec![(draw.draw_id, "42".to_string())]
    );
}

#[tokio::test]
async fn settling_twice_changes_nothing() {
    let ctx = TestContext::new();
    let winner = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    ctx.bets
        .place_bet(winner, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();
    ctx.settlement.settle(draw.draw_id, "42").await.unwrap();
    let paid = ctx.balance(winner).await;

    // a re-run with a different number must not re-resolve anything
    let err = ctx.settlement.settle(draw.draw_id, "17").await.unwrap_err();
    assert!(matches!(err, SettlementError::AlreadySettled(_)));

    assert_eq!(ctx.balance(winner).await, paid);
    assert_eq!(ctx.notifier.winners().len(), 1);
    let stored = ctx.store.draw(draw.draw_id).await.unwrap().unwrap();
    assert_eq!(stored.winning_number.as_deref(), Some("42"));
}

#[tokio::test]
async fn concurrent_settlements_resolve_exactly_once() {
    let ctx = TestContext::new();
    let winner = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    ctx.bets
        .place_bet(winner, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();

    let a = {
        let settlement = ctx.settlement.clone();
        let draw_id = draw.draw_id;
        tokio::spawn(async move { settlement.settle(draw_id, "42").await })
    };
    let b = {
        let settlement = ctx.settlement.clone();
        let draw_id = draw.draw_id;
        tokio::spawn(async move { settlement.settle(draw_id, "42").await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(SettlementError::AlreadySettled(_)))));

    // the payout landed exactly once
    assert_eq!(ctx.balance(winner).await, 500 + 500 * 85);
    assert_eq!(ctx.ledger_total(winner).await, 500 + 500 * 85);
}

#[tokio::test]
async fn malformed_winning_number_settles_nothing() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    let bet = ctx
        .bets
        .place_bet(account_id, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();

    for number in ["4", "421", "4x"] {
        let err = ctx.settlement.settle(draw.draw_id, number).await.unwrap_err();
        assert!(
            matches!(err, SettlementError::InvalidWinningNumber { expected: 2 }),
            "{number:?}"
        );
    }

    // the draw stays open and the bet stays pending
    let stored = ctx.store.draw(draw.draw_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DrawStatus::Upcoming);
    assert_eq!(ctx.bet(bet.bet_id).await.status, BetStatus::Pending);
}

#[tokio::test]
async fn settling_a_missing_draw_fails_cleanly() {
    let ctx = TestContext::new();
    let err = ctx.settlement.settle(404, "42").await.unwrap_err();
    assert!(matches!(err, SettlementError::DrawNotFound(404)));
}

#[tokio::test]
async fn transient_store_failures_are_retried() {
    let store = Arc::new(FlakyStore::new());
    let ctx = TestContext::with_store(store.clone());
    let winner = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;
    ctx.bets
        .place_bet(winner, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();

    // let the completion transaction through, then fail the first two
    // per-bet attempts; the third succeeds within the retry budget
    store.inject(1, 2);
    let summary = ctx.settlement.settle(draw.draw_id, "42").await.unwrap();

    assert!(summary.failures.is_empty());
    assert_eq!(summary.total_winners, 1);
    assert_eq!(ctx.balance(winner).await, 500 + 500 * 85);
}

#[tokio::test]
async fn exhausted_retries_are_reported_not_lost() {
    let store = Arc::new(FlakyStore::new());
    let ctx = TestContext::with_store(store.clone());
    let winner = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;
    let bet = ctx
        .bets
        .place_bet(winner, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();

    // outlast the whole retry budget for the single pending bet
    store.inject(1, 10);
    let summary = ctx.settlement.settle(draw.draw_id, "42").await.unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].bet_id, bet.bet_id);
    assert_eq!(summary.total_winners, 0);

    // the bet was not silently consumed: it is still pending and unpaid,
    // and the draw itself is completed so no new bets can slip in
    store.inject(0, 0);
    assert_eq!(ctx.bet(bet.bet_id).await.status, BetStatus::Pending);
    assert_eq!(ctx.balance(winner).await, 500);
    let stored = ctx.store.draw(draw.draw_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DrawStatus::Completed);
}

#[tokio::test]
async fn payout_credit_is_idempotent_per_bet() {
    let ctx = TestContext::new();
    let winner = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;
    let bet = ctx
        .bets
        .place_bet(winner, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();
    ctx.settlement.settle(draw.draw_id, "42").await.unwrap();
    let paid = ctx.balance(winner).await;

    // replaying the credit with the same reference is absorbed
    let mut tx = ctx.store.begin().await.unwrap();
    ctx.wallet
        .credit(&mut *tx, winner, bet.potential_payout, bet.bet_id)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(ctx.balance(winner).await, paid);
    assert_eq!(ctx.ledger_total(winner).await, paid);
}

//! Bet admission: validation, atomic stake reservation, cancellation.

mod common;

use chrono::{Duration, Utc};
use common::TestContext;
use shared::{Amount, GameType};

use backend::domain::BetStatus;
use backend::errors::BetError;

#[tokio::test]
async fn placing_a_bet_reserves_the_stake_and_freezes_the_payout() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    let bet = ctx
        .bets
        .place_bet(account_id, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();

    assert_eq!(bet.status, BetStatus::Pending);
    assert_eq!(bet.stake.as_minor(), 500);
    // stake * multiplier, fixed at placement time
    assert_eq!(bet.potential_payout.as_minor(), 500 * 85);
    assert_eq!(ctx.balance(account_id).await, 500);

    // a later multiplier change never reprices an existing bet
    ctx.registry.update_multiplier(draw.draw_id, 90).await.unwrap();
    assert_eq!(ctx.bet(bet.bet_id).await.potential_payout.as_minor(), 500 * 85);
}

#[tokio::test]
async fn insufficient_balance_leaves_no_partial_state() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    ctx.bets
        .place_bet(account_id, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();

    let err = ctx
        .bets
        .place_bet(account_id, draw.draw_id, "17", Amount::new_unchecked(600))
        .await
        .unwrap_err();
    assert!(matches!(err, BetError::InsufficientBalance));

    // no bet row, no ledger entry, no balance movement from the failure
    assert_eq!(ctx.balance(account_id).await, 500);
    assert_eq!(
        ctx.bets.bets_for_account(account_id, 10, 0).await.unwrap().len(),
        1
    );
    assert_eq!(ctx.ledger_total(account_id).await, 500);
}

#[tokio::test]
async fn number_must_match_the_game_width() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(10_000).await;
    let two = ctx.open_draw(GameType::TwoDigit).await;
    let three = ctx.open_draw(GameType::ThreeDigit).await;

    for number in ["4", "423", "4x", ""] {
        let err = ctx
            .bets
            .place_bet(account_id, two.draw_id, number, Amount::new_unchecked(500))
            .await
            .unwrap_err();
        assert!(matches!(err, BetError::InvalidNumber { expected: 2 }), "{number:?}");
    }

    let err = ctx
        .bets
        .place_bet(account_id, three.draw_id, "42", Amount::new_unchecked(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, BetError::InvalidNumber { expected: 3 }));

    assert_eq!(ctx.balance(account_id).await, 10_000);
}

#[tokio::test]
async fn stake_must_stay_within_the_draw_limits() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(100_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    for stake in [99, 50_001] {
        let err = ctx
            .bets
            .place_bet(account_id, draw.draw_id, "42", Amount::new_unchecked(stake))
            .await
            .unwrap_err();
        assert!(matches!(err, BetError::InvalidStake { .. }), "{stake}");
    }

    // the boundaries themselves are accepted
    ctx.bets
        .place_bet(account_id, draw.draw_id, "42", Amount::new_unchecked(100))
        .await
        .unwrap();
    ctx.bets
        .place_bet(account_id, draw.draw_id, "42", Amount::new_unchecked(50_000))
        .await
        .unwrap();
}

#[tokio::test]
async fn closed_and_unknown_draws_reject_bets() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(1_000).await;

    // draw time already passed
    let past = ctx
        .draw_at(GameType::TwoDigit, Utc::now() - Duration::minutes(1))
        .await;
    let err = ctx
        .bets
        .place_bet(account_id, past.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap_err();
    assert!(matches!(err, BetError::DrawClosed));

    // draw already settled
    let settled = ctx.open_draw(GameType::TwoDigit).await;
    ctx.settlement.settle(settled.draw_id, "42").await.unwrap();
    let err = ctx
        .bets
        .place_bet(account_id, settled.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap_err();
    assert!(matches!(err, BetError::DrawClosed));

    // draw that never existed
    let err = ctx
        .bets
        .place_bet(account_id, 9_999, "42", Amount::new_unchecked(500))
        .await
        .unwrap_err();
    assert!(matches!(err, BetError::DrawClosed));

    assert_eq!(ctx.balance(account_id).await, 1_000);
}

#[tokio::test]
async fn unknown_account_cannot_bet() {
    let ctx = TestContext::new();
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    let err = ctx
        .bets
        .place_bet(404, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap_err();
    assert!(matches!(err, BetError::AccountNotFound(404)));
}

#[tokio::test]
async fn cancelling_refunds_the_stake_exactly_once() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    let bet = ctx
        .bets
        .place_bet(account_id, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();
    assert_eq!(ctx.balance(account_id).await, 500);

    let cancelled = ctx.bets.cancel_bet(account_id, bet.bet_id).await.unwrap();
    assert_eq!(cancelled.status, BetStatus::Cancelled);
    assert_eq!(ctx.balance(account_id).await, 1_000);

    // a repeated cancellation neither errors into a double refund nor
    // moves money again
    let err = ctx.bets.cancel_bet(account_id, bet.bet_id).await.unwrap_err();
    assert!(matches!(err, BetError::NotCancellable));
    assert_eq!(ctx.balance(account_id).await, 1_000);
    assert_eq!(ctx.ledger_total(account_id).await, 1_000);
}

#[tokio::test]
async fn only_the_owner_may_cancel() {
    let ctx = TestContext::new();
    let owner = ctx.funded_account(1_000).await;
    let stranger = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    let bet = ctx
        .bets
        .place_bet(owner, draw.draw_id, "42", Amount::new_unchecked(500))
        .await
        .unwrap();

    let err = ctx.bets.cancel_bet(stranger, bet.bet_id).await.unwrap_err();
    assert!(matches!(err, BetError::BetNotFound(_)));
    assert_eq!(ctx.bet(bet.bet_id).await.status, BetStatus::Pending);
}

#[tokio::test]
async fn settled_bets_cannot_be_cancelled() {
    let ctx = TestContext::new();
    let account_id = ctx.funded_account(1_000).await;
    let draw = ctx.open_draw(GameType::TwoDigit).await;

    let bet = ctx
        .bets
        .place_bet(account_id, draw.draw_id, "17", Amount::new_unchecked(500))
        .await
        .unwrap();
    ctx.settlement.settle(draw.draw_id, "42").await.unwrap();

    let err = ctx.bets.cancel_bet(account_id, bet.bet_id).await.unwrap_err();
    assert!(matches!(err, BetError::NotCancellable));
    assert_eq!(ctx.bet(bet.bet_id).await.status, BetStatus::Lost);
}

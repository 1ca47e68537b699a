//! Integration tests for the savings controller.
//!
//! These tests exercise full custody flows across module boundaries,
//! simulating real-world scenarios: goal creation and readback, deposits
//! forwarded to the lending market, yield accrual distributed pro-rata
//! across goals, owner withdrawals, failed market calls, and the
//! automation sweep at maturity.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use vuna_engine::asset::{Address, AssetId};
use vuna_engine::controller::{ControllerConfig, SavingsController};
use vuna_engine::error::VunaError;
use vuna_engine::goal::GoalStatus;
use vuna_engine::market::InMemoryLendingMarket;
use vuna_engine::token::{AssetToken, InMemoryToken};

const CONTROLLER: Address = Address::from_bytes([0xC0; 20]);
const DEPLOYER: Address = Address::from_bytes([0xD0; 20]);
const AGENT: Address = Address::from_bytes([0x0A; 20]);
const POOL: Address = Address::from_bytes([0xF0; 20]);
const ALICE: Address = Address::from_bytes([0xA1; 20]);
const BOB: Address = Address::from_bytes([0xB0; 20]);
const USDC: AssetId = Address::from_bytes([0x01; 20]);
const DAI: AssetId = Address::from_bytes([0x02; 20]);

/// Controller plus retained handles to its collaborators, so tests can
/// move the market rate and mint custody funds mid-scenario.
struct Harness {
    c: SavingsController,
    market: Arc<Mutex<InMemoryLendingMarket>>,
    usdc: Arc<Mutex<InMemoryToken>>,
}

impl Harness {
    /// Two funded savers, unlimited controller allowance on both assets.
    fn new() -> Self {
        let mut usdc = InMemoryToken::new(USDC, "Mock USDC", "mUSDC", 6);
        let mut dai = InMemoryToken::new(DAI, "Mock DAI", "mDAI", 18);
        for saver in [ALICE, BOB] {
            usdc.mint(&saver, 1_000_000).unwrap();
            usdc.approve(&saver, &CONTROLLER, u64::MAX);
            dai.mint(&saver, 1_000_000).unwrap();
            dai.approve(&saver, &CONTROLLER, u64::MAX);
        }

        let usdc = Arc::new(Mutex::new(usdc));
        let dai = Arc::new(Mutex::new(dai));
        let market = Arc::new(Mutex::new(InMemoryLendingMarket::new()));

        let c = SavingsController::new(
            ControllerConfig {
                address: CONTROLLER,
                owner: DEPLOYER,
                automation: AGENT,
                lending_pool: POOL,
            },
            vec![Box::new(Arc::clone(&usdc)), Box::new(Arc::clone(&dai))],
            Box::new(Arc::clone(&market)),
        );

        Self { c, market, usdc }
    }

    /// Moves the USDC exchange rate, simulating accrued interest, and
    /// mints the value growth into custody so payouts stay fundable.
    fn accrue_usdc(&mut self, rate_bps: u64) {
        self.market.lock().unwrap().set_exchange_rate(USDC, rate_bps);
        let grown = self.c.vault_value(USDC);
        let mut usdc = self.usdc.lock().unwrap();
        let held = usdc.balance_of(&POOL);
        if grown > held {
            usdc.mint(&POOL, grown - held).unwrap();
        }
    }

    fn usdc_balance(&self, holder: &Address) -> u64 {
        self.usdc.lock().unwrap().balance_of(holder)
    }
}

fn in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

fn goal(c: &mut SavingsController, owner: Address, days: i64) -> u64 {
    c.set_goal(owner, "New Car", "For commuting", 10_000, in_days(days), USDC)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Goal lifecycle
// ---------------------------------------------------------------------------

#[test]
fn created_goal_reads_back_with_all_fields() {
    let mut h = Harness::new();
    let date = in_days(365);
    let id = h
        .c
        .set_goal(ALICE, "New Car", "For commuting", 10_000, date, USDC)
        .unwrap();

    let g = h.c.savings_goal(id).unwrap();
    assert_eq!(g.id, id);
    assert_eq!(g.owner, ALICE);
    assert_eq!(g.what, "New Car");
    assert_eq!(g.why, "For commuting");
    assert_eq!(g.target_amount, 10_000);
    assert_eq!(g.target_date, date);
    assert_eq!(g.deposit_token, USDC);
    assert_eq!(g.current_amount, 0);
    assert_eq!(g.status, GoalStatus::Open);
}

#[test]
fn first_goal_id_is_zero() {
    let mut h = Harness::new();
    assert_eq!(goal(&mut h.c, ALICE, 365), 0);
    assert_eq!(goal(&mut h.c, BOB, 365), 1);
}

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

#[test]
fn deposit_updates_goal_vault_and_balances() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);

    let receipt = h.c.deposit(ALICE, id, 10).unwrap();
    assert_eq!(receipt.amount, 10);
    assert_eq!(receipt.shares_minted, 10);

    assert_eq!(h.c.savings_goal(id).unwrap().current_amount, 10);
    assert_eq!(h.c.vault(USDC).unwrap().total_shares(), 10);
    assert_eq!(h.c.vault_value(USDC), 10);
    assert_eq!(h.usdc_balance(&ALICE), 999_990);
    assert_eq!(h.usdc_balance(&POOL), 10);
}

#[test]
fn anyone_may_deposit_into_an_open_goal() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);

    h.c.deposit(BOB, id, 500).unwrap();
    assert_eq!(h.c.savings_goal(id).unwrap().current_amount, 500);
    assert_eq!(h.usdc_balance(&BOB), 999_500);
}

#[test]
fn deposit_reaching_target_marks_goal_funded() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    let receipt = h.c.deposit(ALICE, id, 10_000).unwrap();
    assert_eq!(receipt.status, GoalStatus::Funded);
}

#[test]
fn deposit_to_unknown_goal_rejected() {
    let mut h = Harness::new();
    assert!(matches!(
        h.c.deposit(ALICE, 42, 100),
        Err(VunaError::GoalNotFound { goal_id: 42 })
    ));
}

#[test]
fn zero_amounts_rejected_everywhere() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    assert!(matches!(
        h.c.deposit(ALICE, id, 0),
        Err(VunaError::InvalidAmount)
    ));
    assert!(matches!(
        h.c.withdraw(ALICE, id, 0),
        Err(VunaError::InvalidAmount)
    ));
    assert!(matches!(
        h.c.set_goal(ALICE, "x", "y", 0, in_days(1), USDC),
        Err(VunaError::InvalidAmount)
    ));
}

#[test]
fn paused_market_aborts_deposit_without_side_effects() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    h.market.lock().unwrap().set_paused(true);

    let result = h.c.deposit(ALICE, id, 500);
    assert!(matches!(result, Err(VunaError::MarketDepositFailed { .. })));

    // Nothing moved.
    assert_eq!(h.c.savings_goal(id).unwrap().current_amount, 0);
    assert_eq!(h.c.goal_shares(id), Some(0));
    assert_eq!(h.c.vault(USDC).unwrap().total_shares(), 0);
    assert_eq!(h.usdc_balance(&ALICE), 1_000_000);
    assert_eq!(h.usdc_balance(&POOL), 0);
}

// ---------------------------------------------------------------------------
// Withdrawals and conservation
// ---------------------------------------------------------------------------

#[test]
fn principal_tracks_deposits_minus_withdrawals() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);

    h.c.deposit(ALICE, id, 4_000).unwrap();
    h.c.deposit(ALICE, id, 1_000).unwrap();
    h.c.withdraw(ALICE, id, 1_500).unwrap();
    assert_eq!(h.c.savings_goal(id).unwrap().current_amount, 3_500);
    assert_eq!(h.usdc_balance(&ALICE), 996_500);
}

#[test]
fn withdraw_then_redeposit_keeps_share_sums_consistent() {
    let mut h = Harness::new();
    let a = goal(&mut h.c, ALICE, 365);
    let b = goal(&mut h.c, BOB, 365);

    h.c.deposit(ALICE, a, 3_000).unwrap();
    h.c.deposit(BOB, b, 7_000).unwrap();
    h.c.withdraw(ALICE, a, 1_000).unwrap();
    h.c.deposit(ALICE, a, 500).unwrap();

    // Custody invariants: per-goal shares sum to the vault total, and the
    // per-goal values never sum past the vault's live value.
    let share_sum = h.c.goal_shares(a).unwrap() + h.c.goal_shares(b).unwrap();
    assert_eq!(share_sum, h.c.vault(USDC).unwrap().total_shares());

    let value_sum = h.c.goal_value(a).unwrap() + h.c.goal_value(b).unwrap();
    assert!(value_sum <= h.c.vault_value(USDC));
}

#[test]
fn owner_cannot_overdraw_and_strangers_cannot_withdraw() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    h.c.deposit(ALICE, id, 2_000).unwrap();

    assert!(matches!(
        h.c.withdraw(ALICE, id, 2_001),
        Err(VunaError::InsufficientFunds {
            redeemable: 2_000,
            requested: 2_001,
            ..
        })
    ));
    assert!(matches!(
        h.c.withdraw(BOB, id, 100),
        Err(VunaError::Unauthorized { caller }) if caller == BOB
    ));
    assert_eq!(h.c.goal_shares(id), Some(2_000));
}

#[test]
fn full_redemption_closes_goal_and_rejects_reuse() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    h.c.deposit(ALICE, id, 2_000).unwrap();

    let receipt = h.c.withdraw(ALICE, id, 2_000).unwrap();
    assert_eq!(receipt.status, GoalStatus::Withdrawn);
    assert_eq!(h.c.goal_shares(id), Some(0));
    assert_eq!(h.c.vault(USDC).unwrap().total_shares(), 0);

    assert!(matches!(
        h.c.deposit(ALICE, id, 1),
        Err(VunaError::GoalClosed { .. })
    ));
}

#[test]
fn deposit_that_would_overflow_custody_moves_nothing() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);

    // Custody already saturated: crediting the pool would overflow u64.
    h.usdc.lock().unwrap().mint(&POOL, u64::MAX).unwrap();

    let result = h.c.deposit(ALICE, id, 100);
    assert!(matches!(result, Err(VunaError::ArithmeticOverflow)));

    // Nothing moved: no shares minted, no market position raised.
    assert_eq!(h.c.goal_shares(id), Some(0));
    assert_eq!(h.c.vault(USDC).unwrap().total_shares(), 0);
    assert_eq!(h.c.vault_value(USDC), 0);
    assert_eq!(h.usdc_balance(&ALICE), 1_000_000);
}

#[test]
fn withdrawal_that_would_overflow_the_owner_moves_nothing() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    h.c.deposit(ALICE, id, 1_000).unwrap();

    // Saturate the owner's balance so the payout credit cannot fit.
    let held = h.usdc_balance(&ALICE);
    h.usdc.lock().unwrap().mint(&ALICE, u64::MAX - held).unwrap();

    let result = h.c.withdraw(ALICE, id, 500);
    assert!(matches!(result, Err(VunaError::ArithmeticOverflow)));

    assert_eq!(h.c.goal_shares(id), Some(1_000));
    assert_eq!(h.c.vault(USDC).unwrap().total_shares(), 1_000);
    assert_eq!(h.c.vault_value(USDC), 1_000);
    assert_eq!(h.usdc_balance(&POOL), 1_000);
}

#[test]
fn drained_custody_fails_withdrawal_cleanly() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    h.c.deposit(ALICE, id, 2_000).unwrap();

    // Simulate pool illiquidity: custody funds walk out the back door.
    h.usdc
        .lock()
        .unwrap()
        .transfer_out(&POOL, &DEPLOYER, 2_000)
        .unwrap();

    let result = h.c.withdraw(ALICE, id, 1_000);
    assert!(matches!(result, Err(VunaError::MarketWithdrawFailed { .. })));
    assert_eq!(h.c.goal_shares(id), Some(2_000));
    assert_eq!(h.c.vault(USDC).unwrap().total_shares(), 2_000);
}

// ---------------------------------------------------------------------------
// Yield distribution
// ---------------------------------------------------------------------------

#[test]
fn yield_distributes_pro_rata_across_goals() {
    let mut h = Harness::new();
    let a = goal(&mut h.c, ALICE, 365);
    let b = goal(&mut h.c, BOB, 365);
    h.c.deposit(ALICE, a, 1_000).unwrap();
    h.c.deposit(BOB, b, 3_000).unwrap();

    // 10% accrual: position value 4_000 -> 4_400.
    h.accrue_usdc(11_000);

    assert_eq!(h.c.vault_value(USDC), 4_400);
    assert_eq!(h.c.goal_value(a), Some(1_100));
    assert_eq!(h.c.goal_value(b), Some(3_300));
}

#[test]
fn withdrawal_after_yield_can_exceed_principal() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    h.c.deposit(ALICE, id, 1_000).unwrap();
    h.accrue_usdc(10_500); // +5%

    let before = h.usdc_balance(&ALICE);
    let receipt = h.c.withdraw(ALICE, id, 1_050).unwrap();
    assert_eq!(receipt.status, GoalStatus::Withdrawn);
    assert_eq!(h.usdc_balance(&ALICE), before + 1_050);

    // Principal saturates at zero rather than underflowing.
    assert_eq!(h.c.savings_goal(id).unwrap().current_amount, 0);
}

#[test]
fn later_depositor_does_not_capture_earlier_yield() {
    let mut h = Harness::new();
    let a = goal(&mut h.c, ALICE, 365);
    let b = goal(&mut h.c, BOB, 365);

    h.c.deposit(ALICE, a, 1_000).unwrap();
    h.accrue_usdc(12_500); // Alice's position now worth 1_250.
    h.c.deposit(BOB, b, 1_000).unwrap(); // floor(1000 * 1000 / 1250) = 800 shares

    assert_eq!(h.c.goal_shares(a), Some(1_000));
    assert_eq!(h.c.goal_shares(b), Some(800));
    assert_eq!(h.c.goal_value(a), Some(1_250));
    assert_eq!(h.c.goal_value(b), Some(1_000));
}

// ---------------------------------------------------------------------------
// Automation sweep
// ---------------------------------------------------------------------------

#[test]
fn sweep_pays_matured_goals_and_leaves_open_ones() {
    let mut h = Harness::new();
    let due = goal(&mut h.c, ALICE, -1);
    let open = goal(&mut h.c, BOB, 365);
    h.c.deposit(ALICE, due, 800).unwrap();
    h.c.deposit(BOB, open, 900).unwrap();

    let before = h.usdc_balance(&ALICE);
    let outcomes = h.c.sweep_matured(AGENT).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].goal_id, due);
    assert_eq!(outcomes[0].recipient, ALICE);
    assert_eq!(outcomes[0].amount, 800);

    assert_eq!(h.usdc_balance(&ALICE), before + 800);
    assert_eq!(h.c.savings_goal(due).unwrap().status, GoalStatus::Withdrawn);
    assert_eq!(h.c.savings_goal(open).unwrap().status, GoalStatus::Open);
    assert_eq!(h.c.goal_shares(open), Some(900));
}

#[test]
fn sweep_before_target_date_is_a_no_op() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, 365);
    h.c.deposit(ALICE, id, 800).unwrap();

    let outcomes = h.c.sweep_matured(AGENT).unwrap();
    assert!(outcomes.is_empty());
    assert_eq!(h.c.savings_goal(id).unwrap().status, GoalStatus::Open);
}

#[test]
fn sweep_includes_accrued_yield_in_the_payout() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, -1);
    h.c.deposit(ALICE, id, 1_000).unwrap();
    h.accrue_usdc(10_500); // +5%

    let outcomes = h.c.sweep_matured(AGENT).unwrap();
    assert_eq!(outcomes[0].amount, 1_050);
}

#[test]
fn sweep_rejects_every_caller_but_the_agent() {
    let mut h = Harness::new();
    for caller in [ALICE, BOB, DEPLOYER, CONTROLLER] {
        assert!(matches!(
            h.c.sweep_matured(caller),
            Err(VunaError::Unauthorized { .. })
        ));
    }
    // The agent itself succeeds, even with nothing to do.
    assert!(h.c.sweep_matured(AGENT).unwrap().is_empty());
}

#[test]
fn sweep_closes_empty_matured_goals_without_market_calls() {
    let mut h = Harness::new();
    let id = goal(&mut h.c, ALICE, -1); // matured, never funded

    let outcomes = h.c.sweep_matured(AGENT).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].amount, 0);
    assert_eq!(h.c.savings_goal(id).unwrap().status, GoalStatus::Withdrawn);
}

#[test]
fn interrupted_sweep_commits_finished_goals_and_retries_cleanly() {
    let mut h = Harness::new();
    let first = goal(&mut h.c, ALICE, -2);
    let second = goal(&mut h.c, BOB, -1);
    h.c.deposit(ALICE, first, 400).unwrap();
    h.c.deposit(BOB, second, 600).unwrap();

    // Leave custody enough for the first payout only.
    h.usdc
        .lock()
        .unwrap()
        .transfer_out(&POOL, &DEPLOYER, 600)
        .unwrap();

    let result = h.c.sweep_matured(AGENT);
    assert!(matches!(result, Err(VunaError::MarketWithdrawFailed { .. })));

    // The first goal settled before the batch aborted.
    assert_eq!(h.c.savings_goal(first).unwrap().status, GoalStatus::Withdrawn);
    assert_eq!(h.c.savings_goal(second).unwrap().status, GoalStatus::Matured);
    assert_eq!(h.c.goal_shares(second), Some(600));

    // Refund custody; the retry completes the remainder.
    h.usdc
        .lock()
        .unwrap()
        .transfer_out(&DEPLOYER, &POOL, 600)
        .unwrap();
    let outcomes = h.c.sweep_matured(AGENT).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].goal_id, second);
    assert_eq!(outcomes[0].amount, 600);
}

// ---------------------------------------------------------------------------
// Multi-asset isolation
// ---------------------------------------------------------------------------

#[test]
fn assets_are_isolated_between_vaults() {
    let mut h = Harness::new();
    let u = goal(&mut h.c, ALICE, 365);
    let d = h
        .c
        .set_goal(BOB, "House", "Down payment", 50_000, in_days(365), DAI)
        .unwrap();

    h.c.deposit(ALICE, u, 1_000).unwrap();
    h.c.deposit(BOB, d, 2_000).unwrap();

    assert_eq!(h.c.vault(USDC).unwrap().total_shares(), 1_000);
    assert_eq!(h.c.vault(DAI).unwrap().total_shares(), 2_000);
    assert_eq!(h.c.vault_value(USDC), 1_000);
    assert_eq!(h.c.vault_value(DAI), 2_000);
}

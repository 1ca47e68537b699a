//! # Savings Goals
//!
//! A [`SavingsGoal`] is a named savings target: what it is for, why, how
//! much, by when, and in which asset. Goals are created by `set_goal`,
//! mutated by deposits and withdrawals, swept at maturity by the automation
//! principal, and never deleted — the terminal `Withdrawn` state is retained
//! for audit.
//!
//! ## State Machine
//!
//! ```text
//!              current >= target            now >= target_date
//!    ┌──────┐ ─────────────────► ┌────────┐ ─────────────────► ┌─────────┐
//!    │ Open  │                    │ Funded  │                   │ Matured  │
//!    └──┬───┘ ─────────────────────────────────────────────────►└────┬────┘
//!       │          (maturity can also hit an unfunded goal)          │
//!       │                                                            │
//!       └──────────────► ┌───────────┐ ◄─────────────────────────────┘
//!        full redemption │ Withdrawn  │  sweep / full redemption
//!                        └───────────┘
//! ```
//!
//! `Funded` and `Matured` are not mutually exclusive — a goal can hit its
//! target and its date. The stored status applies the precedence
//! Withdrawn > Matured > Funded > Open; [`SavingsGoal::is_funded`] and
//! [`SavingsGoal::is_matured`] keep both flags observable regardless of
//! which one the enum shows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{Address, AssetId};

// ---------------------------------------------------------------------------
// GoalStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a savings goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    /// Accepting deposits, target not yet reached, date not yet elapsed.
    Open,
    /// `current_amount` has reached `target_amount`.
    Funded,
    /// `target_date` has elapsed. Eligible for the automation sweep.
    Matured,
    /// Fully redeemed. Terminal — retained for audit, rejects deposits.
    Withdrawn,
}

impl GoalStatus {
    /// Returns `true` for the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Withdrawn)
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalStatus::Open => write!(f, "Open"),
            GoalStatus::Funded => write!(f, "Funded"),
            GoalStatus::Matured => write!(f, "Matured"),
            GoalStatus::Withdrawn => write!(f, "Withdrawn"),
        }
    }
}

// ---------------------------------------------------------------------------
// SavingsGoal
// ---------------------------------------------------------------------------

/// A named savings target with a running principal balance.
///
/// `current_amount` tracks net principal only: it rises by each deposit and
/// falls by each withdrawal (saturating at zero, since accrued yield can
/// make a withdrawal exceed remaining principal). The goal's actual
/// redeemable value lives in the ledger's share bookkeeping, not here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavingsGoal {
    /// Sequential identifier, assigned at creation, immutable.
    pub id: u64,
    /// Principal that created the goal. Only this principal (or the
    /// automation agent, at maturity) may redeem it.
    pub owner: Address,
    /// What the saver is saving for. Opaque to the engine.
    pub what: String,
    /// Why. Equally opaque.
    pub why: String,
    /// Target amount in the deposit token's smallest unit. Positive.
    pub target_amount: u64,
    /// Point in time after which the goal is sweepable. Past dates are
    /// accepted — creation performs no date validation.
    pub target_date: DateTime<Utc>,
    /// Asset the goal is denominated in. Has a registered vault.
    pub deposit_token: AssetId,
    /// Net principal deposited so far.
    pub current_amount: u64,
    /// Current lifecycle status.
    pub status: GoalStatus,
    /// When the goal was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent state change.
    pub updated_at: DateTime<Utc>,
}

impl SavingsGoal {
    /// Creates a new goal in `Open` status with zero balance.
    ///
    /// A past `target_date` simply yields a goal that is already matured;
    /// `refresh_status` will reflect that on the first mutation.
    pub fn new(
        id: u64,
        owner: Address,
        what: &str,
        why: &str,
        target_amount: u64,
        target_date: DateTime<Utc>,
        deposit_token: AssetId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner,
            what: what.to_string(),
            why: why.to_string(),
            target_amount,
            target_date,
            deposit_token,
            current_amount: 0,
            status: GoalStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if net principal has reached the target.
    pub fn is_funded(&self) -> bool {
        self.current_amount >= self.target_amount
    }

    /// Returns `true` if the target date has elapsed at `now`.
    pub fn is_matured(&self, now: DateTime<Utc>) -> bool {
        now >= self.target_date
    }

    /// Re-derives the stored status from the current balance and clock.
    ///
    /// `Withdrawn` is sticky; otherwise Matured takes precedence over
    /// Funded, which takes precedence over Open.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if self.status == GoalStatus::Withdrawn {
            return;
        }
        self.status = if self.is_matured(now) {
            GoalStatus::Matured
        } else if self.is_funded() {
            GoalStatus::Funded
        } else {
            GoalStatus::Open
        };
    }

    /// Records a deposit of `amount` and re-derives the status.
    /// The caller has already checked for overflow.
    pub fn record_deposit(&mut self, amount: u64, now: DateTime<Utc>) {
        self.current_amount += amount;
        self.updated_at = now;
        self.refresh_status(now);
    }

    /// Records a withdrawal of `amount`, saturating at zero principal,
    /// and re-derives the status.
    pub fn record_withdrawal(&mut self, amount: u64, now: DateTime<Utc>) {
        self.current_amount = self.current_amount.saturating_sub(amount);
        self.updated_at = now;
        self.refresh_status(now);
    }

    /// Moves the goal to its terminal state.
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = GoalStatus::Withdrawn;
        self.updated_at = now;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

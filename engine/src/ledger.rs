//! # Goal Ledger
//!
//! Owns the collection of savings goals and each goal's share claim on its
//! asset's vault. Pure bookkeeping — the ledger performs no external calls
//! and hands out no aliases; all mutation flows through accessor methods on
//! the controller's behalf.
//!
//! Goals are stored in an arena keyed by a monotonically increasing `u64`.
//! Ids are never reused and entries are never removed: a fully redeemed
//! goal stays in the arena as `Withdrawn` for audit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::asset::AssetId;
use crate::goal::{GoalStatus, SavingsGoal};

// ---------------------------------------------------------------------------
// GoalAccount
// ---------------------------------------------------------------------------

/// A goal plus its share claim on the vault for its asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalAccount {
    /// The goal record.
    pub goal: SavingsGoal,
    /// Shares this goal holds in its asset's vault.
    ///
    /// Invariant: the sum of `shares` across all accounts for an asset
    /// never exceeds that vault's `total_shares`.
    pub shares: u64,
}

// ---------------------------------------------------------------------------
// GoalLedger
// ---------------------------------------------------------------------------

/// Arena of goal accounts with sequential id allocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalLedger {
    accounts: BTreeMap<u64, GoalAccount>,
    next_id: u64,
}

impl GoalLedger {
    /// Creates an empty ledger. The first goal gets id 0.
    pub fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Inserts a goal built by `make` under the next sequential id and
    /// returns that id.
    pub fn insert_with(&mut self, make: impl FnOnce(u64) -> SavingsGoal) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.accounts.insert(
            id,
            GoalAccount {
                goal: make(id),
                shares: 0,
            },
        );
        id
    }

    /// Returns the account for `goal_id`, if any.
    pub fn get(&self, goal_id: u64) -> Option<&GoalAccount> {
        self.accounts.get(&goal_id)
    }

    /// Returns the account for `goal_id` mutably, if any.
    pub fn get_mut(&mut self, goal_id: u64) -> Option<&mut GoalAccount> {
        self.accounts.get_mut(&goal_id)
    }

    /// Number of goals ever created (terminal ones included).
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no goal has ever been created.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterates all accounts in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &GoalAccount)> {
        self.accounts.iter()
    }

    /// Ids of non-terminal goals whose target date has elapsed at `now`.
    /// This is the automation sweep's work list.
    pub fn due_goal_ids(&self, now: chrono::DateTime<chrono::Utc>) -> Vec<u64> {
        self.accounts
            .iter()
            .filter(|(_, a)| a.goal.status != GoalStatus::Withdrawn && a.goal.is_matured(now))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Sum of all goals' shares in `asset`. Tested against the vault's
    /// `total_shares` by the custody invariants.
    pub fn total_shares_for(&self, asset: AssetId) -> u64 {
        self.accounts
            .values()
            .filter(|a| a.goal.deposit_token == asset)
            .map(|a| a.shares)
            .sum()
    }
}

impl Default for GoalLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Address;
    use chrono::{Duration, Utc};

    fn asset() -> AssetId {
        Address::from_bytes([0x01; 20])
    }

    fn other_asset() -> AssetId {
        Address::from_bytes([0x02; 20])
    }

    fn make_goal(id: u64, token: AssetId, days: i64) -> SavingsGoal {
        SavingsGoal::new(
            id,
            Address::from_bytes([0xA1; 20]),
            "Goal",
            "Reason",
            100,
            Utc::now() + Duration::days(days),
            token,
        )
    }

    #[test]
    fn ids_are_sequential_from_zero() {
        let mut ledger = GoalLedger::new();
        let a = ledger.insert_with(|id| make_goal(id, asset(), 30));
        let b = ledger.insert_with(|id| make_goal(id, asset(), 30));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(0).unwrap().goal.id, 0);
    }

    #[test]
    fn unknown_id_returns_none() {
        let ledger = GoalLedger::new();
        assert!(ledger.get(7).is_none());
    }

    #[test]
    fn due_goals_are_matured_non_terminal() {
        let mut ledger = GoalLedger::new();
        let past = ledger.insert_with(|id| make_goal(id, asset(), -1));
        let future = ledger.insert_with(|id| make_goal(id, asset(), 30));
        let closed = ledger.insert_with(|id| make_goal(id, asset(), -1));
        ledger.get_mut(closed).unwrap().goal.close(Utc::now());

        let due = ledger.due_goal_ids(Utc::now());
        assert_eq!(due, vec![past]);
        assert!(!due.contains(&future));
    }

    #[test]
    fn total_shares_sums_per_asset() {
        let mut ledger = GoalLedger::new();
        let a = ledger.insert_with(|id| make_goal(id, asset(), 30));
        let b = ledger.insert_with(|id| make_goal(id, asset(), 30));
        let c = ledger.insert_with(|id| make_goal(id, other_asset(), 30));

        ledger.get_mut(a).unwrap().shares = 100;
        ledger.get_mut(b).unwrap().shares = 250;
        ledger.get_mut(c).unwrap().shares = 999;

        assert_eq!(ledger.total_shares_for(asset()), 350);
        assert_eq!(ledger.total_shares_for(other_asset()), 999);
    }
}

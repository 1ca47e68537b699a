//! # Savings Controller
//!
//! The single entry point for every state-changing operation: goal
//! creation, deposits, withdrawals, and the automation sweep. The
//! controller owns the vaults, the goal ledger, the token registry, and the
//! lending market handle; callers interact with nothing else.
//!
//! ## Atomicity
//!
//! Every operation follows the same shape: validate everything and compute
//! every result with checked arithmetic first, then make the single
//! fallible external market call, then perform the token transfer (already
//! proven fundable), then commit bookkeeping. A failure at any point
//! returns before the first state mutation, so an error always means
//! "nothing happened".
//!
//! Exclusivity comes from `&mut self`: entry points take an exclusive
//! borrow, so no two operations can interleave and no entry point can be
//! re-entered while one is in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::asset::{Address, AssetId};
use crate::automation::AutomationGate;
use crate::error::VunaError;
use crate::events::{EventRecord, VunaEvent};
use crate::goal::{GoalStatus, SavingsGoal};
use crate::ledger::{GoalAccount, GoalLedger};
use crate::market::LendingMarket;
use crate::token::AssetToken;
use crate::vault::AssetVault;

// ---------------------------------------------------------------------------
// Configuration and receipts
// ---------------------------------------------------------------------------

/// Principals the controller is constructed with. All immutable for the
/// controller's lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// The controller's own address. Savers grant token allowances to this
    /// principal, and it acts as the spender on every deposit pull.
    pub address: Address,
    /// Deployer / administrative principal. Read surface only.
    pub owner: Address,
    /// The only principal allowed to invoke the maturity sweep.
    pub automation: Address,
    /// Custody address where pooled underlying rests between the deposit
    /// pull and the withdrawal payout.
    pub lending_pool: Address,
}

/// Result of a successful deposit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// Goal the deposit landed in.
    pub goal_id: u64,
    /// Underlying amount pulled and forwarded.
    pub amount: u64,
    /// Vault shares credited to the goal.
    pub shares_minted: u64,
    /// Goal status after the deposit.
    pub status: GoalStatus,
}

/// Result of a successful withdrawal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    /// Goal the value was redeemed from.
    pub goal_id: u64,
    /// Underlying amount paid to the goal owner.
    pub amount: u64,
    /// Vault shares burned to release it.
    pub shares_burned: u64,
    /// Goal status after the withdrawal.
    pub status: GoalStatus,
}

/// One goal fully redeemed by the automation sweep.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// The swept goal.
    pub goal_id: u64,
    /// Owner the payout went to.
    pub recipient: Address,
    /// Underlying amount paid out.
    pub amount: u64,
}

// ---------------------------------------------------------------------------
// SavingsController
// ---------------------------------------------------------------------------

/// Custody engine tying goals, vaults, tokens, and the lending market
/// together behind authorization checks.
pub struct SavingsController {
    address: Address,
    owner: Address,
    gate: AutomationGate,
    lending_pool: Address,
    vaults: BTreeMap<AssetId, AssetVault>,
    ledger: GoalLedger,
    tokens: BTreeMap<AssetId, Box<dyn AssetToken + Send + Sync>>,
    market: Box<dyn LendingMarket + Send + Sync>,
    events: Vec<EventRecord>,
}

impl SavingsController {
    /// Creates a controller supporting exactly the assets of `tokens`.
    /// One vault is registered per token; the supported set is fixed for
    /// the controller's lifetime.
    pub fn new(
        config: ControllerConfig,
        tokens: Vec<Box<dyn AssetToken + Send + Sync>>,
        market: Box<dyn LendingMarket + Send + Sync>,
    ) -> Self {
        let mut vaults = BTreeMap::new();
        let mut registry = BTreeMap::new();
        for token in tokens {
            let asset = token.asset();
            vaults.insert(asset, AssetVault::new(asset));
            registry.insert(asset, token);
        }

        Self {
            address: config.address,
            owner: config.owner,
            gate: AutomationGate::new(config.automation),
            lending_pool: config.lending_pool,
            vaults,
            ledger: GoalLedger::new(),
            tokens: registry,
            market,
            events: Vec::new(),
        }
    }

    // -- goal creation ------------------------------------------------------

    /// Creates a savings goal owned by `caller` and returns its id.
    ///
    /// A past `target_date` is accepted; the goal is simply sweepable as
    /// soon as it holds value.
    ///
    /// # Errors
    ///
    /// [`VunaError::InvalidAmount`] for a zero target;
    /// [`VunaError::UnsupportedAsset`] if no vault exists for
    /// `deposit_token`.
    pub fn set_goal(
        &mut self,
        caller: Address,
        what: &str,
        why: &str,
        target_amount: u64,
        target_date: DateTime<Utc>,
        deposit_token: AssetId,
    ) -> Result<u64, VunaError> {
        if target_amount == 0 {
            return Err(VunaError::InvalidAmount);
        }
        if !self.vaults.contains_key(&deposit_token) {
            return Err(VunaError::UnsupportedAsset {
                asset: deposit_token,
            });
        }

        let goal_id = self.ledger.insert_with(|id| {
            SavingsGoal::new(id, caller, what, why, target_amount, target_date, deposit_token)
        });

        self.record_event(VunaEvent::GoalCreated {
            goal_id,
            owner: caller,
            deposit_token,
            target_amount,
            target_date,
        });
        info!(goal_id, owner = %caller, %target_amount, "goal created");
        Ok(goal_id)
    }

    // -- deposit ------------------------------------------------------------

    /// Pulls `amount` of the goal's asset from `caller` and forwards it to
    /// the lending market, crediting the goal with freshly minted shares.
    /// Any principal may deposit into any open goal.
    ///
    /// # Errors
    ///
    /// [`VunaError::InvalidAmount`], [`VunaError::GoalNotFound`],
    /// [`VunaError::GoalClosed`], [`VunaError::InsufficientAllowance`],
    /// [`VunaError::InsufficientBalance`],
    /// [`VunaError::MarketDepositFailed`], or
    /// [`VunaError::ArithmeticOverflow`]. On error nothing has moved.
    pub fn deposit(
        &mut self,
        caller: Address,
        goal_id: u64,
        amount: u64,
    ) -> Result<DepositReceipt, VunaError> {
        if amount == 0 {
            return Err(VunaError::InvalidAmount);
        }

        let account = self
            .ledger
            .get(goal_id)
            .ok_or(VunaError::GoalNotFound { goal_id })?;
        if account.goal.status.is_terminal() {
            return Err(VunaError::GoalClosed { goal_id });
        }
        let asset = account.goal.deposit_token;

        // Validate everything before any effect. The share mint itself is
        // overflow-checked inside the vault's preview.
        account
            .goal
            .current_amount
            .checked_add(amount)
            .ok_or(VunaError::ArithmeticOverflow)?;

        let token = self
            .tokens
            .get(&asset)
            .ok_or(VunaError::UnsupportedAsset { asset })?;
        let approved = token.allowance(&caller, &self.address);
        if approved < amount {
            return Err(VunaError::InsufficientAllowance {
                approved,
                required: amount,
            });
        }
        let available = token.balance_of(&caller);
        if available < amount {
            return Err(VunaError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        // Crediting custody must also fit, or the pull below could fail
        // after the market call committed.
        token
            .balance_of(&self.lending_pool)
            .checked_add(amount)
            .ok_or(VunaError::ArithmeticOverflow)?;

        // The one fallible external call. Mints shares on success.
        let vault = self
            .vaults
            .get_mut(&asset)
            .ok_or(VunaError::UnsupportedAsset { asset })?;
        let shares_minted = vault.deposit(self.market.as_mut(), amount)?;

        // Allowance, balance, and custody headroom were proven above; this
        // cannot fail.
        let spender = self.address;
        let custody = self.lending_pool;
        let token = self
            .tokens
            .get_mut(&asset)
            .ok_or(VunaError::UnsupportedAsset { asset })?;
        token.transfer_in(&spender, &caller, &custody, amount)?;

        // Commit.
        let now = Utc::now();
        let account = self
            .ledger
            .get_mut(goal_id)
            .ok_or(VunaError::GoalNotFound { goal_id })?;
        account.shares += shares_minted;
        account.goal.record_deposit(amount, now);
        let status = account.goal.status;

        self.record_event(VunaEvent::DepositReceived {
            goal_id,
            depositor: caller,
            amount,
            shares_minted,
        });
        info!(goal_id, %amount, shares_minted, %status, "deposit committed");
        Ok(DepositReceipt {
            goal_id,
            amount,
            shares_minted,
            status,
        })
    }

    // -- withdraw -----------------------------------------------------------

    /// Redeems `amount` of underlying from `goal_id` and pays it to the
    /// goal's owner. Only the owner may withdraw; accrued yield is
    /// redeemable, so `amount` may exceed deposited principal. Redeeming
    /// the goal's full value closes it.
    ///
    /// # Errors
    ///
    /// [`VunaError::Unauthorized`] for any caller but the owner;
    /// [`VunaError::InsufficientFunds`] if `amount` exceeds the goal's
    /// live redeemable value; [`VunaError::MarketWithdrawFailed`] if the
    /// market or custody balance cannot release the funds;
    /// [`VunaError::ArithmeticOverflow`] if crediting the owner would
    /// overflow their balance. On error nothing has moved.
    pub fn withdraw(
        &mut self,
        caller: Address,
        goal_id: u64,
        amount: u64,
    ) -> Result<WithdrawReceipt, VunaError> {
        if amount == 0 {
            return Err(VunaError::InvalidAmount);
        }

        let account = self
            .ledger
            .get(goal_id)
            .ok_or(VunaError::GoalNotFound { goal_id })?;
        if account.goal.status.is_terminal() {
            return Err(VunaError::GoalClosed { goal_id });
        }
        if caller != account.goal.owner {
            return Err(VunaError::Unauthorized { caller });
        }
        let owner = account.goal.owner;
        let asset = account.goal.deposit_token;
        let shares = account.shares;

        let vault = self
            .vaults
            .get(&asset)
            .ok_or(VunaError::UnsupportedAsset { asset })?;
        let redeemable = vault.value_of_shares(shares, self.market.position_value(asset));
        if amount > redeemable {
            return Err(VunaError::InsufficientFunds {
                goal_id,
                redeemable,
                requested: amount,
            });
        }

        // Custody must be able to pay, and the owner must be able to
        // receive, before the market position is touched.
        let token = self
            .tokens
            .get(&asset)
            .ok_or(VunaError::UnsupportedAsset { asset })?;
        let custody = token.balance_of(&self.lending_pool);
        if custody < amount {
            return Err(VunaError::MarketWithdrawFailed {
                reason: format!("custody holds {custody}, payout needs {amount}"),
            });
        }
        token
            .balance_of(&owner)
            .checked_add(amount)
            .ok_or(VunaError::ArithmeticOverflow)?;

        // The one fallible external call. Burns shares on success.
        let vault = self
            .vaults
            .get_mut(&asset)
            .ok_or(VunaError::UnsupportedAsset { asset })?;
        let shares_burned = vault.withdraw_exact(self.market.as_mut(), amount, shares)?;

        // Custody balance and owner headroom were proven above; this
        // cannot fail.
        let custody = self.lending_pool;
        let token = self
            .tokens
            .get_mut(&asset)
            .ok_or(VunaError::UnsupportedAsset { asset })?;
        token.transfer_out(&custody, &owner, amount)?;

        // Commit.
        let now = Utc::now();
        let account = self
            .ledger
            .get_mut(goal_id)
            .ok_or(VunaError::GoalNotFound { goal_id })?;
        account.shares -= shares_burned;
        account.goal.record_withdrawal(amount, now);
        if account.shares == 0 {
            account.goal.close(now);
        }
        let status = account.goal.status;

        self.record_event(VunaEvent::WithdrawalPaid {
            goal_id,
            recipient: owner,
            amount,
            shares_burned,
        });
        info!(goal_id, %amount, shares_burned, %status, "withdrawal committed");
        Ok(WithdrawReceipt {
            goal_id,
            amount,
            shares_burned,
            status,
        })
    }

    // -- sweep --------------------------------------------------------------

    /// Redeems every matured goal in full, paying each goal's value to its
    /// owner and closing it. Only the automation principal may call this.
    ///
    /// Each goal settles atomically; the batch stops at the first market
    /// failure, leaving already-swept goals committed. A retry picks up
    /// the remainder — closed goals no longer appear in the work list, so
    /// the sweep is idempotent. An empty work list is a successful no-op.
    ///
    /// # Errors
    ///
    /// [`VunaError::Unauthorized`] for any caller but the automation
    /// principal; [`VunaError::MarketWithdrawFailed`] if a redemption
    /// fails mid-batch.
    pub fn sweep_matured(&mut self, caller: Address) -> Result<Vec<SweepOutcome>, VunaError> {
        self.gate.ensure(caller)?;

        let now = Utc::now();
        let due = self.ledger.due_goal_ids(now);
        let mut outcomes = Vec::with_capacity(due.len());

        for goal_id in due {
            let outcome = self.sweep_one(goal_id, now)?;
            info!(
                goal_id = outcome.goal_id,
                recipient = %outcome.recipient,
                amount = outcome.amount,
                "goal swept"
            );
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Settles one matured goal: redeem its full live value, pay the
    /// owner, close the goal. A goal holding no shares is closed with a
    /// zero payout and no market call.
    fn sweep_one(&mut self, goal_id: u64, now: DateTime<Utc>) -> Result<SweepOutcome, VunaError> {
        let account = self
            .ledger
            .get(goal_id)
            .ok_or(VunaError::GoalNotFound { goal_id })?;
        let owner = account.goal.owner;
        let asset = account.goal.deposit_token;
        let shares = account.shares;

        let amount = if shares == 0 {
            0
        } else {
            let vault = self
                .vaults
                .get(&asset)
                .ok_or(VunaError::UnsupportedAsset { asset })?;
            vault.value_of_shares(shares, self.market.position_value(asset))
        };

        if amount > 0 {
            let token = self
                .tokens
                .get(&asset)
                .ok_or(VunaError::UnsupportedAsset { asset })?;
            let custody = token.balance_of(&self.lending_pool);
            if custody < amount {
                return Err(VunaError::MarketWithdrawFailed {
                    reason: format!("custody holds {custody}, payout needs {amount}"),
                });
            }
            token
                .balance_of(&owner)
                .checked_add(amount)
                .ok_or(VunaError::ArithmeticOverflow)?;

            let vault = self
                .vaults
                .get_mut(&asset)
                .ok_or(VunaError::UnsupportedAsset { asset })?;
            vault.withdraw_exact(self.market.as_mut(), amount, shares)?;

            let custody = self.lending_pool;
            let token = self
                .tokens
                .get_mut(&asset)
                .ok_or(VunaError::UnsupportedAsset { asset })?;
            token.transfer_out(&custody, &owner, amount)?;
        }

        let account = self
            .ledger
            .get_mut(goal_id)
            .ok_or(VunaError::GoalNotFound { goal_id })?;
        account.shares = 0;
        account.goal.record_withdrawal(amount, now);
        account.goal.close(now);

        self.record_event(VunaEvent::GoalSwept {
            goal_id,
            recipient: owner,
            amount,
        });
        Ok(SweepOutcome {
            goal_id,
            recipient: owner,
            amount,
        })
    }

    // -- read surface -------------------------------------------------------

    /// The goal record for `goal_id`, if it exists.
    pub fn savings_goal(&self, goal_id: u64) -> Option<&SavingsGoal> {
        self.ledger.get(goal_id).map(|a| &a.goal)
    }

    /// Shares `goal_id` holds in its asset's vault.
    pub fn goal_shares(&self, goal_id: u64) -> Option<u64> {
        self.ledger.get(goal_id).map(|a| a.shares)
    }

    /// Live redeemable value of `goal_id` at the current market rate.
    pub fn goal_value(&self, goal_id: u64) -> Option<u64> {
        let account = self.ledger.get(goal_id)?;
        let vault = self.vaults.get(&account.goal.deposit_token)?;
        Some(vault.value_of_shares(
            account.shares,
            self.market.position_value(account.goal.deposit_token),
        ))
    }

    /// All goal accounts in id order.
    pub fn goals(&self) -> impl Iterator<Item = (&u64, &GoalAccount)> {
        self.ledger.iter()
    }

    /// Number of goals ever created.
    pub fn goal_count(&self) -> usize {
        self.ledger.len()
    }

    /// The vault for `asset`, if supported.
    pub fn vault(&self, asset: AssetId) -> Option<&AssetVault> {
        self.vaults.get(&asset)
    }

    /// Live total value of the vault position in `asset`.
    pub fn vault_value(&self, asset: AssetId) -> u64 {
        self.market.position_value(asset)
    }

    /// The supported asset set, in stable order.
    pub fn assets(&self) -> Vec<AssetId> {
        self.vaults.keys().copied().collect()
    }

    /// The token registered for `asset`.
    pub fn token(&self, asset: AssetId) -> Option<&(dyn AssetToken + Send + Sync)> {
        self.tokens.get(&asset).map(|t| t.as_ref())
    }

    /// Mutable token access, for faucet and approval flows outside the
    /// custody path.
    ///
    /// The `'static` object bound matches the boxed trait object; `&mut`
    /// is invariant, so eliding it would shrink the lifetime and fail to
    /// borrow-check.
    pub fn token_mut(
        &mut self,
        asset: AssetId,
    ) -> Option<&mut (dyn AssetToken + Send + Sync + 'static)> {
        self.tokens.get_mut(&asset).map(|t| t.as_mut())
    }

    /// The controller's own address (the allowance spender).
    pub fn address(&self) -> Address {
        self.address
    }

    /// The administrative principal.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The automation principal.
    pub fn automation(&self) -> Address {
        self.gate.principal()
    }

    /// The custody address holding pooled underlying.
    pub fn lending_pool(&self) -> Address {
        self.lending_pool
    }

    /// The full audit log, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    fn record_event(&mut self, event: VunaEvent) {
        self.events.push(EventRecord::now(event));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

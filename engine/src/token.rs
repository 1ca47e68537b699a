//! # Asset Token Capability
//!
//! The engine never assumes more of a deposit asset than move-value and
//! balance-query semantics: pull funds from a saver who has granted an
//! allowance, push funds to a recipient, and read balances. [`AssetToken`]
//! is that capability as a trait, so real token integrations and the
//! in-memory implementation used by tests and local deployments satisfy
//! the same seam.
//!
//! All amounts are `u64` in the token's smallest unit. The `decimals`
//! field is for display only — the engine never divides by it.

use std::collections::HashMap;
use thiserror::Error;

use crate::asset::{Address, AssetId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The holder does not have the requested amount.
    #[error("insufficient token balance: holder {holder} has {available}, needs {requested}")]
    InsufficientBalance {
        /// Account being debited.
        holder: Address,
        /// Current balance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// The spender's allowance from the holder does not cover the transfer.
    #[error("insufficient allowance: spender {spender} approved for {approved}, needs {requested}")]
    InsufficientAllowance {
        /// Account whose funds would move.
        holder: Address,
        /// Account attempting the pull.
        spender: Address,
        /// Currently approved amount.
        approved: u64,
        /// Amount requested.
        requested: u64,
    },

    /// A credit would overflow `u64`.
    #[error("token balance overflow: holder {holder}, current {current}, credit {credit}")]
    Overflow {
        /// Account being credited.
        holder: Address,
        /// Balance before the failed credit.
        current: u64,
        /// Amount that caused the overflow.
        credit: u64,
    },
}

// ---------------------------------------------------------------------------
// AssetToken trait
// ---------------------------------------------------------------------------

/// The transfer/approve/balance capability the engine requires of a
/// deposit asset.
///
/// `transfer_in` is the allowance-gated pull (the saver approves the
/// controller, the controller pulls into custody); `transfer_out` is the
/// unconditional push used to pay withdrawals out of custody. The engine
/// calls nothing else.
pub trait AssetToken {
    /// The asset this token instance represents.
    fn asset(&self) -> AssetId;

    /// Current balance of `holder`.
    fn balance_of(&self, holder: &Address) -> u64;

    /// Amount `spender` is currently approved to pull from `holder`.
    fn allowance(&self, holder: &Address, spender: &Address) -> u64;

    /// Sets `spender`'s allowance from `holder` to exactly `amount`.
    fn approve(&mut self, holder: &Address, spender: &Address, amount: u64);

    /// Pulls `amount` from `from` to `to` on behalf of `spender`,
    /// consuming allowance.
    ///
    /// # Errors
    ///
    /// [`TokenError::InsufficientAllowance`] if `spender`'s allowance from
    /// `from` is below `amount`; [`TokenError::InsufficientBalance`] if
    /// `from` cannot cover it; [`TokenError::Overflow`] if crediting `to`
    /// would overflow.
    fn transfer_in(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError>;

    /// Pushes `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// [`TokenError::InsufficientBalance`] if `from` cannot cover the
    /// transfer; [`TokenError::Overflow`] if crediting `to` would overflow.
    fn transfer_out(&mut self, from: &Address, to: &Address, amount: u64)
        -> Result<(), TokenError>;
}

// A token behind a shared handle satisfies the capability too. The
// controller owns one clone of the handle while fixtures and the devnet
// faucet keep another, so supply can be minted after construction.
impl<T: AssetToken> AssetToken for std::sync::Arc<std::sync::Mutex<T>> {
    fn asset(&self) -> AssetId {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .asset()
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .balance_of(holder)
    }

    fn allowance(&self, holder: &Address, spender: &Address) -> u64 {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .allowance(holder, spender)
    }

    fn approve(&mut self, holder: &Address, spender: &Address, amount: u64) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .approve(holder, spender, amount)
    }

    fn transfer_in(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .transfer_in(spender, from, to, amount)
    }

    fn transfer_out(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .transfer_out(from, to, amount)
    }
}

// ---------------------------------------------------------------------------
// InMemoryToken
// ---------------------------------------------------------------------------

/// In-memory [`AssetToken`] implementation.
///
/// Backs the engine's integration tests and the node's devnet mode. Balances
/// live in a plain map; `mint` conjures supply the way a test fixture or a
/// faucet would.
#[derive(Clone, Debug)]
pub struct InMemoryToken {
    asset: AssetId,
    /// Display name, e.g. "Mock USDC".
    pub name: String,
    /// Ticker, e.g. "mUSDC".
    pub symbol: String,
    /// Display decimal places. Never used in arithmetic.
    pub decimals: u8,
    balances: HashMap<Address, u64>,
    /// Allowances keyed by (holder, spender).
    allowances: HashMap<(Address, Address), u64>,
}

impl InMemoryToken {
    /// Creates a token with no balances.
    pub fn new(asset: AssetId, name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            asset,
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Credits freshly minted units to `holder`.
    ///
    /// # Errors
    ///
    /// [`TokenError::Overflow`] if the credit would exceed `u64::MAX`.
    pub fn mint(&mut self, holder: &Address, amount: u64) -> Result<u64, TokenError> {
        let entry = self.balances.entry(*holder).or_insert(0);
        let new_balance = entry.checked_add(amount).ok_or(TokenError::Overflow {
            holder: *holder,
            current: *entry,
            credit: amount,
        })?;
        *entry = new_balance;
        Ok(new_balance)
    }

    fn debit(&mut self, holder: &Address, amount: u64) -> Result<(), TokenError> {
        let balance = self.balances.entry(*holder).or_insert(0);
        if *balance < amount {
            return Err(TokenError::InsufficientBalance {
                holder: *holder,
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, holder: &Address, amount: u64) -> Result<(), TokenError> {
        let balance = self.balances.entry(*holder).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow {
            holder: *holder,
            current: *balance,
            credit: amount,
        })?;
        Ok(())
    }
}

impl AssetToken for InMemoryToken {
    fn asset(&self) -> AssetId {
        self.asset
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn allowance(&self, holder: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(&(*holder, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, holder: &Address, spender: &Address, amount: u64) {
        self.allowances.insert((*holder, *spender), amount);
    }

    fn transfer_in(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        let approved = self.allowance(from, spender);
        if approved < amount {
            return Err(TokenError::InsufficientAllowance {
                holder: *from,
                spender: *spender,
                approved,
                requested: amount,
            });
        }

        self.debit(from, amount)?;
        self.credit(to, amount)?;
        self.allowances.insert((*from, *spender), approved - amount);
        Ok(())
    }

    fn transfer_out(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

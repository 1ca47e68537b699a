//! # Failure Taxonomy
//!
//! [`VunaError`] is the complete set of user-visible failure reasons. Every
//! entry point either commits all of its effects and returns a receipt, or
//! commits nothing and returns exactly one of these — there is no local
//! recovery, no silent retry, and no failure that leaves altered state.
//!
//! Collaborator-level errors ([`TokenError`], [`MarketError`] via the
//! vault) are converted at the controller boundary so callers see one
//! taxonomy regardless of which layer refused.

use thiserror::Error;

use crate::asset::{Address, AssetId};
use crate::token::TokenError;
use crate::vault::VaultError;

/// Every way a controller entry point can fail.
#[derive(Debug, Error)]
pub enum VunaError {
    /// No vault is registered for the requested deposit asset.
    #[error("unsupported asset: no vault registered for {asset}")]
    UnsupportedAsset {
        /// The unregistered asset.
        asset: AssetId,
    },

    /// A zero target or transfer amount.
    #[error("invalid amount: must be positive")]
    InvalidAmount,

    /// The goal id is not in the ledger.
    #[error("goal {goal_id} not found")]
    GoalNotFound {
        /// The unknown id.
        goal_id: u64,
    },

    /// The goal has been fully redeemed and no longer accepts deposits.
    #[error("goal {goal_id} is closed")]
    GoalClosed {
        /// The terminal goal.
        goal_id: u64,
    },

    /// The caller is neither the goal owner nor the automation principal
    /// for the operation it attempted.
    #[error("unauthorized caller {caller}")]
    Unauthorized {
        /// The rejected principal.
        caller: Address,
    },

    /// The caller has not approved the engine for the deposit amount.
    #[error("insufficient allowance: approved {approved}, required {required}")]
    InsufficientAllowance {
        /// Currently approved amount.
        approved: u64,
        /// Amount the deposit needs.
        required: u64,
    },

    /// The caller's token balance cannot fund the deposit.
    #[error("insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        /// The caller's balance.
        available: u64,
        /// Amount the deposit needs.
        required: u64,
    },

    /// The withdrawal exceeds the goal's current redeemable value.
    #[error("insufficient funds: goal {goal_id} holds {redeemable}, requested {requested}")]
    InsufficientFunds {
        /// The goal being redeemed.
        goal_id: u64,
        /// Its live redeemable value.
        redeemable: u64,
        /// Amount requested.
        requested: u64,
    },

    /// The lending market rejected the deposit. Surfaced, never masked.
    #[error("market deposit failed: {reason}")]
    MarketDepositFailed {
        /// Collaborator-supplied reason.
        reason: String,
    },

    /// The lending market (or its custody balance) could not honor the
    /// withdrawal. Surfaced, never masked or retried.
    #[error("market withdrawal failed: {reason}")]
    MarketWithdrawFailed {
        /// Collaborator-supplied reason.
        reason: String,
    },

    /// Checked arithmetic failed. If you hit this outside a test, an
    /// amount crossed 18.4 quintillion smallest units.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

impl VunaError {
    /// Machine-readable code for API payloads and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            VunaError::UnsupportedAsset { .. } => "unsupported_asset",
            VunaError::InvalidAmount => "invalid_amount",
            VunaError::GoalNotFound { .. } => "goal_not_found",
            VunaError::GoalClosed { .. } => "goal_closed",
            VunaError::Unauthorized { .. } => "unauthorized",
            VunaError::InsufficientAllowance { .. } => "insufficient_allowance",
            VunaError::InsufficientBalance { .. } => "insufficient_balance",
            VunaError::InsufficientFunds { .. } => "insufficient_funds",
            VunaError::MarketDepositFailed { .. } => "market_deposit_failed",
            VunaError::MarketWithdrawFailed { .. } => "market_withdraw_failed",
            VunaError::ArithmeticOverflow => "arithmetic_overflow",
        }
    }
}

impl From<TokenError> for VunaError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InsufficientBalance {
                available,
                requested,
                ..
            } => VunaError::InsufficientBalance {
                available,
                required: requested,
            },
            TokenError::InsufficientAllowance {
                approved,
                requested,
                ..
            } => VunaError::InsufficientAllowance {
                approved,
                required: requested,
            },
            TokenError::Overflow { .. } => VunaError::ArithmeticOverflow,
        }
    }
}

impl From<VaultError> for VunaError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::MarketDeposit(inner) => VunaError::MarketDepositFailed {
                reason: inner.to_string(),
            },
            VaultError::MarketWithdraw(inner) => VunaError::MarketWithdrawFailed {
                reason: inner.to_string(),
            },
            // A worthless position makes share conversion undefined; the
            // division that cannot be performed surfaces as overflow.
            VaultError::ShareOverflow { .. } | VaultError::ZeroValue { .. } => {
                VunaError::ArithmeticOverflow
            }
        }
    }
}

//! # Lending Market Capability
//!
//! The yield source is an opaque collaborator: the engine deposits
//! underlying into it, withdraws underlying out of it, and reads the live
//! value of its position. How the market computes yield is its business —
//! the engine only observes the position value drifting upward over time.
//!
//! [`InMemoryLendingMarket`] is the reference implementation used by tests
//! and devnet deployments. It models an Aave-style receipt token: each
//! deposit buys receipt units at the current exchange rate, and raising the
//! rate afterwards simulates accrued interest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::asset::AssetId;

/// Basis-point denominator. An exchange rate of 10_000 bps means one
/// receipt unit redeems for exactly one underlying unit.
pub const RATE_SCALE_BPS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the lending market.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The market refused the deposit outright (paused, cap reached, asset
    /// delisted — the engine does not distinguish).
    #[error("market rejected deposit of {amount} ({asset}): {reason}")]
    DepositRejected {
        /// Asset being deposited.
        asset: AssetId,
        /// Amount that was refused.
        amount: u64,
        /// Market-supplied reason, opaque to the engine.
        reason: String,
    },

    /// The market cannot release the requested underlying value.
    #[error("market cannot honor withdrawal: requested {requested}, position holds {available} ({asset})")]
    InsufficientLiquidity {
        /// Asset being withdrawn.
        asset: AssetId,
        /// Underlying value requested.
        requested: u64,
        /// Current redeemable value of the position.
        available: u64,
    },

    /// Position arithmetic overflowed.
    #[error("market position overflow for {asset}")]
    PositionOverflow {
        /// Asset whose position overflowed.
        asset: AssetId,
    },
}

// ---------------------------------------------------------------------------
// LendingMarket trait
// ---------------------------------------------------------------------------

/// The deposit/withdraw/valuation capability of the external yield source.
///
/// One position per asset, owned by the engine. `position_value` must be the
/// live redeemable value at the market's current exchange rate — callers
/// never cache it, which is what distributes yield pro-rata across all goals
/// sharing an asset.
pub trait LendingMarket {
    /// Forwards `amount` of `asset` into the market's position.
    fn deposit(&mut self, asset: AssetId, amount: u64) -> Result<(), MarketError>;

    /// Releases exactly `amount` of underlying from the position.
    ///
    /// # Errors
    ///
    /// [`MarketError::InsufficientLiquidity`] if the position's live value
    /// cannot cover `amount`.
    fn withdraw(&mut self, asset: AssetId, amount: u64) -> Result<(), MarketError>;

    /// Live redeemable value of the engine's position in `asset`.
    fn position_value(&self, asset: AssetId) -> u64;
}

// A market behind a shared handle satisfies the capability too, so test
// fixtures and the devnet can move the exchange rate while the controller
// holds its own clone of the handle.
impl<M: LendingMarket> LendingMarket for std::sync::Arc<std::sync::Mutex<M>> {
    fn deposit(&mut self, asset: AssetId, amount: u64) -> Result<(), MarketError> {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .deposit(asset, amount)
    }

    fn withdraw(&mut self, asset: AssetId, amount: u64) -> Result<(), MarketError> {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .withdraw(asset, amount)
    }

    fn position_value(&self, asset: AssetId) -> u64 {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .position_value(asset)
    }
}

// ---------------------------------------------------------------------------
// InMemoryLendingMarket
// ---------------------------------------------------------------------------

/// Per-asset position state inside [`InMemoryLendingMarket`].
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Position {
    /// Receipt units held. Value = units * rate / RATE_SCALE_BPS.
    units: u64,
    /// Exchange rate in basis points (10_000 = par).
    rate_bps: u64,
}

/// In-memory [`LendingMarket`] with a settable per-asset exchange rate.
///
/// Deposits buy receipt units at the current rate; `set_exchange_rate`
/// afterwards moves the position's value, which is how tests and devnet
/// simulate yield accrual (or, below par, a loss). A `paused` switch makes
/// deposits fail so rejection paths can be exercised.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InMemoryLendingMarket {
    positions: BTreeMap<AssetId, Position>,
    paused: bool,
}

impl InMemoryLendingMarket {
    /// Creates an empty market with every asset at par.
    pub fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
            paused: false,
        }
    }

    /// Sets the exchange rate for `asset` in basis points.
    /// 10_500 corresponds to 5% accrued yield on the position.
    pub fn set_exchange_rate(&mut self, asset: AssetId, rate_bps: u64) {
        self.positions
            .entry(asset)
            .or_insert(Position {
                units: 0,
                rate_bps: RATE_SCALE_BPS,
            })
            .rate_bps = rate_bps;
    }

    /// Current exchange rate for `asset` in basis points.
    pub fn exchange_rate(&self, asset: AssetId) -> u64 {
        self.positions
            .get(&asset)
            .map(|p| p.rate_bps)
            .unwrap_or(RATE_SCALE_BPS)
    }

    /// Pauses or unpauses deposits. Withdrawals are unaffected.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn value_of(units: u64, rate_bps: u64) -> u64 {
        // u128 intermediate: units * rate can exceed u64.
        ((units as u128 * rate_bps as u128) / RATE_SCALE_BPS as u128) as u64
    }
}

impl Default for InMemoryLendingMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl LendingMarket for InMemoryLendingMarket {
    fn deposit(&mut self, asset: AssetId, amount: u64) -> Result<(), MarketError> {
        if self.paused {
            return Err(MarketError::DepositRejected {
                asset,
                amount,
                reason: "market is paused".to_string(),
            });
        }

        let position = self.positions.entry(asset).or_insert(Position {
            units: 0,
            rate_bps: RATE_SCALE_BPS,
        });

        // Units bought at the current rate, floored. At par this is exactly
        // `amount`.
        let bought =
            ((amount as u128 * RATE_SCALE_BPS as u128) / position.rate_bps as u128) as u64;
        position.units = position
            .units
            .checked_add(bought)
            .ok_or(MarketError::PositionOverflow { asset })?;
        Ok(())
    }

    fn withdraw(&mut self, asset: AssetId, amount: u64) -> Result<(), MarketError> {
        let position = match self.positions.get_mut(&asset) {
            Some(p) => p,
            None => {
                return Err(MarketError::InsufficientLiquidity {
                    asset,
                    requested: amount,
                    available: 0,
                })
            }
        };

        let available = Self::value_of(position.units, position.rate_bps);
        if amount > available {
            return Err(MarketError::InsufficientLiquidity {
                asset,
                requested: amount,
                available,
            });
        }

        // Burn units ceiling-rounded so the position never retains more
        // value than its remaining units represent.
        let burned = (amount as u128 * RATE_SCALE_BPS as u128)
            .div_ceil(position.rate_bps as u128) as u64;
        position.units = position.units.saturating_sub(burned);
        Ok(())
    }

    fn position_value(&self, asset: AssetId) -> u64 {
        self.positions
            .get(&asset)
            .map(|p| Self::value_of(p.units, p.rate_bps))
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # Node Configuration
//!
//! TOML-backed configuration for the custody node: which network it
//! serves, the controller principals, the supported deposit assets, and
//! the devnet seed balances. `init` writes the default devnet file; `run`
//! loads it back and builds the controller from it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use vuna_engine::asset::{Address, AssetId};
use vuna_engine::controller::{ControllerConfig, SavingsController};
use vuna_engine::market::{InMemoryLendingMarket, RATE_SCALE_BPS};
use vuna_engine::token::{AssetToken, InMemoryToken};

/// Full node configuration, as persisted in `config.toml`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network identifier ("devnet", "testnet").
    pub network: String,
    /// Controller principals.
    pub controller: PrincipalsConfig,
    /// Lending market parameters.
    pub market: MarketConfig,
    /// Supported deposit assets, one vault each.
    pub assets: Vec<AssetConfig>,
}

/// The four principals the controller is constructed with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrincipalsConfig {
    /// The controller's own address; savers approve this as spender.
    pub address: Address,
    /// Administrative principal.
    pub owner: Address,
    /// Automation principal allowed to sweep.
    pub automation: Address,
    /// Custody address where pooled underlying rests.
    pub lending_pool: Address,
}

/// Lending market parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Initial exchange rate in basis points. 10_000 is par.
    #[serde(default = "default_rate_bps")]
    pub initial_rate_bps: u64,
}

fn default_rate_bps() -> u64 {
    RATE_SCALE_BPS
}

/// One supported deposit asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Token contract address; doubles as the asset id.
    pub address: AssetId,
    /// Display name, e.g. "Mock USDC".
    pub name: String,
    /// Ticker, e.g. "mUSDC".
    pub symbol: String,
    /// Display decimal places.
    pub decimals: u8,
    /// Devnet balances minted at startup. Each seeded holder also gets a
    /// matching controller allowance so demo deposits work immediately.
    #[serde(default)]
    pub seed_balances: Vec<SeedBalance>,
}

/// A devnet balance minted at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedBalance {
    /// Account to credit.
    pub holder: Address,
    /// Amount in the token's smallest unit.
    pub amount: u64,
}

impl NodeConfig {
    /// The built-in devnet configuration: two mock stablecoins and two
    /// pre-funded savers.
    pub fn devnet() -> Self {
        let saver_one = Address::from_bytes([0xA1; 20]);
        let saver_two = Address::from_bytes([0xA2; 20]);
        let seed = |holder| SeedBalance {
            holder,
            amount: 1_000_000_000,
        };

        Self {
            network: "devnet".to_string(),
            controller: PrincipalsConfig {
                address: Address::from_bytes([0xC0; 20]),
                owner: Address::from_bytes([0xD0; 20]),
                automation: Address::from_bytes([0x0A; 20]),
                lending_pool: Address::from_bytes([0xF0; 20]),
            },
            market: MarketConfig {
                initial_rate_bps: RATE_SCALE_BPS,
            },
            assets: vec![
                AssetConfig {
                    address: Address::from_bytes([0x01; 20]),
                    name: "Mock USDC".to_string(),
                    symbol: "mUSDC".to_string(),
                    decimals: 6,
                    seed_balances: vec![seed(saver_one), seed(saver_two)],
                },
                AssetConfig {
                    address: Address::from_bytes([0x02; 20]),
                    name: "Mock DAI".to_string(),
                    symbol: "mDAI".to_string(),
                    decimals: 18,
                    seed_balances: vec![seed(saver_one), seed(saver_two)],
                },
            ],
        }
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: NodeConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Builds a controller from this configuration: one in-memory token
    /// per asset with its seed balances minted and approved, and the
    /// market at the configured initial rate.
    pub fn build_controller(&self) -> Result<SavingsController> {
        let mut tokens: Vec<Box<dyn vuna_engine::token::AssetToken + Send + Sync>> = Vec::new();
        for asset in &self.assets {
            let mut token =
                InMemoryToken::new(asset.address, &asset.name, &asset.symbol, asset.decimals);
            for seed in &asset.seed_balances {
                token.mint(&seed.holder, seed.amount).with_context(|| {
                    format!("failed to seed {} for {}", asset.symbol, seed.holder)
                })?;
                token.approve(&seed.holder, &self.controller.address, seed.amount);
            }
            tokens.push(Box::new(token));
        }

        let mut market = InMemoryLendingMarket::new();
        for asset in &self.assets {
            market.set_exchange_rate(asset.address, self.market.initial_rate_bps);
        }

        Ok(SavingsController::new(
            ControllerConfig {
                address: self.controller.address,
                owner: self.controller.owner,
                automation: self.controller.automation,
                lending_pool: self.controller.lending_pool,
            },
            tokens,
            Box::new(market),
        ))
    }
}

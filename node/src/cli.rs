//! # CLI Interface
//!
//! Defines the command-line argument structure for `vuna-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vuna savings custody node.
///
/// Runs the goal-based savings engine behind a REST API: savers create
/// goals, deposits forward to the lending market, and the built-in
/// automation loop sweeps matured goals back to their owners. Exposes
/// Prometheus metrics on a dedicated port.
#[derive(Parser, Debug)]
#[command(
    name = "vuna-node",
    about = "Vuna savings custody node",
    version,
    propagate_version = true
)]
pub struct VunaNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Vuna node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the custody node.
    Run(RunArgs),
    /// Initialize a new node — creates the data directory and writes a
    /// default devnet configuration.
    Init(InitArgs),
    /// Query the status of a running node via its API endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, the node looks for `config.toml` in the data directory
    /// and falls back to the built-in devnet configuration.
    #[arg(long, short = 'c', env = "VUNA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the node data directory.
    #[arg(long, short = 'd', env = "VUNA_DATA_DIR", default_value = "~/.vuna")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, env = "VUNA_API_PORT", default_value_t = 8914)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "VUNA_METRICS_PORT", default_value_t = 8915)]
    pub metrics_port: u16,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "VUNA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Seconds between automation sweep passes. 0 disables the built-in
    /// sweep loop (an external agent can still POST /sweep).
    #[arg(long, env = "VUNA_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval_secs: u64,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "VUNA_DATA_DIR", default_value = "~/.vuna")]
    pub data_dir: PathBuf,

    /// Network to configure for: devnet or testnet.
    #[arg(long, default_value = "devnet")]
    pub network: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// API endpoint of the running node, as host:port.
    #[arg(long, default_value = "127.0.0.1:8914")]
    pub api_addr: String,
}

// Copyright (c) 2026 Vuna Labs. MIT License.
// See LICENSE for details.

//! # Vuna Custody Node
//!
//! Entry point for the `vuna-node` binary. Parses CLI arguments, initializes
//! logging and metrics, builds the savings controller from configuration,
//! and serves the HTTP/WS API alongside the automation sweep loop.
//!
//! The binary supports four subcommands:
//!
//! - `run`     — start the custody node
//! - `init`    — initialize the data directory and write a default config
//! - `status`  — query a running node's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use cli::{Commands, VunaNodeCli};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live audit record streaming.
/// 256 is large enough to absorb short bursts without dropping records
/// for connected WebSocket clients.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VunaNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full custody node: API server, metrics endpoint, and the
/// automation sweep loop.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "vuna_node=info,vuna_engine=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        sweep_interval_secs = args.sweep_interval_secs,
        data_dir = %args.data_dir.display(),
        "starting vuna-node"
    );

    // --- Configuration ---
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join("config.toml"));
    let node_config = if config_path.exists() {
        let loaded = NodeConfig::load(&config_path)?;
        tracing::info!(path = %config_path.display(), network = %loaded.network, "configuration loaded");
        loaded
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "no configuration file found, using built-in devnet defaults"
        );
        NodeConfig::devnet()
    };

    // --- Controller ---
    let automation = node_config.controller.automation;
    let controller = node_config
        .build_controller()
        .context("failed to build savings controller from configuration")?;
    tracing::info!(
        assets = controller.assets().len(),
        controller = %controller.address(),
        automation = %automation,
        "savings controller ready"
    );
    let controller = Arc::new(RwLock::new(controller));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: node_config.network.clone(),
        controller: Arc::clone(&controller),
        event_tx: event_tx.clone(),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Automation sweep loop ---
    // The node doubles as the automation agent: it calls the sweep with the
    // configured principal on a fixed interval. Setting the interval to 0
    // leaves settlement to an external agent hitting POST /sweep.
    let sweep_loop = if args.sweep_interval_secs > 0 {
        let controller_ref = Arc::clone(&controller);
        let metrics_ref = Arc::clone(&node_metrics);
        let event_tx_ref = event_tx.clone();
        let interval_secs = args.sweep_interval_secs;
        Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            // The first tick fires immediately; skip it so a freshly
            // started node doesn't sweep before serving its first request.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut c = controller_ref.write().await;
                let before = c.events().len();
                match c.sweep_matured(automation) {
                    Ok(settled) if settled.is_empty() => {}
                    Ok(settled) => {
                        metrics_ref.goals_swept_total.inc_by(settled.len() as u64);
                        tracing::info!(count = settled.len(), "sweep pass settled goals");
                    }
                    Err(e) => {
                        tracing::error!("sweep pass failed: {}", e);
                    }
                }
                for record in &c.events()[before..] {
                    let _ = event_tx_ref.send(record.clone());
                }
            }
        }))
    } else {
        tracing::info!("built-in sweep loop disabled");
        None
    };

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    if let Some(handle) = sweep_loop {
        handle.abort();
    }
    tracing::info!("vuna-node stopped");
    Ok(())
}

/// Initializes a new node data directory and writes the default
/// configuration for the chosen network.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("vuna_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), network = %args.network, "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let mut node_config = NodeConfig::devnet();
    node_config.network = args.network.clone();

    let config_path = data_dir.join("config.toml");
    if config_path.exists() {
        anyhow::bail!(
            "refusing to overwrite existing configuration at {}",
            config_path.display()
        );
    }
    node_config.save(&config_path)?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Network        : {}", args.network);
    println!("  Configuration  : {}", config_path.display());
    println!("  Assets         : {}", node_config.assets.len());

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let body = http_get(&args.api_addr, "/status").await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP/1.1 GET against `host:port` without pulling in an HTTP
/// client dependency. Good enough for a loopback status query.
async fn http_get(addr: &str, path: &str) -> Result<String> {
    let host = addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(addr);

    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("vuna-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

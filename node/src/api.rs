//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the custody node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/health`              | Liveness probe                       |
//! | GET    | `/status`              | Node status summary                  |
//! | GET    | `/goals`               | All savings goals                    |
//! | POST   | `/goals`               | Create a savings goal                |
//! | GET    | `/goals/:id`           | One goal with live value             |
//! | POST   | `/goals/:id/deposit`   | Deposit into a goal                  |
//! | POST   | `/goals/:id/withdraw`  | Withdraw from a goal                 |
//! | POST   | `/sweep`               | Settle all matured goals             |
//! | GET    | `/vaults/:asset`       | Vault share/value summary            |
//! | GET    | `/events`              | Recent audit records                 |
//! | GET    | `/ws`                  | WebSocket for live audit streaming   |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vuna_engine::asset::{Address, AssetId};
use vuna_engine::controller::{DepositReceipt, SavingsController, SweepOutcome, WithdrawReceipt};
use vuna_engine::error::VunaError;
use vuna_engine::events::EventRecord;
use vuna_engine::goal::GoalStatus;

use crate::metrics::SharedMetrics;

/// Number of audit records returned by `GET /events`.
const EVENT_TAIL_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`. The controller sits behind a
/// `tokio::sync::RwLock`; a write lock per mutating request is the node's
/// serialization point, matching the engine's exclusive-borrow model.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet", "testnet").
    pub network: String,
    /// The custody engine.
    pub controller: Arc<RwLock<SavingsController>>,
    /// Broadcast channel for live audit record streaming.
    pub event_tx: broadcast::Sender<EventRecord>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured API port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/goals", get(list_goals_handler).post(set_goal_handler))
        .route("/goals/:id", get(goal_handler))
        .route("/goals/:id/deposit", post(deposit_handler))
        .route("/goals/:id/withdraw", post(withdraw_handler))
        .route("/sweep", post(sweep_handler))
        .route("/vaults/:asset", get(vault_handler))
        .route("/events", get(events_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Request body for `POST /goals`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetGoalRequest {
    /// Principal creating (and owning) the goal.
    pub owner: Address,
    /// What the saver is saving for.
    pub what: String,
    /// Why.
    pub why: String,
    /// Target amount in the deposit token's smallest unit.
    pub target_amount: u64,
    /// Date after which the goal becomes sweepable.
    pub target_date: DateTime<Utc>,
    /// Asset the goal is denominated in.
    pub deposit_token: AssetId,
}

/// Response body for `POST /goals`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetGoalResponse {
    /// Id of the created goal.
    pub goal_id: u64,
}

/// Request body for `POST /goals/:id/deposit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Principal whose funds move. Must have approved the controller.
    pub depositor: Address,
    /// Amount in the goal's deposit token.
    pub amount: u64,
}

/// Request body for `POST /goals/:id/withdraw`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    /// Caller; must be the goal owner.
    pub caller: Address,
    /// Amount of underlying to redeem.
    pub amount: u64,
}

/// Request body for `POST /sweep`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepRequest {
    /// Caller; must be the automation principal.
    pub caller: Address,
}

/// Response body for `POST /sweep`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    /// One entry per goal settled in this pass.
    pub settled: Vec<SweepOutcome>,
}

/// A goal as exposed over the API: the stored record plus its live share
/// and value figures.
#[derive(Debug, Serialize, Deserialize)]
pub struct GoalView {
    pub id: u64,
    pub owner: Address,
    pub what: String,
    pub why: String,
    pub target_amount: u64,
    pub target_date: DateTime<Utc>,
    pub deposit_token: AssetId,
    pub current_amount: u64,
    pub status: GoalStatus,
    /// Vault shares held by this goal.
    pub shares: u64,
    /// Live redeemable value at the current market rate.
    pub value: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// Number of goals ever created.
    pub goal_count: usize,
    /// Supported deposit assets.
    pub assets: Vec<AssetId>,
    /// The automation principal allowed to sweep.
    pub automation: Address,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /vaults/:asset`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultResponse {
    /// The vault's asset.
    pub asset: AssetId,
    /// Shares outstanding across all goals.
    pub total_shares: u64,
    /// Live value of the pooled market position.
    pub total_value: u64,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub error: String,
    /// Stable machine-readable code.
    pub code: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Maps an engine error to its HTTP status and JSON body.
fn error_response(err: &VunaError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        VunaError::GoalNotFound { .. } => StatusCode::NOT_FOUND,
        VunaError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        VunaError::InvalidAmount | VunaError::UnsupportedAsset { .. } => StatusCode::BAD_REQUEST,
        VunaError::GoalClosed { .. } => StatusCode::CONFLICT,
        VunaError::InsufficientAllowance { .. }
        | VunaError::InsufficientBalance { .. }
        | VunaError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        VunaError::MarketDepositFailed { .. } | VunaError::MarketWithdrawFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        VunaError::ArithmeticOverflow => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.).
/// It intentionally does not inspect the controller — that belongs in
/// `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns node status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let controller = state.controller.read().await;
    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        goal_count: controller.goal_count(),
        assets: controller.assets(),
        automation: controller.automation(),
        timestamp: Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /goals` — returns every goal, terminal ones included.
async fn list_goals_handler(State(state): State<AppState>) -> impl IntoResponse {
    let controller = state.controller.read().await;
    let views: Vec<GoalView> = controller
        .goals()
        .map(|(id, account)| goal_view(&controller, *id, account))
        .collect();
    Json(views)
}

/// `GET /goals/:id` — returns one goal with its live value.
async fn goal_handler(
    Path(goal_id): Path<u64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let controller = state.controller.read().await;
    let view = controller
        .goals()
        .find(|(id, _)| **id == goal_id)
        .map(|(_, account)| goal_view(&controller, goal_id, account));
    match view {
        Some(view) => Json(view).into_response(),
        None => not_found(goal_id).into_response(),
    }
}

/// `POST /goals` — creates a savings goal.
async fn set_goal_handler(
    State(state): State<AppState>,
    Json(req): Json<SetGoalRequest>,
) -> impl IntoResponse {
    let timer = std::time::Instant::now();
    let mut controller = state.controller.write().await;
    let before = controller.events().len();

    let result = controller.set_goal(
        req.owner,
        &req.what,
        &req.why,
        req.target_amount,
        req.target_date,
        req.deposit_token,
    );

    match result {
        Ok(goal_id) => {
            state.metrics.goals_created_total.inc();
            finish_mutation(&state, &controller, before, timer);
            (StatusCode::CREATED, Json(SetGoalResponse { goal_id })).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

/// `POST /goals/:id/deposit` — pulls funds from the depositor and
/// forwards them to the lending market.
async fn deposit_handler(
    Path(goal_id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> impl IntoResponse {
    let timer = std::time::Instant::now();
    let mut controller = state.controller.write().await;
    let before = controller.events().len();

    match controller.deposit(req.depositor, goal_id, req.amount) {
        Ok(receipt) => {
            state.metrics.deposits_total.inc();
            finish_mutation(&state, &controller, before, timer);
            Json::<DepositReceipt>(receipt).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

/// `POST /goals/:id/withdraw` — redeems value from a goal and pays the
/// goal's owner.
async fn withdraw_handler(
    Path(goal_id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> impl IntoResponse {
    let timer = std::time::Instant::now();
    let mut controller = state.controller.write().await;
    let before = controller.events().len();

    match controller.withdraw(req.caller, goal_id, req.amount) {
        Ok(receipt) => {
            state.metrics.withdrawals_total.inc();
            finish_mutation(&state, &controller, before, timer);
            Json::<WithdrawReceipt>(receipt).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

/// `POST /sweep` — settles every matured goal. The caller must be the
/// automation principal.
async fn sweep_handler(
    State(state): State<AppState>,
    Json(req): Json<SweepRequest>,
) -> impl IntoResponse {
    let timer = std::time::Instant::now();
    let mut controller = state.controller.write().await;
    let before = controller.events().len();

    match controller.sweep_matured(req.caller) {
        Ok(settled) => {
            state.metrics.goals_swept_total.inc_by(settled.len() as u64);
            finish_mutation(&state, &controller, before, timer);
            Json(SweepResponse { settled }).into_response()
        }
        Err(err) => {
            // A mid-batch failure still committed earlier settlements.
            finish_mutation(&state, &controller, before, timer);
            error_response(&err).into_response()
        }
    }
}

/// `GET /vaults/:asset` — vault share and value summary. The asset is a
/// hex-encoded address.
async fn vault_handler(
    Path(asset): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let asset = match Address::from_hex(&asset) {
        Ok(a) => a,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                    code: "invalid_asset".to_string(),
                }),
            )
                .into_response();
        }
    };

    let controller = state.controller.read().await;
    match controller.vault(asset) {
        Some(vault) => Json(VaultResponse {
            asset,
            total_shares: vault.total_shares(),
            total_value: controller.vault_value(asset),
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no vault registered for {asset}"),
                code: "unsupported_asset".to_string(),
            }),
        )
            .into_response(),
    }
}

/// `GET /events` — the most recent audit records, oldest first.
async fn events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let controller = state.controller.read().await;
    let events = controller.events();
    let tail = &events[events.len().saturating_sub(EVENT_TAIL_LEN)..];
    Json(tail.to_vec())
}

/// `GET /ws` — WebSocket upgrade for live audit record streaming.
///
/// Clients receive one JSON-encoded [`EventRecord`] per committed custody
/// operation. The connection is read-only from the server's perspective;
/// client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast records
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            record = rx.recv() => {
                match record {
                    Ok(rec) => {
                        let payload = match serde_json::to_string(&rec) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws record: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            // Client disconnected.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} records", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {
                        // Client messages are ignored — this is a push-only channel.
                    }
                    _ => break, // Disconnected or error.
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn goal_view(
    controller: &SavingsController,
    id: u64,
    account: &vuna_engine::ledger::GoalAccount,
) -> GoalView {
    GoalView {
        id,
        owner: account.goal.owner,
        what: account.goal.what.clone(),
        why: account.goal.why.clone(),
        target_amount: account.goal.target_amount,
        target_date: account.goal.target_date,
        deposit_token: account.goal.deposit_token,
        current_amount: account.goal.current_amount,
        status: account.goal.status,
        shares: account.shares,
        value: controller.goal_value(id).unwrap_or(0),
        created_at: account.goal.created_at,
        updated_at: account.goal.updated_at,
    }
}

fn not_found(goal_id: u64) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("goal {goal_id} not found"),
            code: "goal_not_found".to_string(),
        }),
    )
}

/// Broadcasts the records appended since `before`, refreshes the gauges,
/// and records the operation latency.
fn finish_mutation(
    state: &AppState,
    controller: &SavingsController,
    before: usize,
    timer: std::time::Instant,
) {
    for record in &controller.events()[before..] {
        let _ = state.event_tx.send(record.clone());
    }

    let open = controller
        .goals()
        .filter(|(_, a)| !a.goal.status.is_terminal())
        .count();
    state.metrics.open_goals.set(open as i64);

    let custody: u64 = controller
        .assets()
        .into_iter()
        .map(|asset| controller.vault_value(asset))
        .sum();
    state.metrics.custody_value.set(custody as i64);

    state
        .metrics
        .operation_latency_seconds
        .observe(timer.elapsed().as_secs_f64());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

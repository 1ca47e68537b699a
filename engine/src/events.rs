//! # Audit Events
//!
//! Every successful mutating operation appends one [`EventRecord`] to the
//! controller's event log. Records are append-only and serializable, so
//! the node can stream them to subscribers and serve the recent tail over
//! HTTP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::{Address, AssetId};

/// The payload of an audit record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VunaEvent {
    /// A goal was created.
    #[serde(rename = "goal_created")]
    GoalCreated {
        goal_id: u64,
        owner: Address,
        deposit_token: AssetId,
        target_amount: u64,
        target_date: DateTime<Utc>,
    },
    /// Principal landed in a goal and was forwarded to the lending market.
    #[serde(rename = "deposit_received")]
    DepositReceived {
        goal_id: u64,
        depositor: Address,
        amount: u64,
        shares_minted: u64,
    },
    /// Value was redeemed from a goal and paid to its owner.
    #[serde(rename = "withdrawal_paid")]
    WithdrawalPaid {
        goal_id: u64,
        recipient: Address,
        amount: u64,
        shares_burned: u64,
    },
    /// The automation sweep redeemed a matured goal in full.
    #[serde(rename = "goal_swept")]
    GoalSwept {
        goal_id: u64,
        recipient: Address,
        amount: u64,
    },
}

/// A timestamped, uniquely identified audit record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique record id.
    pub id: Uuid,
    /// When the operation committed.
    pub at: DateTime<Utc>,
    /// What happened.
    pub event: VunaEvent,
}

impl EventRecord {
    /// Wraps `event` with a fresh id and the current time.
    pub fn now(event: VunaEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            event,
        }
    }
}

// Copyright (c) 2026 Vuna Labs. MIT License.
// See LICENSE for details.

//! # Vuna Engine — Goal-Based Savings Custody
//!
//! Savers lock assets against named goals ("New Car", "Emergency Fund"),
//! deposits are forwarded to a lending market so idle principal earns
//! yield, and an automation principal sweeps matured goals back to their
//! owners. This crate is the custody core: share accounting, the goal
//! ledger, and the authorization rules — no networking, no persistence,
//! no clock abstraction it doesn't need.
//!
//! ## Architecture
//!
//! The modules mirror the actual concerns of a custody engine:
//!
//! - **asset** — 20-byte addresses doubling as principal and asset ids.
//! - **token** — The transfer/approve capability deposit assets must offer.
//! - **market** — The yield source: deposit, withdraw, live valuation.
//! - **vault** — Per-asset share accounting over the market position.
//! - **goal** — The savings goal record and its lifecycle state machine.
//! - **ledger** — The arena of goals and their share claims.
//! - **automation** — The single-principal gate on maintenance entry points.
//! - **controller** — The one front door: every mutation goes through it.
//! - **events** — Append-only audit records of everything that committed.
//! - **error** — The complete failure taxonomy. Nothing fails silently.
//!
//! ## Design Philosophy
//!
//! 1. Whole operations or nothing: validate first, external call second,
//!    commit last.
//! 2. Checked arithmetic everywhere money is counted. Wrapping is a bug
//!    class we declined to import.
//! 3. Value is read from the market live, never cached — that one rule is
//!    the entire yield-distribution mechanism.
//! 4. If it touches money, it has tests. Plural.

pub mod asset;
pub mod automation;
pub mod controller;
pub mod error;
pub mod events;
pub mod goal;
pub mod ledger;
pub mod market;
pub mod token;
pub mod vault;

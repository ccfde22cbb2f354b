//! Orchestrator control for Tradewind.
//!
//! This crate drives the remote trading orchestrator's session state
//! through its small set of safety-critical commands and keeps the local
//! mirror consistent with the server's authoritative state despite network
//! failure and concurrent commands. State changes are confirmed-only and
//! pass through the session store's stale-write guard.

pub mod client;

pub use client::ControlClient;

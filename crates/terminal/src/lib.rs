//! Terminal-side client for lane sessions.
//!
//! Provides the REST command client with typed recovery hints, the
//! WebSocket subscription client, frame parsing, the projection
//! processor that folds events into a [`frontdesk_core::projection::TerminalState`],
//! and reconnection with resync.

pub mod api;
pub mod client;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod runner;

//! HTTP handlers. Each handler authenticates through an extractor, checks
//! its input, and hands the command to the [`Coordinator`](crate::engine::Coordinator).

pub mod checkout;
pub mod inventory;
pub mod lane;
pub mod waitlist;

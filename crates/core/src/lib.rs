//! Domain logic for lane-session coordination between check-in terminals.
//!
//! Nothing in this crate performs I/O. The server owns the stores defined
//! here behind its own locks; terminals use [`projection`] to fold the
//! events the server broadcasts.

pub mod checkout;
pub mod customer;
pub mod error;
pub mod events;
pub mod inventory;
pub mod lane;
pub mod late_fee;
pub mod projection;
pub mod rental;
pub mod roles;
pub mod selection;
pub mod types;
pub mod waitlist;

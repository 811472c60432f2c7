//! Row structs for the venue tables.
//!
//! Each submodule contains a `FromRow` struct matching the database row and
//! the conversion into its `frontdesk_core` domain type.

pub mod customer;
pub mod event;
pub mod inventory;

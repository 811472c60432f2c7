//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod customer_repo;
pub mod event_repo;
pub mod inventory_repo;

pub use customer_repo::CustomerRepo;
pub use event_repo::EventRepo;
pub use inventory_repo::InventoryRepo;

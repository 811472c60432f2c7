//! Front desk event bus and its durable subscribers.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`VenueEvent`]: a terminal-facing event plus server metadata.
//! - [`EventPersistence`]: appends every event to `lane_events`.
//! - [`StateWriteBack`]: writes inventory and ban changes back to their rows.

pub mod bus;
pub mod persistence;
pub mod write_back;

pub use bus::{EventBus, VenueEvent};
pub use persistence::EventPersistence;
pub use write_back::StateWriteBack;

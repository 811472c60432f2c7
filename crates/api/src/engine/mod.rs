//! The authoritative venue engine.
//!
//! [`Coordinator`] owns every lane session, the inventory, the customer
//! registry, the checkout board and the waitlist. Handlers call it; it
//! publishes one event per affected scope on the [`EventBus`](frontdesk_events::EventBus).
//! [`VenueSeed`] supplies its starting state.

pub mod coordinator;
pub mod seed;

pub use coordinator::{Assignment, CheckinCompleted, Clock, Coordinator, CoordinatorSettings};
pub use seed::VenueSeed;

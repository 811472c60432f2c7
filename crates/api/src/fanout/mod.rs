//! Event fan-out from the bus to terminal WebSockets.
//!
//! The [`EventFanout`] subscribes to the event bus and pushes every event,
//! as a `{type, payload}` text frame, to the connections scoped to it.

pub mod router;

pub use router::EventFanout;

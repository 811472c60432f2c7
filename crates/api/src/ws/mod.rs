//! WebSocket infrastructure for terminal connections.
//!
//! Provides connection management (scoped by lane and subscribed event
//! types), heartbeat monitoring, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;

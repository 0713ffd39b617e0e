//! WebSocket server for real-time updates.
//!
//! Every accepted sensor reading is pushed to all connected clients as a
//! `NewReading` event. Delivery is best-effort: no acknowledgement, no replay
//! for clients that connect later.

pub mod error;
pub mod events;
pub mod server;

pub use error::FanoutError;
pub use events::{FanoutEvent, NEW_READING};
pub use server::{WebSocketServer, WsState};

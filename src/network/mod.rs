//! Network Layer
//!
//! WebSocket server hosting controller authorities.
//! This layer is **non-deterministic** - all hit logic runs through `protocol/`.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage, WelcomeInfo};
pub use server::{ConnectionState, GameServer, GameServerError, ServerConfig};

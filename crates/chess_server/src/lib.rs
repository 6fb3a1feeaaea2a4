//! Live multiplayer chess server.
//!
//! Clients hold a WebSocket open per game and exchange JSON commands:
//! - `CONNECT`, `MAKE_MOVE`, `LEAVE`, `RESIGN` from client to server
//! - `LOAD_GAME`, `NOTIFICATION`, `ERROR` from server to client
//!
//! # Usage
//!
//! ```bash
//! cargo run -p chess_server -- --config chess_server.toml
//! ```

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handler;
pub mod hub;
pub mod protocol;
pub mod routes;
pub mod store;

pub use auth::{Authorizer, MemoryAuthorizer};
pub use config::{ConfigError, ServerConfig, UserEntry};
pub use coordinator::{MoveOutcome, SessionCoordinator};
pub use error::{Result, ServerError};
pub use handler::AppState;
pub use hub::{Client, Connection, ConnectionHub, ConnectionId, Role};
pub use protocol::{ServerMessage, UserCommand};
pub use routes::create_router;
pub use store::{GameId, GameSession, MemoryStore, SessionStore};

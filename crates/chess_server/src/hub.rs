//! Registry of live connections, grouped by game.
//!
//! Broadcasts copy the recipient list out of the lock and send afterwards, so
//! connections can come and go while a broadcast is in flight. Delivery is
//! best effort: a connection whose writer has gone away is skipped.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chess_core::Color;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::protocol::ServerMessage;
use crate::store::{GameId, GameSession};

pub type ConnectionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player(Color),
    Observer,
}

impl Role {
    pub fn color(self) -> Option<Color> {
        match self {
            Role::Player(c) => Some(c),
            Role::Observer => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Player(c) => write!(f, "player {c}"),
            Role::Observer => write!(f, "an observer"),
        }
    }
}

/// Outbound half of one client transport. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ConnectionId,
    sender: UnboundedSender<ServerMessage>,
}

impl Client {
    pub fn new(id: ConnectionId, sender: UnboundedSender<ServerMessage>) -> Self {
        Self { id, sender }
    }

    /// Queues `msg` for the writer task. Returns false if the transport is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.sender.send(msg).is_ok()
    }
}

/// A client attached to one game.
#[derive(Debug, Clone)]
pub struct Connection {
    pub client: Client,
    pub game_id: GameId,
    pub username: String,
    pub role: Role,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.client.id
    }
}

#[derive(Debug, Default)]
pub struct ConnectionHub {
    games: RwLock<HashMap<GameId, Vec<Arc<Connection>>>>,
    next_id: AtomicU64,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Registers `conn`, replacing an earlier registration of the same client
    /// for the same game.
    pub fn add(&self, conn: Connection) {
        let mut games = self.games.write().unwrap_or_else(PoisonError::into_inner);
        let list = games.entry(conn.game_id).or_default();
        list.retain(|c| c.id() != conn.id());
        debug!(game_id = conn.game_id, conn = conn.id(), user = %conn.username, "connection added");
        list.push(Arc::new(conn));
    }

    pub fn remove(&self, game_id: GameId, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut games = self.games.write().unwrap_or_else(PoisonError::into_inner);
        let list = games.get_mut(&game_id)?;
        let idx = list.iter().position(|c| c.id() == id)?;
        let removed = list.remove(idx);
        if list.is_empty() {
            games.remove(&game_id);
        }
        debug!(game_id, conn = id, "connection removed");
        Some(removed)
    }

    /// Removes every registration of client `id`, across all games.
    pub fn remove_client(&self, id: ConnectionId) -> Vec<Arc<Connection>> {
        let mut games = self.games.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = Vec::new();
        games.retain(|_, list| {
            list.retain(|c| {
                if c.id() == id {
                    removed.push(c.clone());
                    false
                } else {
                    true
                }
            });
            !list.is_empty()
        });
        removed
    }

    pub fn connection(&self, game_id: GameId, id: ConnectionId) -> Option<Arc<Connection>> {
        let games = self.games.read().unwrap_or_else(PoisonError::into_inner);
        games.get(&game_id)?.iter().find(|c| c.id() == id).cloned()
    }

    /// Snapshot of the connections attached to `game_id`.
    pub fn connections(&self, game_id: GameId) -> Vec<Arc<Connection>> {
        let games = self.games.read().unwrap_or_else(PoisonError::into_inner);
        games.get(&game_id).cloned().unwrap_or_default()
    }

    /// Sends `LOAD_GAME` to every connection on the game, sender included.
    /// Returns the number of connections reached.
    pub fn broadcast_state(&self, game_id: GameId, session: &GameSession) -> usize {
        let msg = ServerMessage::load_game(session.clone());
        self.fan_out(game_id, &msg, None)
    }

    /// Sends a `NOTIFICATION` to every connection on the game except `exclude`.
    pub fn broadcast_notification(
        &self,
        game_id: GameId,
        text: &str,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let msg = ServerMessage::notification(text);
        self.fan_out(game_id, &msg, exclude)
    }

    fn fan_out(&self, game_id: GameId, msg: &ServerMessage, exclude: Option<ConnectionId>) -> usize {
        let mut delivered = 0;
        for conn in self.connections(game_id) {
            if Some(conn.id()) == exclude {
                continue;
            }
            if conn.client.send(msg.clone()) {
                delivered += 1;
            } else {
                warn!(game_id, conn = conn.id(), user = %conn.username, "dropping message for closed connection");
            }
        }
        delivered
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod hub_tests;

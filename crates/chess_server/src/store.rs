//! Session storage: game id → game, seat assignments and display name.
//!
//! [`SessionStore`] is the seam for a durable backend. [`MemoryStore`] keeps
//! everything in a map and is what the binary runs with.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chess_core::{Color, Game};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

pub type GameId = u32;

/// One live match. This is also the snapshot sent to clients in `LOAD_GAME`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    pub white_username: Option<String>,
    pub black_username: Option<String>,
    pub game_name: String,
    pub game: Game,
}

impl GameSession {
    pub fn new(game_id: GameId, game_name: impl Into<String>) -> Self {
        Self {
            game_id,
            white_username: None,
            black_username: None,
            game_name: game_name.into(),
            game: Game::new(),
        }
    }

    pub fn player(&self, color: Color) -> Option<&str> {
        match color {
            Color::White => self.white_username.as_deref(),
            Color::Black => self.black_username.as_deref(),
        }
    }

    fn seat_mut(&mut self, color: Color) -> &mut Option<String> {
        match color {
            Color::White => &mut self.white_username,
            Color::Black => &mut self.black_username,
        }
    }
}

/// Synchronous, id-keyed game storage. Unknown ids fail with
/// `NoExistingGame`, never with an empty success.
pub trait SessionStore: Send + Sync {
    /// Stores a fresh game under the smallest unused positive id.
    fn create_game(&self, name: &str) -> Result<GameId>;
    fn get_game(&self, id: GameId) -> Result<GameSession>;
    /// Replaces an existing game.
    fn put_game(&self, id: GameId, session: GameSession) -> Result<()>;
    fn list_games(&self) -> Result<Vec<GameSession>>;
    /// Assigns `username` to an empty seat.
    fn join_seat(&self, id: GameId, color: Color, username: &str) -> Result<()>;
    /// Drops every game. Administrative reset only.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    games: RwLock<BTreeMap<GameId, GameSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Smallest positive id not present in `games`.
fn first_free_id(games: &BTreeMap<GameId, GameSession>) -> GameId {
    let mut id = 1;
    for &used in games.keys() {
        if used != id {
            break;
        }
        id += 1;
    }
    id
}

impl SessionStore for MemoryStore {
    fn create_game(&self, name: &str) -> Result<GameId> {
        let mut games = self.games.write()?;
        let id = first_free_id(&games);
        games.insert(id, GameSession::new(id, name));
        Ok(id)
    }

    fn get_game(&self, id: GameId) -> Result<GameSession> {
        self.games
            .read()?
            .get(&id)
            .cloned()
            .ok_or(ServerError::NoExistingGame(id))
    }

    fn put_game(&self, id: GameId, session: GameSession) -> Result<()> {
        let mut games = self.games.write()?;
        let slot = games.get_mut(&id).ok_or(ServerError::NoExistingGame(id))?;
        *slot = session;
        Ok(())
    }

    fn list_games(&self) -> Result<Vec<GameSession>> {
        Ok(self.games.read()?.values().cloned().collect())
    }

    fn join_seat(&self, id: GameId, color: Color, username: &str) -> Result<()> {
        let mut games = self.games.write()?;
        let session = games.get_mut(&id).ok_or(ServerError::NoExistingGame(id))?;
        let seat = session.seat_mut(color);
        if seat.is_some() {
            return Err(ServerError::AlreadyTaken(color));
        }
        *seat = Some(username.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.games.write()?.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;

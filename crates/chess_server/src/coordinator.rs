//! Session coordinator: the only writer of game state.
//!
//! Every mutation of a game runs while holding that game's own mutex, from
//! loading the session out of the store to writing it back. Games never share
//! a mutex, so moves in different games proceed in parallel.
//!
//! The `*_with` variants take a publish callback that runs after the write,
//! still under the game's mutex. Broadcasts made from it reach clients in the
//! order the mutations were applied. The callback must not call back into
//! the coordinator for the same game.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chess_core::{Color, GameStatus, Move, MoveError};
use tracing::info;

use crate::error::{Result, ServerError};
use crate::hub::Role;
use crate::store::{GameId, GameSession, SessionStore};

/// Result of a successful move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// Session after the move, already written back to the store
    pub session: GameSession,
    pub mover: Color,
    /// Status of the side now to move
    pub opponent_status: GameStatus,
}

impl MoveOutcome {
    pub fn opponent(&self) -> Color {
        self.mover.other()
    }

    pub fn is_check(&self) -> bool {
        self.opponent_status == GameStatus::Check
    }

    pub fn is_checkmate(&self) -> bool {
        self.opponent_status == GameStatus::Checkmate
    }

    pub fn is_stalemate(&self) -> bool {
        self.opponent_status == GameStatus::Stalemate
    }
}

pub struct SessionCoordinator {
    store: Arc<dyn SessionStore>,
    locks: Mutex<HashMap<GameId, Arc<Mutex<()>>>>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Mutex guarding mutations of `id`. Fails for unknown games.
    fn lock_for(&self, id: GameId) -> Result<Arc<Mutex<()>>> {
        if let Some(lock) = self.locks.lock()?.get(&id) {
            return Ok(lock.clone());
        }
        // Checked before inserting so unknown ids never get an entry
        self.store.get_game(id)?;
        Ok(self.locks.lock()?.entry(id).or_default().clone())
    }

    /// Runs `f` on the stored session with the game's mutex held and writes
    /// the result back. `publish` turns the result into the return value
    /// before the mutex is released.
    fn mutate<T, R>(
        &self,
        id: GameId,
        f: impl FnOnce(&mut GameSession) -> Result<T>,
        publish: impl FnOnce(T, GameSession) -> R,
    ) -> Result<R> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock()?;
        let mut session = self.store.get_game(id)?;
        let out = f(&mut session)?;
        self.store.put_game(id, session.clone())?;
        Ok(publish(out, session))
    }

    /// Runs `f` on the current session with the game's mutex held, so no
    /// mutation of that game can interleave with it.
    pub fn observe<T>(&self, id: GameId, f: impl FnOnce(&GameSession) -> T) -> Result<T> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock()?;
        let session = self.store.get_game(id)?;
        Ok(f(&session))
    }

    pub fn create_game(&self, name: &str) -> Result<GameId> {
        let id = self.store.create_game(name)?;
        info!(game_id = id, name, "game created");
        Ok(id)
    }

    pub fn join_game(&self, id: GameId, color: Color, username: &str) -> Result<()> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock()?;
        self.store.join_seat(id, color, username)?;
        info!(game_id = id, %color, user = username, "seat taken");
        Ok(())
    }

    /// Plays `mv` for `acting_color`. If it mates or stalemates the opponent,
    /// the game is marked over in the same critical section.
    pub fn make_move(&self, id: GameId, mv: Move, acting_color: Color) -> Result<MoveOutcome> {
        self.make_move_with(id, mv, acting_color, |_| {})
    }

    /// [`make_move`](Self::make_move), calling `publish` with the outcome
    /// before the game's mutex is released.
    pub fn make_move_with(
        &self,
        id: GameId,
        mv: Move,
        acting_color: Color,
        publish: impl FnOnce(&MoveOutcome),
    ) -> Result<MoveOutcome> {
        self.mutate(
            id,
            |session| {
                let game = &mut session.game;
                if game.is_game_over() {
                    return Err(MoveError::GameOver.into());
                }
                if acting_color != game.current_turn() {
                    return Err(MoveError::WrongTurn(game.current_turn()).into());
                }
                game.make_move(mv)?;

                let status = game.status(acting_color.other());
                if matches!(status, GameStatus::Checkmate | GameStatus::Stalemate) {
                    game.end_game();
                }
                Ok(status)
            },
            |opponent_status, session| {
                info!(game_id = id, %mv, color = %acting_color, status = ?opponent_status, "move applied");
                let outcome = MoveOutcome {
                    session,
                    mover: acting_color,
                    opponent_status,
                };
                publish(&outcome);
                outcome
            },
        )
    }

    /// Marks the game over and returns the final snapshot.
    pub fn end_game(&self, id: GameId) -> Result<GameSession> {
        self.mutate(
            id,
            |session| {
                session.game.end_game();
                Ok(())
            },
            |(), session| session,
        )
    }

    /// Ends the game on behalf of `color`. Fails if it is already over.
    pub fn resign(&self, id: GameId, color: Color) -> Result<GameSession> {
        self.resign_with(id, color, |_| {})
    }

    /// [`resign`](Self::resign), calling `publish` with the final snapshot
    /// before the game's mutex is released.
    pub fn resign_with(
        &self,
        id: GameId,
        color: Color,
        publish: impl FnOnce(&GameSession),
    ) -> Result<GameSession> {
        self.mutate(
            id,
            |session| {
                if session.game.is_game_over() {
                    return Err(ServerError::InvalidMove(
                        "the game is already over".to_string(),
                    ));
                }
                session.game.end_game();
                Ok(())
            },
            |(), session| {
                info!(game_id = id, %color, "resigned");
                publish(&session);
                session
            },
        )
    }

    pub fn game(&self, id: GameId) -> Result<GameSession> {
        self.store.get_game(id)
    }

    pub fn list_games(&self) -> Result<Vec<GameSession>> {
        self.store.list_games()
    }

    pub fn get_player(&self, id: GameId, color: Color) -> Result<Option<String>> {
        Ok(self.store.get_game(id)?.player(color).map(str::to_string))
    }

    /// Role a user connects with: the seat they hold, otherwise observer.
    pub fn role_of(&self, id: GameId, username: &str) -> Result<Role> {
        let session = self.store.get_game(id)?;
        let role = [Color::White, Color::Black]
            .into_iter()
            .find(|&c| session.player(c) == Some(username))
            .map_or(Role::Observer, Role::Player);
        Ok(role)
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod coordinator_tests;

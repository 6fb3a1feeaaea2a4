use chess_core::{Color, MoveError};

use crate::store::GameId;

/// Errors returned by the session layer. None of them are fatal; the command
/// handler reports them to the originating connection only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("game {0} does not exist")]
    NoExistingGame(GameId),

    #[error("{0} seat is already taken")]
    AlreadyTaken(Color),

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<MoveError> for ServerError {
    fn from(e: MoveError) -> Self {
        ServerError::InvalidMove(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ServerError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ServerError::Internal("lock poisoned".into())
    }
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

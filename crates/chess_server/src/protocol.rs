//! Wire messages exchanged over the WebSocket, one JSON object per text frame.

use chess_core::Move;
use serde::{Deserialize, Serialize};

use crate::store::{GameId, GameSession};

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserCommand {
    Connect {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
    },
    MakeMove {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
        #[serde(rename = "move")]
        mv: Move,
    },
    Leave {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
    },
    Resign {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
    },
}

impl UserCommand {
    pub fn auth_token(&self) -> &str {
        match self {
            UserCommand::Connect { auth_token, .. }
            | UserCommand::MakeMove { auth_token, .. }
            | UserCommand::Leave { auth_token, .. }
            | UserCommand::Resign { auth_token, .. } => auth_token,
        }
    }

    pub fn game_id(&self) -> GameId {
        match self {
            UserCommand::Connect { game_id, .. }
            | UserCommand::MakeMove { game_id, .. }
            | UserCommand::Leave { game_id, .. }
            | UserCommand::Resign { game_id, .. } => *game_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UserCommand::Connect { .. } => "CONNECT",
            UserCommand::MakeMove { .. } => "MAKE_MOVE",
            UserCommand::Leave { .. } => "LEAVE",
            UserCommand::Resign { .. } => "RESIGN",
        }
    }
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    LoadGame {
        game: GameSession,
    },
    Notification {
        message: String,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn load_game(game: GameSession) -> Self {
        ServerMessage::LoadGame { game }
    }

    pub fn notification(text: impl Into<String>) -> Self {
        ServerMessage::Notification {
            message: text.into(),
        }
    }

    /// Error replies always start with `Error:` so clients can spot them.
    pub fn error(err: impl std::fmt::Display) -> Self {
        ServerMessage::Error {
            message: format!("Error: {err}"),
        }
    }
}

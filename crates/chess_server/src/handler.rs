//! Command protocol handler.
//!
//! Turns one decoded [`UserCommand`] into coordinator calls and hub traffic.
//! Failures go back to the originating client only. On success the fixed
//! order is: state broadcast, then the move notification, then any
//! check/checkmate/stalemate notification.
//!
//! Broadcasts that follow a mutation are made from the coordinator's publish
//! callback, while the game's mutex is still held, so every client sees the
//! snapshots of one game in the order the moves were applied.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::Authorizer;
use crate::coordinator::{MoveOutcome, SessionCoordinator};
use crate::error::{Result, ServerError};
use crate::hub::{Client, Connection, ConnectionHub, Role};
use crate::protocol::{ServerMessage, UserCommand};
use crate::store::GameId;
use chess_core::{Color, Move};

/// Everything a command needs, passed explicitly to each handler call.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
    pub hub: Arc<ConnectionHub>,
    pub auth: Arc<dyn Authorizer>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        hub: Arc<ConnectionHub>,
        auth: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            coordinator,
            hub,
            auth,
        }
    }
}

/// Decodes a text frame and handles it. Undecodable frames get an error reply.
pub fn handle_text(state: &AppState, client: &Client, text: &str) {
    match serde_json::from_str::<UserCommand>(text) {
        Ok(cmd) => handle_command(state, client, cmd),
        Err(e) => {
            debug!(conn = client.id, error = %e, "undecodable command");
            client.send(ServerMessage::error(ServerError::BadRequest(e.to_string())));
        }
    }
}

pub fn handle_command(state: &AppState, client: &Client, cmd: UserCommand) {
    let kind = cmd.kind();
    let game_id = cmd.game_id();
    if let Err(e) = dispatch(state, client, cmd) {
        debug!(conn = client.id, game_id, command = kind, error = %e, "command failed");
        client.send(ServerMessage::error(e));
    }
}

fn dispatch(state: &AppState, client: &Client, cmd: UserCommand) -> Result<()> {
    let username = state.auth.username_for(cmd.auth_token())?;
    match cmd {
        UserCommand::Connect { game_id, .. } => connect(state, client, game_id, username),
        UserCommand::MakeMove { game_id, mv, .. } => {
            make_move(state, client, game_id, &username, mv)
        }
        UserCommand::Leave { game_id, .. } => leave(state, client, game_id, &username),
        UserCommand::Resign { game_id, .. } => resign(state, client, game_id, &username),
    }
}

fn connect(state: &AppState, client: &Client, game_id: GameId, username: String) -> Result<()> {
    let role = state.coordinator.role_of(game_id, &username)?;

    // Registered and sent the snapshot with the game held, so no move can
    // land between the snapshot and the first broadcast this client sees.
    state.coordinator.observe(game_id, |session| {
        state.hub.add(Connection {
            client: client.clone(),
            game_id,
            username: username.clone(),
            role,
        });
        client.send(ServerMessage::load_game(session.clone()));
    })?;
    info!(game_id, conn = client.id, user = %username, %role, "connected");

    let text = format!("{username} connected as {role}");
    state
        .hub
        .broadcast_notification(game_id, &text, Some(client.id));
    Ok(())
}

/// The registration this client holds for `game_id`, which must belong to
/// `username`.
fn attached(
    state: &AppState,
    client: &Client,
    game_id: GameId,
    username: &str,
) -> Result<Arc<Connection>> {
    let conn = state
        .hub
        .connection(game_id, client.id)
        .ok_or_else(|| ServerError::BadRequest(format!("not connected to game {game_id}")))?;
    if conn.username != username {
        return Err(ServerError::Unauthorized);
    }
    Ok(conn)
}

fn make_move(
    state: &AppState,
    client: &Client,
    game_id: GameId,
    username: &str,
    mv: Move,
) -> Result<()> {
    let conn = attached(state, client, game_id, username)?;
    let color = conn
        .role
        .color()
        .ok_or_else(|| ServerError::InvalidMove("observers cannot make moves".into()))?;

    state
        .coordinator
        .make_move_with(game_id, mv, color, |outcome| {
            state.hub.broadcast_state(game_id, &outcome.session);
            let text = describe_move(&conn.username, mv);
            state
                .hub
                .broadcast_notification(game_id, &text, Some(client.id));
            announce_status(state, game_id, outcome);
        })?;
    Ok(())
}

fn describe_move(username: &str, mv: Move) -> String {
    match mv.promotion {
        Some(p) => format!("{username} moved {} to {} and promoted to {p}", mv.start, mv.end),
        None => format!("{username} moved {} to {}", mv.start, mv.end),
    }
}

fn player_label(state: &AppState, game_id: GameId, color: Color) -> String {
    match state.coordinator.get_player(game_id, color) {
        Ok(Some(name)) => format!("{name} ({color})"),
        Ok(None) => color.to_string(),
        Err(e) => {
            warn!(game_id, %color, error = %e, "player lookup failed");
            color.to_string()
        }
    }
}

/// Check, checkmate and stalemate announcements for the side now to move.
/// The coordinator has already ended the game on mate or stalemate, so the
/// outcome's session is the final snapshot.
fn announce_status(state: &AppState, game_id: GameId, outcome: &MoveOutcome) {
    let opponent = outcome.opponent();
    let label = player_label(state, game_id, opponent);

    if outcome.is_checkmate() {
        let text = format!("{label} is in checkmate. {} wins", outcome.mover);
        state.hub.broadcast_notification(game_id, &text, None);
        state.hub.broadcast_state(game_id, &outcome.session);
        info!(game_id, winner = %outcome.mover, "checkmate");
    } else if outcome.is_check() {
        let text = format!("{label} is in check");
        state.hub.broadcast_notification(game_id, &text, None);
    } else if outcome.is_stalemate() {
        let text = format!("{label} is in stalemate. The game is a draw");
        state.hub.broadcast_notification(game_id, &text, None);
        state.hub.broadcast_state(game_id, &outcome.session);
        info!(game_id, "stalemate");
    }
}

fn leave(state: &AppState, client: &Client, game_id: GameId, username: &str) -> Result<()> {
    let conn = attached(state, client, game_id, username)?;
    state.hub.remove(game_id, client.id);
    info!(game_id, conn = client.id, user = %conn.username, "left");
    let text = format!("{} left the game", conn.username);
    state.hub.broadcast_notification(game_id, &text, None);
    Ok(())
}

fn resign(state: &AppState, client: &Client, game_id: GameId, username: &str) -> Result<()> {
    let conn = attached(state, client, game_id, username)?;
    let Role::Player(color) = conn.role else {
        return Err(ServerError::InvalidMove("observers cannot resign".into()));
    };

    state.coordinator.resign_with(game_id, color, |last| {
        state.hub.broadcast_state(game_id, last);
        let text = format!("{} resigned. {} wins", conn.username, color.other());
        state.hub.broadcast_notification(game_id, &text, None);
    })?;
    Ok(())
}

/// Drops every registration held by a client whose transport closed.
pub fn disconnect(state: &AppState, client: &Client) {
    for conn in state.hub.remove_client(client.id) {
        info!(game_id = conn.game_id, conn = client.id, user = %conn.username, "disconnected");
        let text = format!("{} left the game", conn.username);
        state
            .hub
            .broadcast_notification(conn.game_id, &text, None);
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod handler_tests;

//! HTTP surface: the WebSocket command channel plus a few JSON endpoints for
//! listing, creating and joining games.

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::get,
};
use chess_core::Color;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};
use crate::handler::{self, AppState};
use crate::hub::Client;
use crate::protocol::ServerMessage;
use crate::store::{GameId, GameSession};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler))
        .route("/game", get(list_games).post(create_game).put(join_game))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_)
            | ServerError::InvalidMove(_)
            | ServerError::NoExistingGame(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::AlreadyTaken(_) => StatusCode::FORBIDDEN,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "message": format!("Error: {self}") });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListGamesResponse {
    pub games: Vec<GameSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub game_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameResponse {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinGameRequest {
    #[serde(rename = "playerColor")]
    pub player_color: Color,
    #[serde(rename = "gameID")]
    pub game_id: GameId,
}

/// Username behind the `authorization` header.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<String> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;
    state.auth.username_for(token)
}

async fn list_games(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListGamesResponse>> {
    authorize(&state, &headers)?;
    let games = state.coordinator.list_games()?;
    Ok(Json(ListGamesResponse { games }))
}

async fn create_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>> {
    authorize(&state, &headers)?;
    if req.game_name.trim().is_empty() {
        return Err(ServerError::BadRequest("game name is empty".into()));
    }
    let game_id = state.coordinator.create_game(&req.game_name)?;
    Ok(Json(CreateGameResponse { game_id }))
}

async fn join_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<JoinGameRequest>,
) -> Result<Json<serde_json::Value>> {
    let username = authorize(&state, &headers)?;
    state
        .coordinator
        .join_game(req.game_id, req.player_color, &username)?;
    Ok(Json(serde_json::json!({})))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pumps one WebSocket. Outbound messages go through an unbounded queue
/// drained by a writer task, so hub broadcasts never wait on a slow socket.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let client = Client::new(state.hub.next_connection_id(), tx);
    info!(conn = client.id, "websocket opened");

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "failed to encode server message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(t)) => handler::handle_text(&state, &client, t.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(conn = client.id, error = %e, "websocket read failed");
                break;
            }
        }
    }

    handler::disconnect(&state, &client);
    writer.abort();
    info!(conn = client.id, "websocket closed");
}

//! Game state: one board, whose turn it is, and whether the game has ended.
//!
//! Legality is decided by playing each pseudo-legal candidate on a copy of the
//! board and rejecting the ones that leave the mover's king attacked. The
//! authoritative board is only written by [`Game::make_move`].

use crate::{
    board::Board,
    movegen::{is_attacked, pseudo_moves},
    types::*,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a move was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("the game is over")]
    GameOver,
    #[error("no piece at {0}")]
    NoPiece(Position),
    #[error("it is {0}'s turn")]
    WrongTurn(Color),
    #[error("{0} is not a legal move")]
    Illegal(Move),
    #[error("requires promotion")]
    RequiresPromotion,
}

/// Situation of one side, checked in this order so at most one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Normal,
    Check,
    Checkmate,
    Stalemate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    board: Board,
    current_turn: Color,
    is_game_over: bool,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// Standard starting position, white to move.
    pub fn new() -> Self {
        Self::with_board(Board::new(), Color::White)
    }

    pub fn with_board(board: Board, current_turn: Color) -> Self {
        Self {
            board,
            current_turn,
            is_game_over: false,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_turn(&self) -> Color {
        self.current_turn
    }

    pub fn is_game_over(&self) -> bool {
        self.is_game_over
    }

    pub fn end_game(&mut self) {
        self.is_game_over = true;
    }

    /// Legal moves for the piece on `pos`, or `None` if the square is empty.
    ///
    /// Does not consider whose turn it is.
    pub fn legal_moves(&self, pos: Position) -> Option<Vec<Move>> {
        let piece = self.board.get_piece(pos)?;
        let mut moves = pseudo_moves(&self.board, pos);
        moves.retain(|&mv| {
            let mut scratch = self.board.clone();
            apply_move(&mut scratch, mv);
            !king_attacked(&scratch, piece.color)
        });
        Some(moves)
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        king_attacked(&self.board, color)
    }

    pub fn is_in_checkmate(&self, color: Color) -> bool {
        self.is_in_check(color) && !self.has_legal_move(color)
    }

    pub fn is_in_stalemate(&self, color: Color) -> bool {
        !self.is_in_check(color) && !self.has_legal_move(color)
    }

    pub fn status(&self, color: Color) -> GameStatus {
        let in_check = self.is_in_check(color);
        let can_move = self.has_legal_move(color);
        match (in_check, can_move) {
            (true, false) => GameStatus::Checkmate,
            (true, true) => GameStatus::Check,
            (false, false) => GameStatus::Stalemate,
            (false, true) => GameStatus::Normal,
        }
    }

    fn has_legal_move(&self, color: Color) -> bool {
        self.board
            .pieces(color)
            .any(|(pos, _)| self.legal_moves(pos).is_some_and(|m| !m.is_empty()))
    }

    /// Applies `mv` for the side to move and passes the turn.
    pub fn make_move(&mut self, mv: Move) -> Result<(), MoveError> {
        if self.is_game_over {
            return Err(MoveError::GameOver);
        }
        let piece = self
            .board
            .get_piece(mv.start)
            .ok_or(MoveError::NoPiece(mv.start))?;
        if piece.color != self.current_turn {
            return Err(MoveError::WrongTurn(self.current_turn));
        }

        let legal = self.legal_moves(mv.start).unwrap_or_default();
        if !legal.iter().any(|m| m.end == mv.end) {
            return Err(MoveError::Illegal(mv));
        }
        // Destination is fine; a pawn landing on the far rank still needs a type.
        if piece.kind == PieceType::Pawn
            && mv.end.row == piece.color.promotion_rank()
            && mv.promotion.is_none()
        {
            return Err(MoveError::RequiresPromotion);
        }
        if !legal.contains(&mv) {
            return Err(MoveError::Illegal(mv));
        }

        apply_move(&mut self.board, mv);
        self.current_turn = self.current_turn.other();
        Ok(())
    }
}

fn king_attacked(board: &Board, color: Color) -> bool {
    match board.find_king(color) {
        Some(k) => is_attacked(board, k, color.other()),
        None => false,
    }
}

/// Moves the piece on `mv.start` to `mv.end`, capturing and promoting.
/// No legality checks.
fn apply_move(board: &mut Board, mv: Move) {
    let Some(moved) = board.remove_piece(mv.start) else {
        return;
    };
    let placed = match mv.promotion {
        Some(kind) => Piece::new(moved.color, kind),
        None => moved,
    };
    board.add_piece(mv.end, placed);
}

#[cfg(test)]
#[path = "game_tests.rs"]
mod game_tests;

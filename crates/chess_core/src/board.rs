use crate::types::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BACK_RANK: [PieceType; 8] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardParseError {
    #[error("expected 8 rows, found {0}")]
    RowCount(usize),
    #[error("row {row} has {len} squares, expected 8")]
    RowLength { row: usize, len: usize },
    #[error("unknown piece character '{0}'")]
    UnknownPiece(char),
}

/// An 8x8 grid of optional pieces. Cells are stored as `squares[row - 1][col - 1]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// A board in the standard starting position.
    pub fn new() -> Self {
        let mut b = Board::empty();
        b.reset_board();
        b
    }

    pub fn empty() -> Self {
        Board {
            squares: [[None; 8]; 8],
        }
    }

    fn cell(pos: Position) -> Option<(usize, usize)> {
        if pos.is_on_board() {
            Some(((pos.row - 1) as usize, (pos.col - 1) as usize))
        } else {
            None
        }
    }

    /// Places `piece` at `pos`, replacing whatever was there. Ignored off the board.
    pub fn add_piece(&mut self, pos: Position, piece: Piece) {
        if let Some((r, c)) = Self::cell(pos) {
            self.squares[r][c] = Some(piece);
        }
    }

    pub fn remove_piece(&mut self, pos: Position) -> Option<Piece> {
        let (r, c) = Self::cell(pos)?;
        self.squares[r][c].take()
    }

    /// The piece at `pos`, or `None` for an empty or off-board square.
    pub fn get_piece(&self, pos: Position) -> Option<Piece> {
        let (r, c) = Self::cell(pos)?;
        self.squares[r][c]
    }

    pub fn clear(&mut self) {
        self.squares = [[None; 8]; 8];
    }

    pub fn reset_board(&mut self) {
        self.clear();
        for color in [Color::White, Color::Black] {
            for (i, &kind) in BACK_RANK.iter().enumerate() {
                let col = i as i8 + 1;
                self.add_piece(
                    Position::new(color.back_rank(), col),
                    Piece::new(color, kind),
                );
                self.add_piece(
                    Position::new(color.pawn_rank(), col),
                    Piece::new(color, PieceType::Pawn),
                );
            }
        }
    }

    /// All occupied squares with their pieces, row 1 first.
    pub fn occupied(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        self.squares.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().filter_map(move |(c, pc)| {
                pc.map(|p| (Position::new(r as i8 + 1, c as i8 + 1), p))
            })
        })
    }

    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Position, Piece)> + '_ {
        self.occupied().filter(move |(_, p)| p.color == color)
    }

    pub fn find_king(&self, color: Color) -> Option<Position> {
        self.pieces(color)
            .find(|(_, p)| p.kind == PieceType::King)
            .map(|(pos, _)| pos)
    }

    /// Parses a text diagram: eight rows, row 8 first, `.` for an empty
    /// square, uppercase letters for white and lowercase for black.
    ///
    /// ```
    /// use chess_core::{Board, Position};
    /// let b = Board::from_diagram(
    ///     "....k...
    ///      ........
    ///      ........
    ///      ........
    ///      ........
    ///      ........
    ///      ........
    ///      ....K...",
    /// ).unwrap();
    /// assert!(b.get_piece(Position::new(8, 5)).is_some());
    /// ```
    pub fn from_diagram(text: &str) -> Result<Board, BoardParseError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if rows.len() != 8 {
            return Err(BoardParseError::RowCount(rows.len()));
        }

        let mut board = Board::empty();
        for (i, line) in rows.iter().enumerate() {
            let row = 8 - i as i8;
            let len = line.chars().count();
            if len != 8 {
                return Err(BoardParseError::RowLength {
                    row: row as usize,
                    len,
                });
            }
            for (c, ch) in line.chars().enumerate() {
                if ch == '.' {
                    continue;
                }
                let kind = PieceType::from_char(ch).ok_or(BoardParseError::UnknownPiece(ch))?;
                let color = if ch.is_ascii_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                board.add_piece(Position::new(row, c as i8 + 1), Piece::new(color, kind));
            }
        }
        Ok(board)
    }

    /// Inverse of [`Board::from_diagram`].
    pub fn to_diagram(&self) -> String {
        let mut out = String::with_capacity(72);
        for row in (1..=8).rev() {
            for col in 1..=8 {
                let ch = self
                    .get_piece(Position::new(row, col))
                    .map(Piece::to_char)
                    .unwrap_or('.');
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod board_tests;

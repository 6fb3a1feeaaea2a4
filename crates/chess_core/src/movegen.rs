//! Pseudo-legal move generation.
//!
//! Each piece type has one generator function; [`pseudo_moves_into`] picks the
//! generator through a table indexed by [`PieceType::idx`]. Generated moves
//! respect movement patterns and blocking but ignore whether the mover's own
//! king is left in check. That filtering lives in [`crate::game`].

use crate::{board::Board, types::*};

type Generator = fn(&Board, Position, Color, &mut Vec<Move>);

/// Indexed by [`PieceType::idx`].
const GENERATORS: [Generator; 6] = [
    gen_king, gen_queen, gen_bishop, gen_knight, gen_rook, gen_pawn,
];

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (-1, 2),
    (-2, 1),
    (1, -2),
    (2, -1),
    (-1, -2),
    (-2, -1),
];

/// Pseudo-legal moves for the piece on `from`. Empty if the square is empty.
pub fn pseudo_moves(board: &Board, from: Position) -> Vec<Move> {
    let mut out = Vec::with_capacity(32);
    pseudo_moves_into(board, from, &mut out);
    out
}

/// Appends the pseudo-legal moves for the piece on `from` to `out`.
pub fn pseudo_moves_into(board: &Board, from: Position, out: &mut Vec<Move>) {
    if let Some(pc) = board.get_piece(from) {
        GENERATORS[pc.kind.idx()](board, from, pc.color, out);
    }
}

/// True if some piece of color `by` has a pseudo-legal move ending on `target`.
pub fn is_attacked(board: &Board, target: Position, by: Color) -> bool {
    let mut buf = Vec::with_capacity(32);
    for (from, _) in board.pieces(by) {
        buf.clear();
        pseudo_moves_into(board, from, &mut buf);
        if buf.iter().any(|mv| mv.end == target) {
            return true;
        }
    }
    false
}

/// Pushes `from -> to` if `to` is on the board and not held by a friendly
/// piece. Returns whether the square was empty.
fn push_step(board: &Board, from: Position, to: Position, c: Color, out: &mut Vec<Move>) -> bool {
    if !to.is_on_board() {
        return false;
    }
    match board.get_piece(to) {
        None => {
            out.push(Move::new(from, to));
            true
        }
        Some(pc) => {
            if pc.color != c {
                out.push(Move::new(from, to));
            }
            false
        }
    }
}

fn gen_slider(board: &Board, from: Position, c: Color, out: &mut Vec<Move>, dirs: &[(i8, i8)]) {
    for &(dr, dc) in dirs {
        let mut to = from.offset(dr, dc);
        while push_step(board, from, to, c, out) {
            to = to.offset(dr, dc);
        }
    }
}

fn gen_steps(board: &Board, from: Position, c: Color, out: &mut Vec<Move>, deltas: &[(i8, i8)]) {
    for &(dr, dc) in deltas {
        push_step(board, from, from.offset(dr, dc), c, out);
    }
}

fn gen_king(board: &Board, from: Position, c: Color, out: &mut Vec<Move>) {
    gen_steps(board, from, c, out, &DIAGONALS);
    gen_steps(board, from, c, out, &ORTHOGONALS);
}

fn gen_queen(board: &Board, from: Position, c: Color, out: &mut Vec<Move>) {
    gen_slider(board, from, c, out, &DIAGONALS);
    gen_slider(board, from, c, out, &ORTHOGONALS);
}

fn gen_bishop(board: &Board, from: Position, c: Color, out: &mut Vec<Move>) {
    gen_slider(board, from, c, out, &DIAGONALS);
}

fn gen_rook(board: &Board, from: Position, c: Color, out: &mut Vec<Move>) {
    gen_slider(board, from, c, out, &ORTHOGONALS);
}

fn gen_knight(board: &Board, from: Position, c: Color, out: &mut Vec<Move>) {
    gen_steps(board, from, c, out, &KNIGHT_JUMPS);
}

fn push_pawn_move(from: Position, to: Position, c: Color, out: &mut Vec<Move>) {
    if to.row == c.promotion_rank() {
        for pk in PieceType::PROMOTIONS {
            out.push(Move::promoting(from, to, pk));
        }
    } else {
        out.push(Move::new(from, to));
    }
}

fn gen_pawn(board: &Board, from: Position, c: Color, out: &mut Vec<Move>) {
    let dir = c.forward();

    // forward 1, then forward 2 from the starting row
    let one = from.offset(dir, 0);
    if one.is_on_board() && board.get_piece(one).is_none() {
        push_pawn_move(from, one, c, out);

        let two = from.offset(2 * dir, 0);
        if from.row == c.pawn_rank() && board.get_piece(two).is_none() {
            out.push(Move::new(from, two));
        }
    }

    for dc in [-1, 1] {
        let to = from.offset(dir, dc);
        if let Some(tpc) = board.get_piece(to)
            && tpc.color != c
        {
            push_pawn_move(from, to, c, out);
        }
    }
}

#[cfg(test)]
#[path = "movegen_tests.rs"]
mod movegen_tests;

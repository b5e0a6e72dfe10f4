//! 評価関数
//!
//! 駒の価値とPSTによる対称な局面評価。ゲームフェーズ（序盤/中盤/終盤）で
//! キングテーブルを切り替える。スコアは手番側から見た値を返す。

mod pst;

use crate::position::Position;
use crate::types::{Color, PieceType, Square, Value};

use pst::{
    BISHOP_PST, KING_PST_ENDGAME, KING_PST_MIDGAME, KNIGHT_PST, PAWN_PST, QUEEN_PST, ROOK_PST,
};

/// ゲームフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Opening,
    Middlegame,
    Endgame,
}

/// フェーズ重みの最大値（ナイト1+ビショップ1+ルーク2+クイーン4の両軍分）
const MAX_PHASE_SCORE: i32 = 24;

/// 駒の価値
#[inline]
pub const fn piece_value(pt: PieceType) -> i32 {
    match pt {
        PieceType::Pawn => 100,
        PieceType::Knight => 320,
        PieceType::Bishop => 330,
        PieceType::Rook => 500,
        PieceType::Queen => 900,
        PieceType::King => 20000,
    }
}

/// フェーズ重み（ポーン・キング以外）
#[inline]
const fn phase_weight(pt: PieceType) -> i32 {
    match pt {
        PieceType::Knight | PieceType::Bishop => 1,
        PieceType::Rook => 2,
        PieceType::Queen => 4,
        PieceType::Pawn | PieceType::King => 0,
    }
}

/// 残存駒からゲームフェーズを判定する
pub fn game_phase(pos: &Position) -> Phase {
    let mut score = 0;
    for color in [Color::White, Color::Black] {
        for pt in PieceType::ALL {
            score += phase_weight(pt) * pos.pieces_of(color, pt).count() as i32;
        }
    }
    if score > MAX_PHASE_SCORE * 2 / 3 {
        Phase::Opening
    } else if score > MAX_PHASE_SCORE / 3 {
        Phase::Middlegame
    } else {
        Phase::Endgame
    }
}

/// PSTの値（色に応じてランクを反転）
#[inline]
fn pst_value(color: Color, pt: PieceType, sq: Square, phase: Phase) -> i32 {
    // テーブルは表示と同じ向き（先頭行が8段目）なので、
    // 白はランク反転したインデックスで引く
    let idx = match color {
        Color::White => sq.flip_rank().index(),
        Color::Black => sq.index(),
    };
    match pt {
        PieceType::Pawn => PAWN_PST[idx],
        PieceType::Knight => KNIGHT_PST[idx],
        PieceType::Bishop => BISHOP_PST[idx],
        PieceType::Rook => ROOK_PST[idx],
        PieceType::Queen => QUEEN_PST[idx],
        PieceType::King => match phase {
            Phase::Endgame => KING_PST_ENDGAME[idx],
            _ => KING_PST_MIDGAME[idx],
        },
    }
}

/// 局面を評価する（手番側から見たスコア）
pub fn evaluate(pos: &Position) -> Value {
    let phase = game_phase(pos);
    let mut score = 0i32;

    for sq in pos.occupied().iter() {
        let piece = pos.piece_on(sq);
        let Some(pt) = piece.piece_type() else { continue };
        let value = piece_value(pt) + pst_value(piece.color(), pt, sq, phase);
        if piece.color() == Color::White {
            score += value;
        } else {
            score -= value;
        }
    }

    if pos.side_to_move() == Color::White {
        Value::new(score)
    } else {
        Value::new(-score)
    }
}

//! 手の順序付け
//!
//! MVV-LVA・プロモーションボーナス・キラー手・historyで
//! 各手を採点し、降順に安定ソートする。置換表の手は探索側が
//! ソートの外で先に試す。

use crate::eval::piece_value;
use crate::movegen::MoveList;
use crate::position::Position;
use crate::types::{Move, PieceType};

use super::history::{HistoryTable, KillerTable};

/// キラー手（スロット0）のボーナス
const KILLER_FIRST_BONUS: i32 = 100_000;
/// キラー手（スロット1）のボーナス
const KILLER_SECOND_BONUS: i32 = 80_000;

/// プロモーションのボーナス
#[inline]
const fn promotion_bonus(pt: PieceType) -> i32 {
    match pt {
        PieceType::Queen => 900,
        PieceType::Rook => 500,
        PieceType::Bishop => 300,
        // ナイトプロモーションはフォークを生みやすい
        PieceType::Knight => 350,
        _ => 0,
    }
}

/// 駒取りかどうか（アンパッサン含む）
#[inline]
pub fn is_capture(pos: &Position, mv: Move) -> bool {
    if pos.piece_on(mv.to()).is_some() {
        return true;
    }
    let piece = pos.piece_on(mv.from());
    piece.is(pos.side_to_move(), PieceType::Pawn) && pos.ep_target() == Some(mv.to())
}

/// 1手を採点する
fn score_move(
    pos: &Position,
    killers: &KillerTable,
    history: &HistoryTable,
    ply: usize,
    mv: Move,
) -> i32 {
    let mut score = 0;

    if let Some(promo) = mv.promotion() {
        score += promotion_bonus(promo);
    }

    let attacker = pos.piece_on(mv.from());
    let mut victim = pos.piece_on(mv.to());

    // アンパッサンはポーンを取る手として扱う
    if victim.is_none()
        && attacker.is(pos.side_to_move(), PieceType::Pawn)
        && pos.ep_target() == Some(mv.to())
    {
        victim = crate::types::Piece::new(!pos.side_to_move(), PieceType::Pawn);
    }

    if let (Some(victim_pt), Some(attacker_pt)) = (victim.piece_type(), attacker.piece_type()) {
        // MVV-LVA: 価値の高い駒を安い駒で取る手を先に
        score += 100 + 10 * piece_value(victim_pt) - piece_value(attacker_pt);
    }

    if mv == killers.first(ply) {
        score += KILLER_FIRST_BONUS;
    } else if mv == killers.second(ply) {
        score += KILLER_SECOND_BONUS;
    }

    // 静かな手はhistoryで補正
    if victim.is_none() {
        score += history.get(mv);
    }

    score
}

/// 指し手リストを降順に安定ソートする
pub fn order_moves(
    pos: &Position,
    moves: &mut MoveList,
    killers: &KillerTable,
    history: &HistoryTable,
    ply: usize,
) {
    let slice = moves.as_mut_slice();
    slice.sort_by_key(|&mv| -score_move(pos, killers, history, ply, mv));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_from(fen: &str) -> Position {
        let mut pos = Position::new();
        pos.set_fen(fen).unwrap();
        pos
    }

    fn mv(s: &str) -> Move {
        Move::from_uci(s).unwrap()
    }

    #[test]
    fn test_captures_ordered_by_victim_value() {
        // ポーンでクイーンとルークを取れる局面
        let pos = pos_from("4k3/8/8/2q1r3/3P4/8/8/4K3 w - - 0 1");
        let mut moves = pos.generate_legal_moves();
        let killers = KillerTable::new();
        let history = HistoryTable::new();
        order_moves(&pos, &mut moves, &killers, &history, 0);

        // クイーン取りが先、ルーク取りが次
        assert_eq!(moves.at(0), mv("d4c5"));
        assert_eq!(moves.at(1), mv("d4e5"));
    }

    #[test]
    fn test_mvv_lva_prefers_cheap_attacker() {
        // ルークとポーンの両方でクイーンを取れる
        let pos = pos_from("4k3/8/8/3q4/4P3/8/8/3RK3 w - - 0 1");
        let mut moves = pos.generate_legal_moves();
        let killers = KillerTable::new();
        let history = HistoryTable::new();
        order_moves(&pos, &mut moves, &killers, &history, 0);

        // 同じクイーン取りでもポーンが先
        assert_eq!(moves.at(0), mv("e4d5"));
        assert_eq!(moves.at(1), mv("d1d5"));
    }

    #[test]
    fn test_killer_beats_quiet_history() {
        let pos = pos_from("4k3/8/8/8/8/8/8/4K2R w - - 0 1");
        let mut moves = pos.generate_legal_moves();
        let mut killers = KillerTable::new();
        let mut history = HistoryTable::new();

        history.bump(mv("h1h4"), 10); // history 100
        killers.insert(0, mv("h1h2"));

        order_moves(&pos, &mut moves, &killers, &history, 0);
        assert_eq!(moves.at(0), mv("h1h2"), "killer should be first");
    }

    #[test]
    fn test_promotion_bonus_ordering() {
        let pos = pos_from("8/P3k3/8/8/8/8/4K3/8 w - - 0 1");
        let mut moves = pos.generate_legal_moves();
        let killers = KillerTable::new();
        let history = HistoryTable::new();
        order_moves(&pos, &mut moves, &killers, &history, 0);

        // クイーンプロモーションが最初
        assert_eq!(moves.at(0), mv("a7a8q"));
    }

    #[test]
    fn test_en_passant_scored_as_pawn_capture() {
        let mut pos = pos_from("4k3/8/8/8/2p5/8/3P4/4K3 w - - 0 1");
        pos.do_move(mv("d2d4"));
        assert_eq!(pos.ep_target(), Some(crate::types::Square::from_uci("d3").unwrap()));

        assert!(is_capture(&pos, mv("c4d3")));
        assert!(!is_capture(&pos, mv("c4c3")));

        let killers = KillerTable::new();
        let history = HistoryTable::new();
        let mut moves = pos.generate_legal_moves();
        order_moves(&pos, &mut moves, &killers, &history, 0);
        // アンパッサンが静かな手より先に来る
        assert_eq!(moves.at(0), mv("c4d3"));
    }
}

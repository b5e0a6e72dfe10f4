//! 指し手生成
//!
//! bitboardから疑似合法手を生成し、ピン・王手解析で合法手に絞る。
//! push/popで試す方式ではなく、王手駒の数（0/1/2+）で分岐して
//! 到達可能マスクを判定する。

use crate::bitboard::{
    between_bb, bishop_attacks, king_attacks, knight_attacks, line_bb, pawn_attacks,
    queen_attacks, rook_attacks, Bitboard,
};
use crate::position::Position;
use crate::types::{CastlingRights, Color, Move, PieceType, Rank, Square};

use super::movelist::MoveList;

/// 合法手を全て生成する
pub fn generate_legal(pos: &Position, list: &mut MoveList) {
    let mut pseudo = MoveList::new();
    generate_pseudo_legal(pos, &mut pseudo, false);
    filter_legal(pos, &pseudo, list);
}

/// 合法な駒取り（アンパッサン含む）だけを生成する
pub fn generate_legal_captures(pos: &Position, list: &mut MoveList) {
    let mut pseudo = MoveList::new();
    generate_pseudo_legal(pos, &mut pseudo, true);
    filter_legal(pos, &pseudo, list);
}

// =============================================================================
// 疑似合法手生成
// =============================================================================

fn generate_pseudo_legal(pos: &Position, list: &mut MoveList, captures_only: bool) {
    let us = pos.side_to_move();
    let them = !us;
    let occ = pos.occupied();
    let own = pos.color_pieces(us);
    let enemy = pos.color_pieces(them);

    // ポーン
    for from in pos.pieces_of(us, PieceType::Pawn).iter() {
        // 前進（1升、初期ランクから2升）
        if !captures_only {
            if let Some(one) = from.forward(us) {
                if !occ.contains(one) {
                    push_pawn_move(list, us, from, one);
                    if from.rank() == Rank::pawn_start(us) {
                        if let Some(two) = one.forward(us) {
                            if !occ.contains(two) {
                                list.push(Move::new(from, two));
                            }
                        }
                    }
                }
            }
        }

        // 斜め取り
        let attacks = pawn_attacks(us, from);
        for to in (attacks & enemy).iter() {
            push_pawn_move(list, us, from, to);
        }

        // アンパッサン
        if let Some(ep) = pos.ep_target() {
            if attacks.contains(ep) {
                list.push(Move::new(from, ep));
            }
        }
    }

    let targets = if captures_only { enemy } else { !own };

    // ナイト
    for from in pos.pieces_of(us, PieceType::Knight).iter() {
        for to in (knight_attacks(from) & targets).iter() {
            list.push(Move::new(from, to));
        }
    }

    // ビショップ・ルーク・クイーン（magic bitboard）
    for from in pos.pieces_of(us, PieceType::Bishop).iter() {
        for to in (bishop_attacks(from, occ) & targets).iter() {
            list.push(Move::new(from, to));
        }
    }
    for from in pos.pieces_of(us, PieceType::Rook).iter() {
        for to in (rook_attacks(from, occ) & targets).iter() {
            list.push(Move::new(from, to));
        }
    }
    for from in pos.pieces_of(us, PieceType::Queen).iter() {
        for to in (queen_attacks(from, occ) & targets).iter() {
            list.push(Move::new(from, to));
        }
    }

    // キング
    let king = pos.king_square(us);
    for to in (king_attacks(king) & targets).iter() {
        list.push(Move::new(king, to));
    }

    // キャスリング
    if !captures_only {
        generate_castling(pos, us, list);
    }
}

/// ポーンの手を追加（最終ランクなら4種のプロモーションに展開）
#[inline]
fn push_pawn_move(list: &mut MoveList, us: Color, from: Square, to: Square) {
    if to.rank() == Rank::promotion(us) {
        for promo in PieceType::PROMOTIONS {
            list.push(Move::new_promotion(from, to, promo));
        }
    } else {
        list.push(Move::new(from, to));
    }
}

/// キャスリングの生成
///
/// 権利があり、間の升が空で、キングの出発・通過・到着升が
/// 攻撃されていない場合のみ。王手回避にならないこともここで保証される。
fn generate_castling(pos: &Position, us: Color, list: &mut MoveList) {
    let them = !us;
    let empty_ok = |squares: &[Square]| squares.iter().all(|&sq| pos.piece_on(sq).is_none());
    let safe_ok = |squares: &[Square]| squares.iter().all(|&sq| !pos.is_square_attacked(sq, them));

    match us {
        Color::White => {
            if pos.castling().has(CastlingRights::WHITE_KING)
                && empty_ok(&[Square::F1, Square::G1])
                && safe_ok(&[Square::E1, Square::F1, Square::G1])
            {
                list.push(Move::new(Square::E1, Square::G1));
            }
            if pos.castling().has(CastlingRights::WHITE_QUEEN)
                && empty_ok(&[Square::D1, Square::C1, Square::B1])
                && safe_ok(&[Square::E1, Square::D1, Square::C1])
            {
                list.push(Move::new(Square::E1, Square::C1));
            }
        }
        Color::Black => {
            if pos.castling().has(CastlingRights::BLACK_KING)
                && empty_ok(&[Square::F8, Square::G8])
                && safe_ok(&[Square::E8, Square::F8, Square::G8])
            {
                list.push(Move::new(Square::E8, Square::G8));
            }
            if pos.castling().has(CastlingRights::BLACK_QUEEN)
                && empty_ok(&[Square::D8, Square::C8, Square::B8])
                && safe_ok(&[Square::E8, Square::D8, Square::C8])
            {
                list.push(Move::new(Square::E8, Square::C8));
            }
        }
    }
}

// =============================================================================
// 合法性フィルタ（ピン・王手解析）
// =============================================================================

fn filter_legal(pos: &Position, pseudo: &MoveList, list: &mut MoveList) {
    let us = pos.side_to_move();
    let king = pos.king_square(us);
    let checkers = pos.checkers();
    let pinned = pinned_pieces(pos, us);

    for &mv in pseudo.iter() {
        if is_move_legal(pos, us, king, checkers, pinned, mv) {
            list.push(mv);
        }
    }
}

/// ピンされている自駒の集合
///
/// キングと敵スライダーの間に自駒がちょうど1枚ある場合、その駒はピン。
fn pinned_pieces(pos: &Position, us: Color) -> Bitboard {
    let king = pos.king_square(us);
    let them = !us;
    let occ = pos.occupied();

    let rooks_queens = pos.pieces_of(them, PieceType::Rook) | pos.pieces_of(them, PieceType::Queen);
    let bishops_queens =
        pos.pieces_of(them, PieceType::Bishop) | pos.pieces_of(them, PieceType::Queen);

    // ブロッカーを無視してキングと直線上にあるスライダー
    let snipers = (rook_attacks(king, Bitboard::EMPTY) & rooks_queens)
        | (bishop_attacks(king, Bitboard::EMPTY) & bishops_queens);

    let mut pinned = Bitboard::EMPTY;
    for sniper in snipers.iter() {
        let blockers = between_bb(king, sniper) & occ;
        if !blockers.more_than_one() && (blockers & pos.color_pieces(us)).is_not_empty() {
            pinned |= blockers;
        }
    }
    pinned
}

fn is_move_legal(
    pos: &Position,
    us: Color,
    king: Square,
    checkers: Bitboard,
    pinned: Bitboard,
    mv: Move,
) -> bool {
    let from = mv.from();
    let to = mv.to();
    let piece = pos.piece_on(from);
    let them = !us;

    // アンパッサンは両ポーンを外した占有でシミュレーション
    // （5段目の貫通王手を検出する）
    if piece.is(us, PieceType::Pawn) && pos.ep_target() == Some(to) && from.file() != to.file() {
        return ep_legal(pos, us, king, from, to);
    }

    if piece.is(us, PieceType::King) {
        let diff = to.raw() as i16 - from.raw() as i16;
        if diff == 2 || diff == -2 {
            // キャスリング: 通過升の安全は生成時に検証済み。王手中は不可。
            return checkers.is_empty();
        }
        // キングの移動: fromを除いた占有で到達先の利きを確認する
        let occ = pos.occupied() ^ Bitboard::from_square(from);
        return !pos.is_square_attacked_with_occ(to, them, occ);
    }

    // ピンされた駒はピン直線上しか動けない
    let pin_ok = !pinned.contains(from) || line_bb(king, from).contains(to);

    if checkers.is_empty() {
        pin_ok
    } else if !checkers.more_than_one() {
        // 単独王手: 王手駒を取るか、間に合い駒する
        let checker = checkers.lsb_unchecked();
        let mask = checkers | between_bb(king, checker);
        pin_ok && mask.contains(to)
    } else {
        // 両王手はキングの移動のみ
        false
    }
}

/// アンパッサンの合法性（取った後の局面で王手がないか）
fn ep_legal(pos: &Position, us: Color, king: Square, from: Square, to: Square) -> bool {
    let them = !us;
    // SAFETY: epターゲットの1升後ろは必ず盤内
    let cap_sq = unsafe { Square::from_u8_unchecked((to.raw() as i8 - us.forward()) as u8) };

    let mut occ = pos.occupied();
    occ.clear(from);
    occ.clear(cap_sq);
    occ.set(to);

    let rooks_queens = pos.pieces_of(them, PieceType::Rook) | pos.pieces_of(them, PieceType::Queen);
    let bishops_queens =
        pos.pieces_of(them, PieceType::Bishop) | pos.pieces_of(them, PieceType::Queen);

    if (rook_attacks(king, occ) & rooks_queens).is_not_empty() {
        return false;
    }
    if (bishop_attacks(king, occ) & bishops_queens).is_not_empty() {
        return false;
    }
    if (knight_attacks(king) & pos.pieces_of(them, PieceType::Knight)).is_not_empty() {
        return false;
    }
    let enemy_pawns = pos.pieces_of(them, PieceType::Pawn) & !Bitboard::from_square(cap_sq);
    if (pawn_attacks(us, king) & enemy_pawns).is_not_empty() {
        return false;
    }
    (king_attacks(king) & pos.pieces_of(them, PieceType::King)).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_from(fen: &str) -> Position {
        let mut pos = Position::new();
        pos.set_fen(fen).unwrap();
        pos
    }

    fn uci_set(list: &MoveList) -> Vec<String> {
        list.iter().map(|m| m.to_uci()).collect()
    }

    #[test]
    fn test_startpos_20_moves() {
        let mut pos = Position::new();
        pos.set_startpos();
        assert_eq!(pos.generate_legal_moves().len(), 20);
    }

    #[test]
    fn test_legal_equals_push_test_pop() {
        // 合法手 = 疑似合法手のうちpush後に自キングが取られないもの
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/pppp1ppp/8/4p3/8/5N2/PPPPPPPP/RNBQKB1R w KQkq e6 0 2",
            "4k3/8/8/8/8/8/4r3/4K3 w - - 0 1",
        ];
        for fen in fens {
            let mut pos = pos_from(fen);
            let mut pseudo = MoveList::new();
            generate_pseudo_legal(&pos, &mut pseudo, false);

            let mut expected: Vec<Move> = Vec::new();
            let us = pos.side_to_move();
            for &mv in pseudo.iter() {
                pos.do_move(mv);
                let king = pos.king_square(us);
                if !pos.is_square_attacked(king, !us) {
                    expected.push(mv);
                }
                pos.undo_move();
            }

            let legal = pos.generate_legal_moves();
            let mut got: Vec<Move> = legal.iter().copied().collect();
            got.sort_by_key(|m| m.from_to());
            expected.sort_by_key(|m| m.from_to());
            assert_eq!(got, expected, "mismatch for {fen}");
        }
    }

    #[test]
    fn test_pinned_piece_moves() {
        // e2のルークはe8のルークにピンされている: e列の前後移動のみ
        let pos = pos_from("4r1k1/8/8/8/8/8/4R3/4K3 w - - 0 1");
        let legal = pos.generate_legal_moves();
        for mv in legal.iter() {
            if mv.from() == Square::from_uci("e2").unwrap() {
                assert_eq!(mv.to().file().index(), 4, "pinned rook left the file: {mv}");
            }
        }
        // ピンされていてもe列上は動ける
        assert!(legal.contains(Move::from_uci("e2e5").unwrap()));
        assert!(legal.contains(Move::from_uci("e2e8").unwrap()));
    }

    #[test]
    fn test_check_evasion_only() {
        // ルークの王手: 取る・合い駒・キング移動のみ
        let pos = pos_from("4k3/8/8/8/4r3/8/3N4/4KB2 w - - 0 1");
        let legal = pos.generate_legal_moves();
        let moves = uci_set(&legal);
        for m in &moves {
            let ok = m.starts_with("e1")            // キング移動
                || m == "d2e4"                       // ナイトで取る
                || m == "f1e2"                       // ビショップの合い駒
                || m == "d2f3";                      // ナイトの合い駒
            assert!(ok, "unexpected evasion {m}");
        }
        assert!(moves.contains(&"d2e4".to_string()));
        assert!(moves.contains(&"f1e2".to_string()));
        // キングはe2（王手筋）には行けない
        assert!(!moves.contains(&"e1e2".to_string()));
    }

    #[test]
    fn test_double_check_king_only() {
        // ナイトとルークの両王手
        let pos = pos_from("4k3/8/8/8/4r3/5n2/8/4K2R w K - 0 1");
        assert_eq!(pos.checkers().count(), 2);
        let legal = pos.generate_legal_moves();
        for mv in legal.iter() {
            assert_eq!(mv.from(), Square::E1, "only king moves allowed: {mv}");
        }
        // 両王手中はキャスリング不可
        assert!(!legal.contains(Move::from_uci("e1g1").unwrap()));
    }

    #[test]
    fn test_king_cannot_step_along_check_ray() {
        // ルークの王手筋に沿って逃げるのは違法（fromを除いた占有で検査）
        let pos = pos_from("4k3/8/8/8/8/8/8/r3K3 w - - 0 1");
        let legal = pos.generate_legal_moves();
        let moves = uci_set(&legal);
        assert!(!moves.contains(&"e1f1".to_string()), "f1 is still on the rook ray");
        assert!(moves.contains(&"e1e2".to_string()));
    }

    #[test]
    fn test_en_passant_discovered_check() {
        // 5段目の貫通王手: b5とc5の両ポーンが消えるとh5ルークがa5キングに通る
        let mut pos = pos_from("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 b - - 0 1");
        pos.do_move(Move::from_uci("c7c5").unwrap());
        assert_eq!(pos.ep_target(), Some(Square::from_uci("c6").unwrap()));
        let legal = pos.generate_legal_moves();
        assert!(
            !legal.contains(Move::from_uci("b5c6").unwrap()),
            "ep capture must be rejected: it uncovers the h5 rook"
        );
    }

    #[test]
    fn test_en_passant_pinned_horizontally() {
        // キングとルークが5段目に並ぶ: epで両ポーンが消えると王手が開く
        let pos = pos_from("8/8/8/K2pP2r/8/8/8/4k3 w - d6 0 1");
        let legal = pos.generate_legal_moves();
        assert!(
            !legal.contains(Move::from_uci("e5d6").unwrap()),
            "ep would expose the king on the 5th rank"
        );
    }

    #[test]
    fn test_en_passant_capture_of_checker() {
        // 王手している直後の2升突きポーンをepで取るのは合法
        let pos = pos_from("8/8/8/2k5/3Pp3/8/8/4K3 b - d3 0 1");
        // 黒キングc5、白ポーンd4が王手、ep対象
        assert!(pos.in_check());
        let legal = pos.generate_legal_moves();
        assert!(legal.contains(Move::from_uci("e4d3").unwrap()));
    }

    #[test]
    fn test_castling_through_attack_forbidden() {
        // f1が攻撃されているとキングサイド不可
        let pos = pos_from("5r1k/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        let legal = pos.generate_legal_moves();
        assert!(!legal.contains(Move::from_uci("e1g1").unwrap()));
        // クイーンサイドは可能
        assert!(legal.contains(Move::from_uci("e1c1").unwrap()));
    }

    #[test]
    fn test_castling_queenside_b1_attacked_allowed() {
        // b1への攻撃はクイーンサイドを妨げない（キングが通らない）
        let pos = pos_from("1r5k/8/8/8/8/8/8/R3K3 w Q - 0 1");
        let legal = pos.generate_legal_moves();
        assert!(legal.contains(Move::from_uci("e1c1").unwrap()));
    }

    #[test]
    fn test_castling_blocked_by_piece() {
        let pos = pos_from("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/RN2K2R w KQkq - 0 1");
        let legal = pos.generate_legal_moves();
        // b1ナイトがクイーンサイドを塞ぐ
        assert!(!legal.contains(Move::from_uci("e1c1").unwrap()));
        assert!(legal.contains(Move::from_uci("e1g1").unwrap()));
    }

    #[test]
    fn test_promotion_moves_generated() {
        let pos = pos_from("8/P6k/8/8/8/8/8/K7 w - - 0 1");
        let legal = pos.generate_legal_moves();
        let moves = uci_set(&legal);
        for m in ["a7a8q", "a7a8r", "a7a8b", "a7a8n"] {
            assert!(moves.contains(&m.to_string()), "missing {m}");
        }
    }

    #[test]
    fn test_captures_only_generation() {
        let pos = pos_from("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1");
        let captures = pos.generate_legal_captures();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures.at(0).to_uci(), "e4d5");

        // 全合法手には前進も含まれる
        let all = pos.generate_legal_moves();
        assert!(all.len() > 1);
    }

    #[test]
    fn test_attacks_agree_with_pseudo_legal_targets() {
        // ポーンなし・キャスリング権なしの局面では、
        // 「色cがsに利いている」⇔「色cの疑似合法手でsに行ける」
        // （自駒のいる升は移動先にならないため除く）
        let layouts = [
            "4k3/2r5/8/3B4/8/1N6/4Q3/4K3",
            "2k5/8/8/8/3n4/8/2b5/R3K3",
        ];
        for layout in layouts {
            for stm in ["w", "b"] {
                let pos = pos_from(&format!("{layout} {stm} - - 0 1"));
                let us = pos.side_to_move();

                let mut pseudo = MoveList::new();
                generate_pseudo_legal(&pos, &mut pseudo, false);
                let mut reachable = crate::bitboard::Bitboard::EMPTY;
                for &mv in pseudo.iter() {
                    reachable.set(mv.to());
                }

                for sq in Square::all() {
                    if pos.piece_on(sq).is_color(us) {
                        continue;
                    }
                    assert_eq!(
                        pos.is_square_attacked(sq, us),
                        reachable.contains(sq),
                        "square {} side {stm} in {layout}",
                        sq.to_uci()
                    );
                }
            }
        }
    }

    #[test]
    fn test_filter_accepts_all_generated_moves() {
        // 生成された合法手は全てフィルタを再度通る
        let pos = pos_from("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let legal = pos.generate_legal_moves();
        let us = pos.side_to_move();
        let king = pos.king_square(us);
        let checkers = pos.checkers();
        let pinned = pinned_pieces(&pos, us);
        for &mv in legal.iter() {
            assert!(is_move_legal(&pos, us, king, checkers, pinned, mv), "{mv} should be legal");
        }
    }
}

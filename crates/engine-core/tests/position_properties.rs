//! 局面の可逆性とZobristハッシュの性質テスト
//!
//! 決定的な疑似乱数で手を選んだゲーム木を歩き、
//! - push列 + 逆順pop列で局面がバイト単位で元に戻ること
//! - 差分更新のハッシュが常に全計算と一致すること
//! を確認する。

use engine_core::movegen::perft_divide;
use engine_core::position::Position;
use engine_core::types::Move;

/// xorshift64（テストの再現性のため固定シード）
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[test]
fn random_walk_push_pop_roundtrip() {
    let mut rng = Rng(0x9E3779B97F4A7C15);

    for game in 0..20 {
        let mut pos = Position::new();
        pos.set_startpos();
        let initial_fen = pos.fen();
        let initial_key = pos.key();

        let mut played = 0;
        for _ in 0..60 {
            let moves = pos.generate_legal_moves();
            if moves.is_empty() {
                break;
            }
            let mv = moves.at((rng.next() % moves.len() as u64) as usize);
            pos.do_move(mv);
            played += 1;

            // 差分ハッシュは常に全計算と一致する
            assert_eq!(pos.key(), pos.compute_key(), "game {game} after {played} moves");
            pos.assert_consistent();
        }

        for _ in 0..played {
            pos.undo_move();
        }

        assert_eq!(pos.fen(), initial_fen, "game {game}");
        assert_eq!(pos.key(), initial_key, "game {game}");
        pos.assert_consistent();
    }
}

#[test]
fn zobrist_detects_transpositions() {
    // 手順前後で同じ局面は同じハッシュになる
    let mut a = Position::new();
    a.set_startpos();
    for m in ["g1f3", "g8f6", "b1c3", "b8c6"] {
        a.do_move(Move::from_uci(m).unwrap());
    }

    let mut b = Position::new();
    b.set_startpos();
    for m in ["b1c3", "b8c6", "g1f3", "g8f6"] {
        b.do_move(Move::from_uci(m).unwrap());
    }

    assert_eq!(a.key(), b.key());
    assert_eq!(a.fen(), b.fen());
}

#[test]
fn zobrist_differs_by_en_passant_and_castling() {
    // アンパッサン升の有無でハッシュが変わる
    let mut with_ep = Position::new();
    with_ep.set_fen("rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 2").unwrap();
    let mut without_ep = Position::new();
    without_ep.set_fen("rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 2").unwrap();
    assert_ne!(with_ep.key(), without_ep.key());

    // キャスリング権の違いでもハッシュが変わる
    let mut all_rights = Position::new();
    all_rights.set_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let mut no_rights = Position::new();
    no_rights.set_fen("r3k2r/8/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
    assert_ne!(all_rights.key(), no_rights.key());
}

#[test]
fn perft_divide_matches_manual_expansion() {
    // divideの各内訳は1手進めた局面のperftと一致する
    let mut pos = Position::new();
    pos.set_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
        .unwrap();

    let divide = perft_divide(&mut pos, 2);
    for (uci, nodes) in divide {
        let mut child = pos.clone();
        child.apply_uci_move(&uci).unwrap();
        assert_eq!(engine_core::movegen::perft(&mut child, 1), nodes, "move {uci}");
    }
}

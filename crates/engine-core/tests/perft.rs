//! perftによる指し手生成の正当性検証
//!
//! キャスリング・アンパッサン・プロモーション・2升前進・貫通王手・
//! ピンを同時に検査する標準局面集。数値は既知の正解値。

use engine_core::movegen::perft;
use engine_core::position::Position;

fn perft_from(fen: &str, depth: u32) -> u64 {
    let mut pos = Position::new();
    pos.set_fen(fen).unwrap();
    perft(&mut pos, depth)
}

#[test]
fn perft_startpos_depth1() {
    let mut pos = Position::new();
    pos.set_startpos();
    assert_eq!(perft(&mut pos, 1), 20);
}

#[test]
fn perft_startpos_depth4() {
    let mut pos = Position::new();
    pos.set_startpos();
    assert_eq!(perft(&mut pos, 4), 197_281);
}

#[test]
fn perft_startpos_depth5() {
    let mut pos = Position::new();
    pos.set_startpos();
    assert_eq!(perft(&mut pos, 5), 4_865_609);
}

#[test]
fn perft_kiwipete_depth3() {
    assert_eq!(
        perft_from("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1", 3),
        97_862
    );
}

#[test]
fn perft_position3_depth4() {
    // アンパッサンの貫通王手を含む局面
    assert_eq!(perft_from("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 4), 43_238);
}

#[test]
fn perft_position4_depth4() {
    // プロモーションとピンの絡む局面
    assert_eq!(
        perft_from("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1", 4),
        422_333
    );
}

#[test]
fn perft_preserves_position() {
    let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    let mut pos = Position::new();
    pos.set_fen(fen).unwrap();
    let key = pos.key();
    perft(&mut pos, 3);
    assert_eq!(pos.key(), key);
    assert_eq!(pos.fen(), fen);
    pos.assert_consistent();
}

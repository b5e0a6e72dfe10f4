//! ビットボードモジュール
//!
//! 64マスの盤面を64bitで表現し、高速なビット演算と利き計算を提供する。
//!
//! - `Bitboard`: 64bit盤面表現（little-endian rank-file: a1=bit0, h8=bit63）
//! - ファイル・ランクごとのマスク（`FILE_BB`, `RANK_BB`）
//! - 近接駒の利きテーブル（ポーン・ナイト・キング）
//! - 遠方駒の利き計算（ビショップ・ルーク・クイーン、magic bitboard）
//! - `between_bb` / `line_bb`（ピン・王手解析用の直線マスク）

mod core;
mod sliders;
mod tables;

pub use core::Bitboard;
pub use core::BitboardIter;
pub use sliders::{bishop_attacks, init_sliders, queen_attacks, rook_attacks};
pub use tables::{
    between_bb, king_attacks, knight_attacks, line_bb, pawn_attacks, FILE_BB, RANK_BB,
};

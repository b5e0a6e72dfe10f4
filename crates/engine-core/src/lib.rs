//! ビットボードチェスエンジンのコア
//!
//! - bitboard表現とmagic bitboardによる利き計算
//! - 可逆なdo/undoを持つ局面表現とZobristハッシュ
//! - ピン・王手解析による合法手生成とperft
//! - 反復深化αβ探索（置換表・null move・LMR・PVS・静止探索）
//! - UCIドライバが使うエンジン制御API

pub mod bitboard;
pub mod engine;
pub mod eval;
pub mod movegen;
pub mod position;
pub mod search;
pub mod tt;
pub mod types;

pub use bitboard::{init_sliders, Bitboard};
pub use engine::Engine;
pub use movegen::{perft, perft_divide, MoveList};
pub use position::{Position, STARTPOS_FEN};
pub use search::{SearchLimits, SearchResult};
pub use types::{Color, Move, Piece, PieceType, Square, Value};

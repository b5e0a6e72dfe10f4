//! 局面モジュール
//!
//! - `Position`: 駒リスト + bitboardの局面表現、可逆なdo/undo
//! - `UndoInfo`: 巻き戻し情報
//! - `zobrist`: 固定シードの乱数テーブル
//! - FEN形式の入出力

mod fen;
mod pos;
mod state;
pub mod zobrist;

pub use fen::{FenError, STARTPOS_FEN};
pub use pos::{MoveParseError, Position, PositionError};
pub use state::{NullUndo, UndoInfo};

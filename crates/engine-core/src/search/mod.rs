//! 探索モジュール
//!
//! - `Searcher`: negamax αβ探索（TT・null move・LMR・PVS）
//! - `qsearch`: 駒取りのみの静止探索
//! - `KillerTable` / `HistoryTable`: 手の順序付けヒューリスティック
//! - `SearchLimits` / `SearchResult`: 探索の設定と結果

mod alpha_beta;
pub mod history;
mod limits;
mod movepicker;
mod qsearch;
mod types;

pub use alpha_beta::Searcher;
pub use history::{HistoryTable, KillerTable, MAX_PLY};
pub use limits::{SearchLimits, SearchLimitsBuilder, DEFAULT_MAX_DEPTH};
pub use movepicker::{is_capture, order_moves};
pub use types::{Pv, SearchResult, SearchStats};

//! Search result types

use smallvec::SmallVec;
use std::time::Duration;

use crate::types::{Move, Value};

/// Principal variation storage
pub type Pv = SmallVec<[Move; 16]>;

/// Search statistics
#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    /// Nodes searched
    pub nodes: u64,
    /// Time elapsed
    pub elapsed: Duration,
    /// Depth of the last fully completed iteration
    pub depth: u32,
}

/// Search result
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// Best move found (None when the position has no legal move)
    pub best_move: Option<Move>,
    /// Evaluation score from the side to move's perspective
    pub score: Value,
    /// Principal variation of the last completed iteration
    pub pv: Pv,
    /// Search statistics
    pub stats: SearchStats,
}

impl SearchResult {
    /// Empty result for a position with no search performed
    pub fn empty() -> Self {
        Self {
            best_move: None,
            score: Value::ZERO,
            pv: Pv::new(),
            stats: SearchStats::default(),
        }
    }
}

//! Engine controller: owns the position, transposition table and search
//! heuristics, and drives iterative deepening within a time budget.
//!
//! The driver surface consumed by the UCI front-end. One search at a
//! time; the board is owned by the engine and never aliased.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bitboard::init_sliders;
use crate::position::Position;
use crate::search::{HistoryTable, KillerTable, SearchLimits, SearchResult, Searcher};
use crate::tt::TranspositionTable;
use crate::types::Move;

/// Default transposition table size in MB
pub const DEFAULT_TT_SIZE_MB: usize = 256;

/// Main engine struct
pub struct Engine {
    position: Position,
    tt: TranspositionTable,
    killers: KillerTable,
    history: HistoryTable,
    stop_flag: Arc<AtomicBool>,
}

impl Engine {
    /// Create a new engine with the given transposition table size.
    ///
    /// Builds the slider attack tables on first call so that search
    /// never hits lazy initialization.
    pub fn new(tt_size_mb: usize) -> Self {
        init_sliders();
        let mut position = Position::new();
        position.set_startpos();
        Self {
            position,
            tt: TranspositionTable::new(tt_size_mb),
            killers: KillerTable::new(),
            history: HistoryTable::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current position
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Mutable access to the position (for the driver's position setup)
    pub fn position_mut(&mut self) -> &mut Position {
        &mut self.position
    }

    /// Shared stop flag; the driver keeps a clone to signal `stop`
    /// from another thread while the search runs.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    /// Request the current search to stop. Idempotent.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Clear a previously requested stop so the next search can run.
    pub fn reset_stop(&self) {
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    /// Resize the transposition table. Must not be called mid-search.
    pub fn set_tt_size_mb(&mut self, mb: usize) {
        self.tt.resize(mb);
    }

    /// Clear the transposition table.
    pub fn clear_tt(&mut self) {
        self.tt.clear();
    }

    /// Search with a plain time budget and return the best move.
    ///
    /// Sets the internal deadline to now + budget. Returns None when
    /// the side to move has no legal move (mate or stalemate).
    pub fn find_best_move(&mut self, time_budget: Duration) -> Option<Move> {
        self.search(SearchLimits::builder().movetime(time_budget).build()).best_move
    }

    /// Run an iterative deepening search under the given limits.
    ///
    /// The best move of the last fully completed iteration is kept;
    /// an aborted iteration never overwrites it.
    pub fn search(&mut self, limits: SearchLimits) -> SearchResult {
        let start = Instant::now();
        let deadline = limits.movetime.map(|budget| start + budget);
        // The flag is not reset here: a driver may legitimately set it
        // just before the search thread starts running. Clearing it is
        // the caller's job (see the UCI driver's go handler).
        let stop_flag = limits.stop_flag.clone().unwrap_or_else(|| Arc::clone(&self.stop_flag));

        self.tt.new_generation();
        self.killers.clear();
        self.history.clear();
        self.position.reset_ply();

        let mut searcher = Searcher::new(
            &mut self.position,
            &mut self.tt,
            &mut self.killers,
            &mut self.history,
            deadline,
            limits.nodes,
            Some(stop_flag),
        );

        let mut best = SearchResult::empty();
        for depth in 1..=limits.max_depth() {
            // Top-of-iteration time check: do not start an iteration
            // that has no budget left.
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let (score, mv) = searcher.search_root(depth as i32);
            if searcher.aborted {
                break;
            }

            let pv = searcher.extract_pv(depth as usize);
            best = SearchResult {
                best_move: if mv.is_some() { Some(mv) } else { None },
                score,
                pv,
                stats: crate::search::SearchStats {
                    nodes: searcher.nodes,
                    elapsed: start.elapsed(),
                    depth,
                },
            };

            log::debug!(
                "depth {} score {} nodes {} time {}ms pv {}",
                depth,
                score.raw(),
                searcher.nodes,
                start.elapsed().as_millis(),
                best.pv.iter().map(|m| m.to_uci()).collect::<Vec<_>>().join(" "),
            );

            // Mate or dead position: deeper iterations cannot improve.
            if mv.is_none() || score.is_mate_win() {
                break;
            }
        }

        best
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_TT_SIZE_MB)
    }
}

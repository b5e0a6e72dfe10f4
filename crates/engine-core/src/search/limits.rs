//! Search limits shared between the engine controller and the driver

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Default iterative deepening ceiling when no depth limit is given
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Limits for a single search call
///
/// The search stops at whichever limit is reached first. The stop flag
/// is shared with the driver thread and polled every 2048 nodes.
pub struct SearchLimits {
    /// Wall-clock budget for the whole search
    pub movetime: Option<Duration>,
    /// Maximum iterative deepening depth
    pub depth: Option<u32>,
    /// Maximum nodes to search
    pub nodes: Option<u64>,
    /// Stop flag for interrupting search
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            movetime: None,
            depth: None,
            nodes: None,
            stop_flag: None,
        }
    }
}

impl SearchLimits {
    /// Create a new SearchLimitsBuilder
    pub fn builder() -> SearchLimitsBuilder {
        SearchLimitsBuilder::default()
    }

    /// Effective depth ceiling
    pub fn max_depth(&self) -> u32 {
        self.depth.unwrap_or(DEFAULT_MAX_DEPTH).clamp(1, DEFAULT_MAX_DEPTH)
    }
}

impl std::fmt::Debug for SearchLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchLimits")
            .field("movetime", &self.movetime)
            .field("depth", &self.depth)
            .field("nodes", &self.nodes)
            .field("stop_flag", &self.stop_flag.is_some())
            .finish()
    }
}

/// Builder for SearchLimits
#[derive(Default)]
pub struct SearchLimitsBuilder {
    movetime: Option<Duration>,
    depth: Option<u32>,
    nodes: Option<u64>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl SearchLimitsBuilder {
    /// Set the wall-clock budget
    pub fn movetime(mut self, budget: Duration) -> Self {
        self.movetime = Some(budget);
        self
    }

    /// Set the maximum search depth
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Set the node limit
    pub fn nodes(mut self, nodes: u64) -> Self {
        self.nodes = Some(nodes);
        self
    }

    /// Set the shared stop flag
    pub fn stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    /// Build SearchLimits
    pub fn build(self) -> SearchLimits {
        SearchLimits {
            movetime: self.movetime,
            depth: self.depth,
            nodes: self.nodes,
            stop_flag: self.stop_flag,
        }
    }
}

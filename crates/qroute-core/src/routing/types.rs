//! Types for Q-learning task routing
//!
//! This module defines the value objects the router hands out: the closed
//! set of routes, routing decisions, and statistics snapshots.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Maximum number of routes a router can be configured with
pub const MAX_ROUTES: usize = 8;

/// A handler a task can be dispatched to
///
/// The variant order is the action index order inside every Q-value vector.
/// A router configured with `num_actions = N` uses the first `N` routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Coder,
    Tester,
    Reviewer,
    Architect,
    Researcher,
    Optimizer,
    Debugger,
    Documenter,
}

impl Route {
    /// All routes in action index order
    pub const ALL: [Route; MAX_ROUTES] = [
        Route::Coder,
        Route::Tester,
        Route::Reviewer,
        Route::Architect,
        Route::Researcher,
        Route::Optimizer,
        Route::Debugger,
        Route::Documenter,
    ];

    /// The first `n` routes (at most all of them)
    pub fn first(n: usize) -> &'static [Route] {
        static ROUTES: [Route; MAX_ROUTES] = Route::ALL;
        &ROUTES[..n.min(MAX_ROUTES)]
    }

    /// Action index of this route
    pub fn index(self) -> usize {
        self as usize
    }

    /// Route at an action index, if any
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Lowercase route name used at the serialization edge
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coder => "coder",
            Self::Tester => "tester",
            Self::Reviewer => "reviewer",
            Self::Architect => "architect",
            Self::Researcher => "researcher",
            Self::Optimizer => "optimizer",
            Self::Debugger => "debugger",
            Self::Documenter => "documenter",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|route| route.as_str() == s)
            .ok_or_else(|| Error::UnknownRoute(s.to_string()))
    }
}

/// A lower-ranked route considered alongside the chosen one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteAlternative {
    pub route: Route,
    /// Softmax share of this route's Q-value (0.0 to 1.0)
    pub score: f64,
}

/// Result of a routing decision
///
/// A value object; the router keeps no reference to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Selected route
    pub route: Route,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    /// Snapshot of the state's Q-values at decision time
    pub q_values: Vec<f64>,
    /// Whether this was an exploration (vs exploitation) choice
    pub explored: bool,
    /// Up to three other routes, best first
    pub alternatives: Vec<RouteAlternative>,
}

/// Snapshot of the router's running counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouterStats {
    /// Number of applied TD updates
    pub update_count: u64,
    /// Number of states currently stored
    pub q_table_size: usize,
    /// Current exploration rate
    pub epsilon: f64,
    /// Mean absolute TD error over all applied updates
    pub avg_td_error: f64,
    /// Number of routing decisions made
    pub step_count: u64,
    /// Whether a hardware-accelerated backend is active
    pub use_native: bool,
}

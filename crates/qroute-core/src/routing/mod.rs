//! Adaptive task routing with tabular Q-learning
//!
//! This module picks which of a fixed set of routes (worker roles) should
//! handle a task, and improves that choice from reward feedback. The key
//! components are:
//!
//! - **State encoding**: task contexts are hashed into compact state keys.
//!   Colliding contexts share Q-values.
//!
//! - **Q-table**: a bounded map from state key to one value per route, with
//!   least-visited eviction.
//!
//! - **Epsilon-greedy policy**: explores random routes with a decaying
//!   probability, otherwise exploits the best known route.
//!
//! - **Persistence**: the table exports to a stable `{key: {qValues, visits}}`
//!   shape that can be stored as JSON or in SQLite.
//!
//! ## How It Works
//!
//! 1. `route` encodes the context, materializes its state, and picks a route
//! 2. The caller dispatches the task and measures the outcome
//! 3. `update` applies a one-step TD update toward
//!    `reward + gamma * max Q(next)` and decays epsilon
//!
//! ## Example
//!
//! ```rust
//! use qroute_core::routing::{Route, Router, RouterConfig};
//!
//! let mut router = Router::new(RouterConfig::default())?;
//!
//! let decision = router.route("write unit tests for the parser", true);
//! // Dispatch to decision.route...
//!
//! router.update("write unit tests for the parser", "tester", 1.0, None);
//! assert!(router.stats().update_count == 1);
//!
//! let greedy = router.route("write unit tests for the parser", false);
//! assert_eq!(greedy.route, Route::Tester);
//! # Ok::<(), qroute_core::Error>(())
//! ```

mod backend;
mod codec;
mod encoder;
mod policy;
mod replay;
mod router;
mod shared;
mod stats;
mod store;
mod table;
mod types;

pub use backend::{Backend, SoftwareBackend};
pub use codec::{ImportReport, PersistedEntry, PersistedTable, from_json, to_json};
pub use encoder::{StateKey, encode};
pub use policy::ExplorationPolicy;
pub use replay::{Experience, ReplayBuffer};
pub use router::{Router, RouterConfig};
pub use shared::{SharedRouter, SharedRouterBuilder};
pub use stats::StatsTracker;
pub use store::{CREATE_Q_TABLE_SQL, QTableStore, QTableStoreSummary};
pub use table::{QTable, QTableEntry};
pub use types::{MAX_ROUTES, Route, RouteAlternative, RouteDecision, RouterStats};

//! qroute Core Library
//!
//! This crate provides an adaptive task router built on tabular Q-learning:
//! - Route selection over a fixed set of worker roles
//! - TD learning from scalar reward feedback
//! - Table export/import for persistence across restarts
//! - SQLite storage and a lock-serialized shared handle
//! - TOML configuration

pub mod config;
pub mod error;
pub mod routing;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::routing::{Route, RouteDecision, Router, RouterConfig, RouterStats, SharedRouter};
}

//! Error types for qroute

use thiserror::Error;

/// Result type alias using qroute's Error
pub type Result<T> = std::result::Result<T, Error>;

/// qroute error types with helpful messages and suggestions
///
/// Only construction-time misconfiguration is fatal for the router itself.
/// Unknown actions and malformed import entries are reported through return
/// values instead (see [`crate::routing::Router::update`] and
/// [`crate::routing::ImportReport`]).
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (E100-E199)
    #[error("Invalid router configuration: {0}")]
    Configuration(String),

    // Input errors (E200-E299)
    #[error("Unknown route '{0}'. Valid routes: coder, tester, reviewer, architect, researcher, optimizer, debugger, documenter.")]
    UnknownRoute(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Persistence errors (E300-E399)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "E100",
            Self::UnknownRoute(_) => "E200",
            Self::InvalidInput(_) => "E201",
            Self::Database(_) => "E300",
            Self::Serialization(_) => "E301",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Configuration(_) => Some(
                "num_actions must be 1..=8 and max_states must be at least 1".to_string(),
            ),
            Self::UnknownRoute(_) => Some(
                "use one of: coder, tester, reviewer, architect, researcher, optimizer, debugger, documenter"
                    .to_string(),
            ),
            Self::Database(_) => {
                Some("check storage.database_path in config.toml".to_string())
            }
            _ => None,
        }
    }

    /// Whether the error should abort the caller's operation
    ///
    /// Router misconfiguration is the only fatal class; everything else is
    /// an adapter failure the caller may retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

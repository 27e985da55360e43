//! Context string to state key encoding
//!
//! Contexts are hashed with a polynomial rolling hash (`h = h * 31 + byte`)
//! over their UTF-8 bytes. Distinct contexts may collide; colliding contexts
//! simply share a Q-value vector.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const HASH_MULTIPLIER: u64 = 31;

/// Compact identifier standing in for a context string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey(u64);

impl StateKey {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Renders as 16 lowercase hex digits, the persisted key format
impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl std::str::FromStr for StateKey {
    type Err = Error;

    /// Accepts only the rendered form, so each key has exactly one spelling
    fn from_str(s: &str) -> Result<Self> {
        let canonical = s.len() == 16
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !canonical {
            return Err(Error::InvalidInput(format!(
                "state key '{}' is not 16 lowercase hex digits",
                s
            )));
        }
        u64::from_str_radix(s, 16)
            .map(StateKey)
            .map_err(|e| Error::InvalidInput(format!("state key '{}': {}", s, e)))
    }
}

/// Encode a context string into its state key
pub fn encode(context: &str) -> StateKey {
    let hash = context.bytes().fold(0u64, |hash, byte| {
        hash.wrapping_mul(HASH_MULTIPLIER)
            .wrapping_add(u64::from(byte))
    });
    StateKey(hash)
}

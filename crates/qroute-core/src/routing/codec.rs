//! External representation of the Q-table
//!
//! The persisted shape is a map from the 16-hex-digit state key to
//! `{"qValues": [...], "visits": n}`. It is the only durable format the
//! router produces and must stay stable across versions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::encoder::StateKey;
use super::table::QTable;
use crate::error::Result;

/// Persisted Q-values for one state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    pub q_values: Vec<f64>,
    pub visits: u64,
}

/// Full table snapshot keyed by rendered state key
pub type PersistedTable = BTreeMap<String, PersistedEntry>;

/// Outcome of installing a persisted table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Entries installed into the table
    pub imported: usize,
    /// Entries dropped as malformed
    pub skipped: usize,
    /// Valid entries dropped because the table was over capacity
    pub evicted: usize,
}

/// Snapshot every entry of a table
pub fn encode_table(table: &QTable) -> PersistedTable {
    table
        .iter()
        .map(|(key, entry)| {
            (
                key.to_string(),
                PersistedEntry {
                    q_values: entry.q_values.clone(),
                    visits: entry.visits,
                },
            )
        })
        .collect()
}

/// Validate persisted entries against the expected vector length
///
/// Returns the well-formed entries and the number skipped. An entry is
/// malformed when its key does not parse, its vector has the wrong length,
/// or it holds a non-finite value.
pub fn decode_entries(
    data: PersistedTable,
    num_actions: usize,
) -> (Vec<(StateKey, Vec<f64>, u64)>, usize) {
    let mut accepted = Vec::with_capacity(data.len());
    let mut skipped = 0;

    for (raw_key, entry) in data {
        let key = match raw_key.parse::<StateKey>() {
            Ok(key) => key,
            Err(e) => {
                warn!(key = %raw_key, error = %e, "Skipping imported entry with invalid key");
                skipped += 1;
                continue;
            }
        };

        if entry.q_values.len() != num_actions {
            warn!(
                key = %raw_key,
                expected = num_actions,
                actual = entry.q_values.len(),
                "Skipping imported entry with wrong Q-value count"
            );
            skipped += 1;
            continue;
        }

        if entry.q_values.iter().any(|v| !v.is_finite()) {
            warn!(key = %raw_key, "Skipping imported entry with non-finite Q-values");
            skipped += 1;
            continue;
        }

        accepted.push((key, entry.q_values, entry.visits));
    }

    (accepted, skipped)
}

/// Serialize a persisted table to JSON
pub fn to_json(data: &PersistedTable) -> Result<String> {
    Ok(serde_json::to_string(data)?)
}

/// Parse a persisted table from JSON
pub fn from_json(json: &str) -> Result<PersistedTable> {
    Ok(serde_json::from_str(json)?)
}

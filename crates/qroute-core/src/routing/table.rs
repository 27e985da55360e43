//! Bounded Q-value table
//!
//! Maps state keys to fixed-length action-value vectors. The table never
//! holds more than `max_states` entries: inserting into a full table evicts
//! the least visited entry, oldest first among equals.

use std::collections::HashMap;

use tracing::debug;

use super::encoder::StateKey;

/// Q-values and visit count for one state
#[derive(Debug, Clone, PartialEq)]
pub struct QTableEntry {
    pub q_values: Vec<f64>,
    pub visits: u64,
    /// Insertion order, used to break eviction ties
    seq: u64,
}

impl QTableEntry {
    pub(crate) fn zeroed(num_actions: usize, seq: u64) -> Self {
        Self {
            q_values: vec![0.0; num_actions],
            visits: 0,
            seq,
        }
    }

    /// Highest Q-value in this entry
    pub fn max_value(&self) -> f64 {
        self.q_values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Bounded table of per-state Q-value vectors
#[derive(Debug)]
pub struct QTable {
    entries: HashMap<StateKey, QTableEntry>,
    num_actions: usize,
    max_states: usize,
    next_seq: u64,
    /// Keys evicted since the last drain; `None` when not recorded
    evicted: Option<Vec<StateKey>>,
}

impl QTable {
    pub fn new(num_actions: usize, max_states: usize) -> Self {
        Self {
            entries: HashMap::new(),
            num_actions,
            max_states,
            next_seq: 0,
            evicted: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn max_states(&self) -> usize {
        self.max_states
    }

    /// Look up a state without materializing it
    pub fn get(&self, key: StateKey) -> Option<&QTableEntry> {
        self.entries.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: StateKey) -> Option<&mut QTableEntry> {
        self.entries.get_mut(&key)
    }

    /// Get a state's entry, inserting a zeroed one if absent
    ///
    /// A fresh insertion into a full table evicts another entry first, so the
    /// returned entry is never the one evicted.
    pub fn get_or_create(&mut self, key: StateKey) -> &mut QTableEntry {
        if !self.entries.contains_key(&key) {
            self.make_room(1);
        }

        let Self {
            entries,
            num_actions,
            next_seq,
            ..
        } = self;

        entries.entry(key).or_insert_with(|| {
            let entry = QTableEntry::zeroed(*num_actions, *next_seq);
            *next_seq += 1;
            entry
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &QTableEntry)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
        if let Some(evicted) = &mut self.evicted {
            evicted.clear();
        }
    }

    /// Start recording evicted keys for [`QTable::take_evicted`]
    pub(crate) fn track_evictions(&mut self) {
        self.evicted.get_or_insert_with(Vec::new);
    }

    /// Drain the keys evicted since the last call
    pub(crate) fn take_evicted(&mut self) -> Vec<StateKey> {
        self.evicted.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Replace all entries, then trim down to capacity
    ///
    /// Entries are taken in iteration order for tie-breaking purposes.
    /// Returns the number of entries evicted by the trim.
    pub fn replace<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (StateKey, Vec<f64>, u64)>,
    {
        self.clear();
        for (key, q_values, visits) in entries {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.entries.insert(
                key,
                QTableEntry {
                    q_values,
                    visits,
                    seq,
                },
            );
        }
        self.make_room(0)
    }

    /// Evict until `incoming` more entries fit; returns the eviction count
    fn make_room(&mut self, incoming: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() + incoming > self.max_states {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.visits, entry.seq))
                .map(|(key, _)| *key);

            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                    if let Some(log) = &mut self.evicted {
                        log.push(key);
                    }
                    evicted += 1;
                    debug!(state = %key, "Evicted least visited state");
                }
                None => break,
            }
        }
        evicted
    }
}

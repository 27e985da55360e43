//! Bounded experience replay
//!
//! Past transitions are kept in a FIFO ring and re-applied in random batches
//! so that rarely repeated contexts keep converging between live updates.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::index::sample;

use super::encoder::StateKey;

/// One observed transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Experience {
    pub state: StateKey,
    pub action: usize,
    pub reward: f64,
    pub next_state: Option<StateKey>,
}

/// FIFO buffer of recent experiences
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    experiences: VecDeque<Experience>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            experiences: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
    }

    /// Record an experience, dropping the oldest when full
    pub fn push(&mut self, experience: Experience) {
        if self.capacity == 0 {
            return;
        }
        if self.experiences.len() == self.capacity {
            self.experiences.pop_front();
        }
        self.experiences.push_back(experience);
    }

    /// Draw up to `batch_size` distinct experiences uniformly
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Experience> {
        let amount = batch_size.min(self.experiences.len());
        sample(rng, self.experiences.len(), amount)
            .into_iter()
            .map(|i| self.experiences[i])
            .collect()
    }

    pub fn clear(&mut self) {
        self.experiences.clear();
    }
}

//! Running counters for the router

use super::types::RouterStats;

/// Update and decision counters with a cumulative mean of |TD error|
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    update_count: u64,
    step_count: u64,
    avg_td_error: f64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self) {
        self.step_count += 1;
    }

    /// Fold one applied update into the running mean
    pub fn record_update(&mut self, td_error: f64) {
        self.update_count += 1;
        let n = self.update_count as f64;
        self.avg_td_error += (td_error.abs() - self.avg_td_error) / n;
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn avg_td_error(&self) -> f64 {
        self.avg_td_error
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Combine counters with the table and policy readings
    pub fn snapshot(&self, q_table_size: usize, epsilon: f64, use_native: bool) -> RouterStats {
        RouterStats {
            update_count: self.update_count,
            q_table_size,
            epsilon,
            avg_td_error: self.avg_td_error,
            step_count: self.step_count,
            use_native,
        }
    }
}

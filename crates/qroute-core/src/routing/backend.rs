//! Numeric backends for greedy selection and TD updates
//!
//! The router delegates its two hot kernels to a [`Backend`]. The software
//! backend is always available; an accelerated implementation can be plugged
//! in through [`crate::routing::Router::with_backend`] and must produce the
//! same results.

/// Strategy for the router's numeric kernels
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Short identifier for logs
    fn name(&self) -> &'static str;

    /// Whether this backend runs on accelerated/native code
    fn is_native(&self) -> bool;

    /// Index of the maximum value, lowest index on ties
    fn select_greedy(&self, q_values: &[f64]) -> usize;

    /// Move `q_values[action]` toward `target`; returns the TD error
    fn apply_td(&self, q_values: &mut [f64], action: usize, target: f64, learning_rate: f64)
    -> f64;
}

/// Pure-Rust scalar backend
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBackend;

impl Backend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn is_native(&self) -> bool {
        false
    }

    fn select_greedy(&self, q_values: &[f64]) -> usize {
        let mut best = 0;
        for (i, &value) in q_values.iter().enumerate().skip(1) {
            if value > q_values[best] {
                best = i;
            }
        }
        best
    }

    fn apply_td(
        &self,
        q_values: &mut [f64],
        action: usize,
        target: f64,
        learning_rate: f64,
    ) -> f64 {
        let td_error = target - q_values[action];
        q_values[action] += learning_rate * td_error;
        td_error
    }
}

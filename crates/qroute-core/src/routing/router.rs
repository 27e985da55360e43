//! Q-learning router
//!
//! This module provides the [`Router`], which combines:
//! - state encoding of free-form task contexts
//! - a bounded Q-table of per-state action values
//! - epsilon-greedy exploration with decay
//! - one-step TD updates with optional experience replay
//!
//! The router is synchronous and owns all of its state. Share it between
//! tasks through [`crate::routing::SharedRouter`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::backend::{Backend, SoftwareBackend};
use super::codec::{self, ImportReport, PersistedTable};
use super::encoder::{self, StateKey};
use super::policy::ExplorationPolicy;
use super::replay::{Experience, ReplayBuffer};
use super::stats::StatsTracker;
use super::table::{QTable, QTableEntry};
use super::types::{MAX_ROUTES, Route, RouteAlternative, RouteDecision, RouterStats};
use crate::error::{Error, Result};

/// Number of alternatives reported with each decision
const MAX_ALTERNATIVES: usize = 3;

/// Configuration for the Q-learning router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Step size of each TD update, in (0, 1]
    pub learning_rate: f64,
    /// Discount applied to the successor state's value, in [0, 1]
    pub gamma: f64,
    /// Starting exploration rate, in [0, 1]
    pub exploration_initial: f64,
    /// Fraction of epsilon removed per update, in [0, 1)
    pub exploration_decay: f64,
    /// Lowest exploration rate, in [0, exploration_initial]
    pub exploration_floor: f64,
    /// Number of routes, 1..=8; the first N routes in index order are used
    pub num_actions: usize,
    /// Maximum number of stored states
    pub max_states: usize,
    /// Experiences retained for replay (0 disables recording)
    pub replay_capacity: usize,
    /// Experiences replayed per update (0 disables replay)
    pub replay_batch_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            gamma: 0.99,
            exploration_initial: 1.0,
            exploration_decay: 0.01,
            exploration_floor: 0.01,
            num_actions: MAX_ROUTES,
            max_states: 10_000,
            replay_capacity: 1_000,
            replay_batch_size: 0,
        }
    }
}

impl RouterConfig {
    /// Check every parameter range
    pub fn validate(&self) -> Result<()> {
        if self.num_actions == 0 {
            return Err(Error::Configuration("num_actions must be at least 1".to_string()));
        }
        if self.num_actions > MAX_ROUTES {
            return Err(Error::Configuration(format!(
                "num_actions must be at most {}, got {}",
                MAX_ROUTES, self.num_actions
            )));
        }
        if self.max_states == 0 {
            return Err(Error::Configuration("max_states must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::Configuration(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(Error::Configuration(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.exploration_initial) {
            return Err(Error::Configuration(format!(
                "exploration_initial must be in [0, 1], got {}",
                self.exploration_initial
            )));
        }
        if !(0.0..1.0).contains(&self.exploration_decay) {
            return Err(Error::Configuration(format!(
                "exploration_decay must be in [0, 1), got {}",
                self.exploration_decay
            )));
        }
        if !(0.0..=self.exploration_initial).contains(&self.exploration_floor) {
            return Err(Error::Configuration(format!(
                "exploration_floor must be in [0, {}], got {}",
                self.exploration_initial, self.exploration_floor
            )));
        }
        if self.replay_batch_size > self.replay_capacity {
            return Err(Error::Configuration(format!(
                "replay_batch_size ({}) cannot exceed replay_capacity ({})",
                self.replay_batch_size, self.replay_capacity
            )));
        }
        Ok(())
    }
}

/// Tabular Q-learning router over a fixed set of routes
#[derive(Debug)]
pub struct Router {
    config: RouterConfig,
    table: QTable,
    policy: ExplorationPolicy,
    stats: StatsTracker,
    replay: ReplayBuffer,
    backend: Box<dyn Backend>,
    rng: StdRng,
}

impl Router {
    /// Create a router seeded from system entropy
    pub fn new(config: RouterConfig) -> Result<Self> {
        Self::build(config, StdRng::from_entropy())
    }

    /// Create a router with a fixed seed (for reproducibility in tests)
    pub fn with_seed(config: RouterConfig, seed: u64) -> Result<Self> {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    fn build(config: RouterConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            table: QTable::new(config.num_actions, config.max_states),
            policy: ExplorationPolicy::new(
                config.exploration_initial,
                config.exploration_decay,
                config.exploration_floor,
            ),
            stats: StatsTracker::new(),
            replay: ReplayBuffer::new(config.replay_capacity),
            backend: Box::new(SoftwareBackend),
            rng,
            config,
        })
    }

    /// Swap the numeric backend
    pub fn with_backend(self, backend: impl Backend + 'static) -> Self {
        self.with_boxed_backend(Box::new(backend))
    }

    pub(crate) fn with_boxed_backend(mut self, backend: Box<dyn Backend>) -> Self {
        info!(backend = backend.name(), native = backend.is_native(), "Router backend selected");
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Routes this router chooses between, in action index order
    pub fn routes(&self) -> &'static [Route] {
        Route::first(self.config.num_actions)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Look up a context's entry without materializing it
    pub fn peek(&self, context: &str) -> Option<&QTableEntry> {
        self.table.get(encoder::encode(context))
    }

    /// Choose a route for a context
    ///
    /// Materializes the context's state on first sight, which may evict the
    /// least visited state when the table is full. With `explore = false`
    /// the choice is always greedy.
    pub fn route(&mut self, context: &str, explore: bool) -> RouteDecision {
        let state = encoder::encode(context);
        let q_values = self.table.get_or_create(state).q_values.clone();

        let explored = self.policy.should_explore(explore, &mut self.rng);
        let index = if explored {
            self.rng.gen_range(0..q_values.len())
        } else {
            self.backend.select_greedy(&q_values)
        };

        let routes = self.routes();
        let route = routes[index];
        let confidence = confidence(&q_values, index);
        let alternatives = alternatives(routes, &q_values, index);

        self.stats.record_step();

        debug!(
            state = %state,
            route = %route,
            explored = explored,
            confidence = confidence,
            "Routed task"
        );

        RouteDecision {
            route,
            confidence,
            q_values,
            explored,
            alternatives,
        }
    }

    /// Learn from the outcome of routing `context` to the named action
    ///
    /// Returns the TD error. An action name outside the configured routes is
    /// a no-op that returns `0.0`.
    pub fn update(
        &mut self,
        context: &str,
        action: &str,
        reward: f64,
        next_context: Option<&str>,
    ) -> f64 {
        match action.parse::<Route>() {
            Ok(route) => self.update_route(context, route, reward, next_context),
            Err(_) => {
                warn!(action = %action, "Ignoring update for unknown action");
                0.0
            }
        }
    }

    /// Typed form of [`Router::update`]
    pub fn update_route(
        &mut self,
        context: &str,
        route: Route,
        reward: f64,
        next_context: Option<&str>,
    ) -> f64 {
        let Some(action) = self.action_index(route) else {
            warn!(
                route = %route,
                num_actions = self.config.num_actions,
                "Ignoring update for route outside the configured set"
            );
            return 0.0;
        };

        if !reward.is_finite() {
            warn!(reward = reward, "Ignoring update with non-finite reward");
            return 0.0;
        }

        let state = encoder::encode(context);
        let next_state = next_context.map(encoder::encode);

        let td_error = self.learn(state, action, reward, next_state);
        self.stats.record_update(td_error);
        self.policy.decay();

        self.replay.push(Experience {
            state,
            action,
            reward,
            next_state,
        });
        self.replay_batch();

        debug!(
            state = %state,
            route = %route,
            reward = reward,
            td_error = td_error,
            epsilon = self.policy.epsilon(),
            "Applied TD update"
        );

        td_error
    }

    /// Current counters
    pub fn stats(&self) -> RouterStats {
        self.stats.snapshot(
            self.table.len(),
            self.policy.epsilon(),
            self.backend.is_native(),
        )
    }

    /// Forget everything learned
    pub fn reset(&mut self) {
        self.table.clear();
        self.stats.reset();
        self.policy.reset();
        self.replay.clear();
        info!("Router reset");
    }

    /// Snapshot the full table
    pub fn export(&self) -> PersistedTable {
        let data = codec::encode_table(&self.table);
        info!(states = data.len(), "Exported Q-table");
        data
    }

    /// Replace the table with a persisted snapshot
    ///
    /// Malformed entries are skipped. If more valid entries arrive than the
    /// table holds, the least visited ones are dropped.
    pub fn import(&mut self, data: PersistedTable) -> ImportReport {
        let (accepted, skipped) = codec::decode_entries(data, self.config.num_actions);

        let evicted = self.table.replace(accepted);
        self.replay.clear();

        if evicted > 0 {
            warn!(
                evicted = evicted,
                max_states = self.config.max_states,
                "Imported table exceeded capacity"
            );
        }

        let report = ImportReport {
            imported: self.table.len(),
            skipped,
            evicted,
        };
        info!(
            imported = report.imported,
            skipped = report.skipped,
            "Imported Q-table"
        );
        report
    }

    /// Record keys evicted from the table until drained
    pub(crate) fn track_evictions(&mut self) {
        self.table.track_evictions();
    }

    /// Drain the keys evicted since the last call
    pub(crate) fn take_evicted(&mut self) -> Vec<StateKey> {
        self.table.take_evicted()
    }

    fn action_index(&self, route: Route) -> Option<usize> {
        let index = route.index();
        (index < self.config.num_actions).then_some(index)
    }

    /// Value of the best action in a successor state, 0 for terminal or unseen
    fn bootstrap(&self, next_state: Option<StateKey>) -> f64 {
        next_state
            .and_then(|key| self.table.get(key))
            .map(QTableEntry::max_value)
            .unwrap_or(0.0)
    }

    fn learn(
        &mut self,
        state: StateKey,
        action: usize,
        reward: f64,
        next_state: Option<StateKey>,
    ) -> f64 {
        let target = reward + self.config.gamma * self.bootstrap(next_state);
        let entry = self.table.get_or_create(state);
        let td_error =
            self.backend
                .apply_td(&mut entry.q_values, action, target, self.config.learning_rate);
        entry.visits += 1;
        td_error
    }

    /// Re-apply a random batch of stored experiences
    ///
    /// Only states still in the table are touched; replay never inserts. A
    /// state evicted and later re-created under the same key, possibly by a
    /// colliding context, receives the old experience like any shared key.
    fn replay_batch(&mut self) {
        let batch_size = self.config.replay_batch_size;
        if batch_size == 0 || self.replay.len() < batch_size {
            return;
        }

        let batch = self.replay.sample(batch_size, &mut self.rng);
        for experience in batch {
            let target = experience.reward + self.config.gamma * self.bootstrap(experience.next_state);
            if let Some(entry) = self.table.get_mut(experience.state) {
                self.backend.apply_td(
                    &mut entry.q_values,
                    experience.action,
                    target,
                    self.config.learning_rate,
                );
            }
        }
    }
}

/// Margin of the chosen value over the mean of the others, squashed by tanh
///
/// Zero whenever the chosen value does not exceed the others' mean, which
/// includes the all-zero vector of an unseen state.
fn confidence(q_values: &[f64], chosen: usize) -> f64 {
    let others = q_values.len().saturating_sub(1);
    let mean_others = if others == 0 {
        0.0
    } else {
        (q_values.iter().sum::<f64>() - q_values[chosen]) / others as f64
    };

    let confidence = (q_values[chosen] - mean_others).max(0.0).tanh();
    if confidence.is_nan() { 0.0 } else { confidence }
}

/// Softmax share of each Q-value, shifted by the max for stability
fn softmax(q_values: &[f64]) -> Vec<f64> {
    let max = q_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = q_values.iter().map(|q| (q - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn alternatives(routes: &[Route], q_values: &[f64], chosen: usize) -> Vec<RouteAlternative> {
    let scores = softmax(q_values);
    let mut ranked: Vec<RouteAlternative> = routes
        .iter()
        .zip(scores)
        .enumerate()
        .filter(|(i, _)| *i != chosen)
        .map(|(_, (&route, score))| RouteAlternative { route, score })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(MAX_ALTERNATIVES);
    ranked
}

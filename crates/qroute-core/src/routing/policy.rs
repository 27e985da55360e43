//! Epsilon-greedy exploration schedule

use rand::Rng;

/// Exploration rate with multiplicative decay toward a floor
#[derive(Debug, Clone)]
pub struct ExplorationPolicy {
    epsilon: f64,
    initial: f64,
    decay: f64,
    floor: f64,
}

impl ExplorationPolicy {
    /// Create a policy; callers validate `floor <= initial` and `decay` in `[0, 1)`
    pub fn new(initial: f64, decay: f64, floor: f64) -> Self {
        Self {
            epsilon: initial,
            initial,
            decay,
            floor,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Decide whether to explore
    ///
    /// Without the explicit flag this is always a pure exploitation step.
    pub fn should_explore<R: Rng + ?Sized>(&self, explore: bool, rng: &mut R) -> bool {
        if !explore {
            return false;
        }
        rng.gen_range(0.0..1.0) < self.epsilon
    }

    /// Shrink epsilon by one step, never below the floor
    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * (1.0 - self.decay)).max(self.floor);
    }

    pub fn reset(&mut self) {
        self.epsilon = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_no_flag_never_explores() {
        let policy = ExplorationPolicy::new(1.0, 0.1, 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(!policy.should_explore(false, &mut rng));
        }
    }

    #[test]
    fn test_full_epsilon_always_explores() {
        let policy = ExplorationPolicy::new(1.0, 0.1, 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(policy.should_explore(true, &mut rng));
        }
    }

    #[test]
    fn test_zero_epsilon_never_explores() {
        let policy = ExplorationPolicy::new(0.0, 0.1, 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(!policy.should_explore(true, &mut rng));
        }
    }

    #[test]
    fn test_decay_monotonic_and_floored() {
        let mut policy = ExplorationPolicy::new(1.0, 0.2, 0.05);
        let mut previous = policy.epsilon();
        for _ in 0..200 {
            policy.decay();
            assert!(policy.epsilon() <= previous);
            assert!(policy.epsilon() >= 0.05);
            previous = policy.epsilon();
        }
        assert_eq!(policy.epsilon(), 0.05);

        policy.reset();
        assert_eq!(policy.epsilon(), 1.0);
    }
}

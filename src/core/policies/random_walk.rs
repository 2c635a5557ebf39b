use std::time::Duration;

use rand::{Rng, RngCore};

use crate::core::domain::{Action, Observation, Step};
use crate::core::traits::policy::Policy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkState {
    Walking,
}

/// Coin flip per tick: allocate a randomly sized block or do nothing.
/// Never frees and knows nothing about limits.
#[derive(Clone, Debug)]
pub struct RandomWalk {
    min_bytes: u64,
    max_bytes: u64,
    min_pause: Duration,
    max_pause: Duration,
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomWalk {
    pub const DEFAULT_MIN_BYTES: u64 = 10_000;
    pub const DEFAULT_MAX_BYTES: u64 = 1_000_000;
    pub const DEFAULT_MIN_PAUSE: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_PAUSE: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self {
            min_bytes: Self::DEFAULT_MIN_BYTES,
            max_bytes: Self::DEFAULT_MAX_BYTES,
            min_pause: Self::DEFAULT_MIN_PAUSE,
            max_pause: Self::DEFAULT_MAX_PAUSE,
        }
    }

    /// Inclusive bounds; swapped if given in the wrong order.
    pub fn with_size_range(self, min_bytes: u64, max_bytes: u64) -> Self {
        Self {
            min_bytes: min_bytes.min(max_bytes),
            max_bytes: min_bytes.max(max_bytes),
            ..self
        }
    }

    /// Inclusive bounds; swapped if given in the wrong order.
    pub fn with_pause_range(self, min_pause: Duration, max_pause: Duration) -> Self {
        Self {
            min_pause: min_pause.min(max_pause),
            max_pause: min_pause.max(max_pause),
            ..self
        }
    }
}

impl Policy for RandomWalk {
    type State = WalkState;

    const NAME: &'static str = "RandomWalk";

    fn initial_state(&self) -> WalkState {
        WalkState::Walking
    }

    fn step(
        &self,
        state: WalkState,
        _observation: &Observation,
        rng: &mut dyn RngCore,
    ) -> Step<WalkState> {
        let action = if rng.gen_bool(0.5) {
            Action::Allocate {
                bytes: rng.gen_range(self.min_bytes..=self.max_bytes),
            }
        } else {
            Action::Hold
        };
        let pause = rng.gen_range(self.min_pause..=self.max_pause);

        Step::new(action, state, pause)
    }
}

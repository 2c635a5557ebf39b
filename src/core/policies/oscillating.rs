use std::time::Duration;

use rand::RngCore;

use crate::core::config::ThresholdConfig;
use crate::core::domain::{Action, Event, Observation, Step, kb_to_bytes};
use crate::core::traits::policy::Policy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OscillationState {
    Growing,
    Shrinking,
}

/// Grows past the upper limit, then frees one block per tick down to the
/// lower limit, forever.
#[derive(Clone, Debug)]
pub struct Oscillating {
    upper_limit_kb: u64,
    lower_limit_kb: u64,
    step_kb: u64,
    interval: Duration,
    /// Extra wait after each free so observers can sample the drop.
    settle: Duration,
}

impl Oscillating {
    pub const DEFAULT_STEP_KB: u64 = 1024;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            upper_limit_kb: config.upper_limit_kb(),
            lower_limit_kb: config.lower_limit_kb(),
            step_kb: Self::DEFAULT_STEP_KB,
            interval: Self::DEFAULT_INTERVAL,
            settle: Self::DEFAULT_SETTLE,
        }
    }

    pub fn with_step_kb(self, step_kb: u64) -> Self {
        Self {
            step_kb: step_kb.max(1),
            ..self
        }
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    pub fn with_settle(self, settle: Duration) -> Self {
        Self { settle, ..self }
    }
}

impl Policy for Oscillating {
    type State = OscillationState;

    const NAME: &'static str = "Oscillating";

    fn initial_state(&self) -> OscillationState {
        OscillationState::Growing
    }

    fn step(
        &self,
        state: OscillationState,
        observation: &Observation,
        _rng: &mut dyn RngCore,
    ) -> Step<OscillationState> {
        match state {
            OscillationState::Growing => {
                let action = Action::Allocate {
                    bytes: kb_to_bytes(self.step_kb),
                };
                if observation.total_kb + self.step_kb >= self.upper_limit_kb {
                    Step::new(action, OscillationState::Shrinking, self.interval)
                        .with_event(Event::CrossedUpperLimit)
                } else {
                    Step::new(action, OscillationState::Growing, self.interval)
                }
            }
            OscillationState::Shrinking => {
                let pause = self.settle + self.interval;
                if observation.total_after_free_kb() <= self.lower_limit_kb {
                    Step::new(Action::Free, OscillationState::Growing, pause)
                        .with_event(Event::DroppedBelowLowerLimit)
                } else {
                    Step::new(Action::Free, OscillationState::Shrinking, pause)
                }
            }
        }
    }
}

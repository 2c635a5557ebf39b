use std::time::Duration;

use rand::RngCore;

use crate::core::config::ThresholdConfig;
use crate::core::domain::{Action, Event, Observation, Step, kb_to_bytes};
use crate::core::traits::policy::Policy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NearLimitState {
    Approaching,
    Holding,
}

/// Grows toward the upper limit but stops one step short of it, then
/// holds there forever. Never crosses the limit.
#[derive(Clone, Debug)]
pub struct NearLimit {
    upper_limit_kb: u64,
    step_kb: u64,
    interval: Duration,
    hold_interval: Duration,
}

impl NearLimit {
    pub const DEFAULT_STEP_KB: u64 = 1024;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_HOLD_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            upper_limit_kb: config.upper_limit_kb(),
            step_kb: Self::DEFAULT_STEP_KB,
            interval: Self::DEFAULT_INTERVAL,
            hold_interval: Self::DEFAULT_HOLD_INTERVAL,
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

    pub fn with_hold_interval(self, hold_interval: Duration) -> Self {
        Self {
            hold_interval,
            ..self
        }
    }

    fn has_room(&self, total_kb: u64) -> bool {
        total_kb.saturating_add(self.step_kb) <= self.upper_limit_kb.saturating_sub(self.step_kb)
    }
}

impl Policy for NearLimit {
    type State = NearLimitState;

    const NAME: &'static str = "NearLimit";

    fn initial_state(&self) -> NearLimitState {
        NearLimitState::Approaching
    }

    fn step(
        &self,
        state: NearLimitState,
        observation: &Observation,
        _rng: &mut dyn RngCore,
    ) -> Step<NearLimitState> {
        if self.has_room(observation.total_kb) {
            let action = Action::Allocate {
                bytes: kb_to_bytes(self.step_kb),
            };
            return Step::new(action, NearLimitState::Approaching, self.interval);
        }

        let step = Step::new(Action::Hold, NearLimitState::Holding, self.hold_interval);
        match state {
            NearLimitState::Approaching => step.with_event(Event::HoldingNearLimit),
            NearLimitState::Holding => step,
        }
    }
}

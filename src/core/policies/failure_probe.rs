use std::time::Duration;

use rand::RngCore;

use crate::core::config::ThresholdConfig;
use crate::core::domain::{Action, Event, Observation, Step, kb_to_bytes};
use crate::core::traits::policy::Policy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeState {
    /// Sum of successfully probed chunks.
    pub attempted_kb: u64,
}

/// Repeatedly commits and releases a large chunk. Failed attempts are
/// retried after the usual pause; the run finishes once the successful
/// attempts add up to the upper limit.
#[derive(Clone, Debug)]
pub struct FailureProbe {
    upper_limit_kb: u64,
    chunk_kb: u64,
    interval: Duration,
}

impl FailureProbe {
    /// One GiB per attempt.
    pub const DEFAULT_CHUNK_KB: u64 = 1024 * 1024;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            upper_limit_kb: config.upper_limit_kb(),
            chunk_kb: Self::DEFAULT_CHUNK_KB,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn with_chunk_kb(self, chunk_kb: u64) -> Self {
        Self {
            chunk_kb: chunk_kb.max(1),
            ..self
        }
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }
}

impl Policy for FailureProbe {
    type State = ProbeState;

    const NAME: &'static str = "FailureProbe";

    fn initial_state(&self) -> ProbeState {
        ProbeState { attempted_kb: 0 }
    }

    fn step(
        &self,
        state: ProbeState,
        observation: &Observation,
        _rng: &mut dyn RngCore,
    ) -> Step<ProbeState> {
        if state.attempted_kb >= self.upper_limit_kb {
            return Step::new(Action::Finish, state, Duration::ZERO)
                .with_event(Event::TargetReached);
        }

        let bytes = kb_to_bytes(self.chunk_kb);
        let action = if observation.last_attempt_failed {
            Action::RetryAfterFailure { bytes }
        } else {
            Action::Probe { bytes }
        };
        let next = ProbeState {
            attempted_kb: state.attempted_kb.saturating_add(self.chunk_kb),
        };

        Step::new(action, next, self.interval)
    }
}

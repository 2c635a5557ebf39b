use std::time::Duration;

use rand::RngCore;

use crate::core::config::ThresholdConfig;
use crate::core::domain::{Action, Event, Observation, Prefill, Step};
use crate::core::traits::policy::Policy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclineState {
    Draining,
    Steady,
}

/// Starts filled to the upper limit and frees one block per tick until at
/// or below the lower limit, then holds.
#[derive(Clone, Debug)]
pub struct GradualDecline {
    upper_limit_kb: u64,
    lower_limit_kb: u64,
    step_kb: u64,
    interval: Duration,
}

impl GradualDecline {
    pub const DEFAULT_STEP_KB: u64 = 256;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            upper_limit_kb: config.upper_limit_kb(),
            lower_limit_kb: config.lower_limit_kb(),
            step_kb: Self::DEFAULT_STEP_KB,
            interval: Self::DEFAULT_INTERVAL,
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
}

impl Policy for GradualDecline {
    type State = DeclineState;

    const NAME: &'static str = "GradualDecline";

    fn initial_state(&self) -> DeclineState {
        DeclineState::Draining
    }

    /// As many whole steps as fit under the upper limit.
    fn prefill(&self) -> Option<Prefill> {
        Some(Prefill {
            block_kb: self.step_kb,
            blocks: self.upper_limit_kb / self.step_kb,
        })
    }

    fn step(
        &self,
        state: DeclineState,
        observation: &Observation,
        _rng: &mut dyn RngCore,
    ) -> Step<DeclineState> {
        match state {
            DeclineState::Draining if observation.total_kb > self.lower_limit_kb => {
                if observation.total_after_free_kb() <= self.lower_limit_kb {
                    Step::new(Action::Free, DeclineState::Steady, self.interval)
                        .with_event(Event::ReachedLowerLimit)
                } else {
                    Step::new(Action::Free, DeclineState::Draining, self.interval)
                }
            }
            DeclineState::Draining => Step::new(Action::Hold, DeclineState::Steady, self.interval)
                .with_event(Event::ReachedLowerLimit),
            DeclineState::Steady => Step::new(Action::Hold, DeclineState::Steady, self.interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::core::config::LimitRules;
    use crate::core::policies::testing::drive;

    fn policy(upper: i64, lower: i64) -> GradualDecline {
        let rules = LimitRules {
            lower_required: true,
            ordered: false,
        };
        GradualDecline::new(&ThresholdConfig::new(upper, lower, rules).unwrap())
    }

    #[test]
    fn test_prefill_rounds_down_to_whole_steps() {
        assert_eq!(
            policy(4000, 500).prefill(),
            Some(Prefill {
                block_kb: 256,
                blocks: 15
            })
        );
        assert_eq!(policy(4096, 500).prefill().unwrap().blocks, 16);
    }

    #[test]
    fn test_declines_then_settles() {
        let samples = drive(&policy(4000, 500), 40, 0);

        assert!(
            samples
                .iter()
                .tuple_windows()
                .all(|(a, b)| b.total_kb <= a.total_kb)
        );

        let settled = samples.last().unwrap().total_kb;
        assert!(settled <= 500);
        // 3840 KB prefilled, freed 256 KB at a time while above 500 KB.
        assert_eq!(settled, 256);
    }

    #[test]
    fn test_steady_state_is_idempotent() {
        let samples = drive(&policy(4000, 500), 40, 0);
        let first_steady = samples
            .iter()
            .position(|s| s.from == DeclineState::Steady)
            .unwrap();

        for sample in &samples[first_steady..] {
            assert_eq!(sample.step.action, Action::Hold);
            assert_eq!(sample.step.next, DeclineState::Steady);
            assert_eq!(sample.total_kb, 256);
            assert!(sample.step.events.is_empty());
        }
    }

    #[test]
    fn test_reaching_lower_limit_logged_once() {
        let samples = drive(&policy(4000, 500), 40, 0);

        let events: Vec<_> = samples.iter().flat_map(|s| s.step.events.clone()).collect();
        assert_eq!(events, vec![Event::ReachedLowerLimit]);
    }

    #[test]
    fn test_already_below_lower_limit_holds_immediately() {
        let samples = drive(&policy(400, 500), 3, 0);

        assert_eq!(samples[0].step.action, Action::Hold);
        assert_eq!(samples[0].step.next, DeclineState::Steady);
        assert_eq!(samples[0].total_kb, 256);
    }
}

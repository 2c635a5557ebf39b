use std::time::Duration;

use rand::RngCore;

use crate::core::config::ThresholdConfig;
use crate::core::domain::{Action, Event, Observation, Step, kb_to_bytes};
use crate::core::traits::policy::Policy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrowthState {
    Rising,
    HoldingAboveLimit,
}

/// An unterminated leak: allocates a fixed step every tick and never frees,
/// well past the upper limit.
#[derive(Clone, Debug)]
pub struct UnboundedGrowth {
    upper_limit_kb: u64,
    step_kb: u64,
    interval: Duration,
}

impl UnboundedGrowth {
    pub const DEFAULT_STEP_KB: u64 = 1024;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            upper_limit_kb: config.upper_limit_kb(),
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

impl Policy for UnboundedGrowth {
    type State = GrowthState;

    const NAME: &'static str = "UnboundedGrowth";

    fn initial_state(&self) -> GrowthState {
        GrowthState::Rising
    }

    fn step(
        &self,
        state: GrowthState,
        observation: &Observation,
        _rng: &mut dyn RngCore,
    ) -> Step<GrowthState> {
        let allocate = Action::Allocate {
            bytes: kb_to_bytes(self.step_kb),
        };

        let crosses = observation.total_kb + self.step_kb >= self.upper_limit_kb;
        match state {
            GrowthState::Rising if crosses => {
                Step::new(allocate, GrowthState::HoldingAboveLimit, self.interval)
                    .with_event(Event::CrossedUpperLimit)
            }
            _ => Step::new(allocate, state, self.interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::core::config::LimitRules;
    use crate::core::policies::testing::drive;

    fn policy() -> UnboundedGrowth {
        let rules = LimitRules {
            lower_required: true,
            ordered: false,
        };
        UnboundedGrowth::new(&ThresholdConfig::new(5000, 1000, rules).unwrap())
    }

    #[test]
    fn test_total_strictly_increases() {
        let samples = drive(&policy(), 20, 0);

        assert!(
            samples
                .iter()
                .tuple_windows()
                .all(|(a, b)| b.total_kb > a.total_kb)
        );
        assert!(samples.last().unwrap().total_kb > 5000);
    }

    #[test]
    fn test_crossing_is_logged_exactly_once() {
        let samples = drive(&policy(), 20, 0);

        let crossings: Vec<_> = samples
            .iter()
            .filter(|s| s.step.events.contains(&Event::CrossedUpperLimit))
            .collect();
        assert_eq!(crossings.len(), 1);
        // 5 x 1024 KB is the first total at or above 5000 KB.
        assert_eq!(crossings[0].total_kb, 5120);
        assert_eq!(crossings[0].from, GrowthState::Rising);
        assert_eq!(crossings[0].step.next, GrowthState::HoldingAboveLimit);
    }

    #[test]
    fn test_keeps_allocating_after_crossing() {
        let samples = drive(&policy(), 20, 0);

        for sample in samples.iter().skip(5) {
            assert_eq!(sample.from, GrowthState::HoldingAboveLimit);
            assert!(matches!(sample.step.action, Action::Allocate { .. }));
            assert!(sample.step.events.is_empty());
        }
    }

    #[test]
    fn test_step_size_and_interval_overrides() {
        let policy = policy()
            .with_step_kb(64)
            .with_interval(Duration::from_millis(10));

        let step = policy.step(GrowthState::Rising, &Observation::at(0), &mut rand::thread_rng());

        assert_eq!(step.action, Action::Allocate { bytes: 64 * 1024 });
        assert_eq!(step.pause, Duration::from_millis(10));
    }
}

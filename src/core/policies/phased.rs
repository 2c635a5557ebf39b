use std::time::Duration;

use rand::{Rng, RngCore};

use crate::core::config::ThresholdConfig;
use crate::core::domain::{Action, Event, Observation, Step, kb_to_bytes};
use crate::core::traits::policy::Policy;

/// Phases only ever advance: Rising, then Fluctuating, then Declining.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Rising,
    /// `since` is the loop time at which the phase was entered.
    Fluctuating { since: Duration },
    Declining,
}

impl Phase {
    pub fn ordinal(&self) -> u8 {
        match self {
            Phase::Rising => 0,
            Phase::Fluctuating { .. } => 1,
            Phase::Declining => 2,
        }
    }
}

/// Rises to the upper limit in small steps, keeps piling on blocks slightly
/// above the limit for `time_frame`, then frees one block per tick forever.
#[derive(Clone, Debug)]
pub struct Phased {
    upper_limit_kb: u64,
    time_frame: Duration,
    fluctuation_range_kb: u64,
    step_kb: u64,
    interval: Duration,
}

impl Phased {
    pub const DEFAULT_STEP_KB: u64 = 256;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            upper_limit_kb: config.upper_limit_kb(),
            time_frame: config.time_frame(),
            fluctuation_range_kb: config.fluctuation_range_kb(),
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

    fn fluctuation_kb(&self, rng: &mut dyn RngCore) -> u64 {
        let half = self.fluctuation_range_kb / 2;
        let offset = if half == 0 { 0 } else { rng.gen_range(0..half) };
        self.upper_limit_kb + offset
    }

    fn enter(
        &self,
        phase: Phase,
        event: Event,
        observation: &Observation,
        rng: &mut dyn RngCore,
    ) -> Step<Phase> {
        let mut step = self.step(phase, observation, rng);
        step.events.insert(0, event);
        step
    }
}

impl Policy for Phased {
    type State = Phase;

    const NAME: &'static str = "Phased";

    fn initial_state(&self) -> Phase {
        Phase::Rising
    }

    fn step(&self, state: Phase, observation: &Observation, rng: &mut dyn RngCore) -> Step<Phase> {
        match state {
            Phase::Rising if observation.total_kb >= self.upper_limit_kb => {
                let fluctuating = Phase::Fluctuating {
                    since: observation.elapsed,
                };
                self.enter(fluctuating, Event::EnteredFluctuation, observation, rng)
            }
            Phase::Rising => {
                let action = Action::Allocate {
                    bytes: kb_to_bytes(self.step_kb),
                };
                Step::new(action, Phase::Rising, self.interval)
            }
            Phase::Fluctuating { since }
                if observation.elapsed.saturating_sub(since) >= self.time_frame =>
            {
                self.enter(Phase::Declining, Event::EnteredDecline, observation, rng)
            }
            Phase::Fluctuating { .. } => {
                let action = Action::Allocate {
                    bytes: kb_to_bytes(self.fluctuation_kb(rng)),
                };
                Step::new(action, state, self.interval)
            }
            Phase::Declining => Step::new(Action::Free, Phase::Declining, self.interval)
                .with_event(Event::Decreased),
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::core::config::LimitRules;
    use crate::core::policies::testing::drive;

    fn policy(time_frame_secs: u64) -> Phased {
        let rules = LimitRules {
            lower_required: true,
            ordered: true,
        };
        let config = ThresholdConfig::new(3000, 1000, rules)
            .unwrap()
            .with_time_frame(Duration::from_secs(time_frame_secs))
            .with_fluctuation_range_kb(3000);
        Phased::new(&config).with_interval(Duration::from_secs(1))
    }

    #[test]
    fn test_phases_advance_monotonically() {
        let samples = drive(&policy(2), 40, 1);

        assert!(
            samples
                .iter()
                .map(|s| s.step.next.ordinal())
                .tuple_windows()
                .all(|(a, b)| b >= a)
        );
        assert_eq!(samples.last().unwrap().step.next, Phase::Declining);
    }

    #[test]
    fn test_rising_reaches_upper_limit_in_steps() {
        let samples = drive(&policy(2), 40, 1);

        let rising: Vec<_> = samples
            .iter()
            .filter(|s| s.step.next == Phase::Rising)
            .collect();
        // 12 x 256 KB = 3072 KB, the first total at or above 3000 KB.
        assert_eq!(rising.len(), 12);
        assert_eq!(rising.last().unwrap().total_kb, 3072);
    }

    #[test]
    fn test_fluctuation_lasts_time_frame_and_allocates_above_limit() {
        let samples = drive(&policy(2), 40, 1);

        let fluctuating: Vec<_> = samples
            .iter()
            .filter(|s| matches!(s.step.next, Phase::Fluctuating { .. }))
            .collect();
        assert!(!fluctuating.is_empty());
        for sample in &fluctuating {
            let Action::Allocate { bytes } = sample.step.action else {
                panic!("fluctuation must allocate, got {:?}", sample.step.action);
            };
            assert!(bytes >= 3000 * 1024);
            assert!(bytes < (3000 + 1500) * 1024);
        }

        let entered = fluctuating.first().unwrap().elapsed;
        let declined = samples
            .iter()
            .find(|s| s.step.events.contains(&Event::EnteredDecline))
            .unwrap();
        assert!(declined.elapsed - entered >= Duration::from_secs(2));
    }

    #[test]
    fn test_each_phase_entered_exactly_once() {
        let samples = drive(&policy(2), 40, 1);
        let events: Vec<_> = samples.iter().flat_map(|s| s.step.events.clone()).collect();

        assert_eq!(
            events.iter().filter(|e| **e == Event::EnteredFluctuation).count(),
            1
        );
        assert_eq!(
            events.iter().filter(|e| **e == Event::EnteredDecline).count(),
            1
        );
    }

    #[test]
    fn test_declining_frees_and_logs_every_tick() {
        let samples = drive(&policy(2), 40, 1);

        for sample in samples.iter().filter(|s| s.from == Phase::Declining) {
            assert_eq!(sample.step.action, Action::Free);
            assert_eq!(sample.step.events, vec![Event::Decreased]);
        }
    }

    #[test]
    fn test_fluctuation_ends_once_time_frame_has_passed() {
        let phase = Phase::Fluctuating {
            since: Duration::from_secs(5),
        };
        let observation = Observation::at(6000).with_last_block_kb(3000);
        let mut rng = rand::thread_rng();

        let early = policy(2).step(
            phase,
            &observation.with_elapsed(Duration::from_secs(6)),
            &mut rng,
        );
        let due = policy(2).step(
            phase,
            &observation.with_elapsed(Duration::from_secs(7)),
            &mut rng,
        );

        assert_eq!(early.next, phase);
        assert!(matches!(early.action, Action::Allocate { .. }));
        assert_eq!(due.next, Phase::Declining);
        assert_eq!(due.action, Action::Free);
        assert_eq!(due.events, vec![Event::EnteredDecline, Event::Decreased]);
    }

    #[test]
    fn test_decline_releases_blocks_newest_first() {
        let samples = drive(&policy(2), 40, 1);

        let mut allocated: Vec<u64> = samples
            .iter()
            .filter_map(|s| match s.step.action {
                Action::Allocate { bytes } => Some(bytes / 1024),
                _ => None,
            })
            .collect();
        let freed: Vec<u64> = samples
            .iter()
            .tuple_windows()
            .filter(|(_, s)| s.step.action == Action::Free)
            .map(|(prev, s)| prev.total_kb - s.total_kb)
            .collect();
        allocated.reverse();

        // Two fluctuation blocks sit on top of twelve 256 KB steps.
        assert_eq!(allocated.len(), 14);
        assert!(freed.len() > allocated.len());
        assert_eq!(freed[..allocated.len()], allocated[..]);
        assert!(freed[0] >= 3000 && freed[1] >= 3000);
        assert_eq!(freed[2], 256);
        assert_eq!(samples.last().unwrap().total_kb, 0);
    }

    #[test]
    fn test_zero_time_frame_skips_straight_to_decline() {
        let observation = Observation::at(3072).with_last_block_kb(256);

        let step = policy(0).step(Phase::Rising, &observation, &mut rand::thread_rng());

        assert_eq!(step.next, Phase::Declining);
        assert_eq!(step.action, Action::Free);
        assert_eq!(
            step.events,
            vec![Event::EnteredFluctuation, Event::EnteredDecline, Event::Decreased]
        );
    }

    #[test]
    fn test_tiny_fluctuation_range_allocates_exactly_the_limit() {
        let rules = LimitRules {
            lower_required: true,
            ordered: true,
        };
        let config = ThresholdConfig::new(3000, 1000, rules)
            .unwrap()
            .with_time_frame(Duration::from_secs(60))
            .with_fluctuation_range_kb(1);
        let phase = Phase::Fluctuating {
            since: Duration::ZERO,
        };

        let step =
            Phased::new(&config).step(phase, &Observation::at(3072), &mut rand::thread_rng());

        assert_eq!(step.action, Action::Allocate { bytes: 3000 * 1024 });
    }
}

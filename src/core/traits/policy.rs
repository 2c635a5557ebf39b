use std::fmt::Debug;

use rand::RngCore;

use crate::core::domain::{Observation, Prefill, Step};

/// A memory trajectory expressed as a state machine.
///
/// `step` must not touch memory or sleep: it only decides. The simulation
/// loop applies the returned action, commits `next` once the action has
/// succeeded, and waits `pause` before the following tick.
pub trait Policy: Debug + Send {
    type State: Copy + Debug + PartialEq + Send + 'static;

    /// Label used in event log lines.
    const NAME: &'static str;

    fn initial_state(&self) -> Self::State;

    /// Blocks committed before the first tick.
    fn prefill(&self) -> Option<Prefill> {
        None
    }

    fn step(
        &self,
        state: Self::State,
        observation: &Observation,
        rng: &mut dyn RngCore,
    ) -> Step<Self::State>;
}

//! The seven trajectories a worker can follow.

pub mod failure_probe;
pub mod gradual_decline;
pub mod near_limit;
pub mod oscillating;
pub mod phased;
pub mod random_walk;
pub mod unbounded_growth;

pub use failure_probe::{FailureProbe, ProbeState};
pub use gradual_decline::{DeclineState, GradualDecline};
pub use near_limit::{NearLimit, NearLimitState};
pub use oscillating::{Oscillating, OscillationState};
pub use phased::{Phase, Phased};
pub use random_walk::{RandomWalk, WalkState};
pub use unbounded_growth::{GrowthState, UnboundedGrowth};

use std::fmt;
use std::time::Duration;

use crate::constants::KIB;
use crate::core::config::LimitRules;

pub fn kb_to_bytes(kb: u64) -> u64 {
    kb.saturating_mul(KIB)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    UnboundedGrowth,
    Oscillating,
    GradualDecline,
    FailureProbe,
    NearLimit,
    RandomWalk,
    Phased,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 7] = [
        PolicyKind::UnboundedGrowth,
        PolicyKind::Oscillating,
        PolicyKind::GradualDecline,
        PolicyKind::FailureProbe,
        PolicyKind::NearLimit,
        PolicyKind::RandomWalk,
        PolicyKind::Phased,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::UnboundedGrowth => "unbounded-growth",
            PolicyKind::Oscillating => "oscillating",
            PolicyKind::GradualDecline => "gradual-decline",
            PolicyKind::FailureProbe => "failure-probe",
            PolicyKind::NearLimit => "near-limit",
            PolicyKind::RandomWalk => "random-walk",
            PolicyKind::Phased => "phased",
        }
    }

    /// Whether the worker starts a second, independent instance of itself.
    pub fn duplicates_at_startup(self) -> bool {
        matches!(
            self,
            PolicyKind::UnboundedGrowth
                | PolicyKind::Oscillating
                | PolicyKind::GradualDecline
                | PolicyKind::NearLimit
        )
    }

    /// Whether the worker reads a config file at all.
    pub fn reads_config(self) -> bool {
        !matches!(self, PolicyKind::RandomWalk)
    }

    /// Checks applied to the config file beyond a positive upper limit.
    pub fn limit_rules(self) -> LimitRules {
        match self {
            PolicyKind::UnboundedGrowth | PolicyKind::GradualDecline => LimitRules {
                lower_required: true,
                ordered: false,
            },
            PolicyKind::Oscillating | PolicyKind::Phased => LimitRules {
                lower_required: true,
                ordered: true,
            },
            PolicyKind::FailureProbe | PolicyKind::NearLimit | PolicyKind::RandomWalk => {
                LimitRules {
                    lower_required: false,
                    ordered: false,
                }
            }
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Commit a new block of `bytes` on top of the arena.
    Allocate { bytes: u64 },
    /// Release the most recent block whole. No-op on an empty arena.
    Free,
    Hold,
    /// Allocate, touch and immediately release `bytes`. Failure is expected
    /// and recoverable.
    Probe { bytes: u64 },
    /// A probe repeated after the previous attempt failed.
    RetryAfterFailure { bytes: u64 },
    /// End the run successfully.
    Finish,
}

impl Action {
    /// Whether an allocation failure while applying this action can be
    /// survived. Everything else treats it as fatal.
    pub fn tolerates_allocation_failure(&self) -> bool {
        matches!(self, Action::Probe { .. } | Action::RetryAfterFailure { .. })
    }
}

/// What applying an [`Action`] actually did to the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Allocated { bytes: u64 },
    Freed { bytes: u64 },
    Probed { bytes: u64 },
    Held,
    Failed { bytes: u64 },
}

/// Everything a policy may look at when deciding a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub total_kb: u64,
    /// Size of the block a `Free` would release.
    pub last_block_kb: Option<u64>,
    /// Time since the tick loop started.
    pub elapsed: Duration,
    pub last_attempt_failed: bool,
}

impl Observation {
    pub fn at(total_kb: u64) -> Self {
        Self {
            total_kb,
            last_block_kb: None,
            elapsed: Duration::ZERO,
            last_attempt_failed: false,
        }
    }

    pub fn with_last_block_kb(self, kb: u64) -> Self {
        Self {
            last_block_kb: Some(kb),
            ..self
        }
    }

    pub fn with_elapsed(self, elapsed: Duration) -> Self {
        Self { elapsed, ..self }
    }

    pub fn after_failure(self) -> Self {
        Self {
            last_attempt_failed: true,
            ..self
        }
    }

    /// Total once the most recent block has been released.
    pub fn total_after_free_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.last_block_kb.unwrap_or(0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step<S> {
    pub action: Action,
    pub next: S,
    pub pause: Duration,
    pub events: Vec<Event>,
}

impl<S> Step<S> {
    pub fn new(action: Action, next: S, pause: Duration) -> Self {
        Self {
            action,
            next,
            pause,
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }
}

/// Warm-up allocation performed before the tick loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prefill {
    pub block_kb: u64,
    pub blocks: u64,
}

/// A state-relevant transition worth an event log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    CrossedUpperLimit,
    DroppedBelowLowerLimit,
    ReachedLowerLimit,
    HoldingNearLimit,
    EnteredFluctuation,
    EnteredDecline,
    Decreased,
    TargetReached,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Event::CrossedUpperLimit => "memory usage crossed upper limit",
            Event::DroppedBelowLowerLimit => "memory usage dropped below lower limit",
            Event::ReachedLowerLimit => "memory usage has gradually declined below the lower limit",
            Event::HoldingNearLimit => "memory usage holding near upper limit",
            Event::EnteredFluctuation => "memory usage fluctuating above upper limit",
            Event::EnteredDecline => "memory usage entering continuous decline",
            Event::Decreased => "memory usage decreased",
            Event::TargetReached => "attempted allocations reached upper limit",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickReport<S> {
    pub tick: u64,
    pub elapsed: Duration,
    pub from: S,
    pub to: S,
    pub action: Action,
    pub applied: Applied,
    pub total_kb: u64,
    pub pause: Duration,
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Report<S> {
    Prefilled { blocks: u64, total_kb: u64 },
    Tick(TickReport<S>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Finished { ticks: u64, total_kb: u64 },
    Cancelled { ticks: u64, total_kb: u64 },
}

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::constants::KIB;
use crate::core::arena::BlockArena;
use crate::core::domain::{Action, Applied, Event, Observation, Outcome, Report, TickReport};
use crate::core::traits::allocator::{AllocationError, Allocator};
use crate::core::traits::event_log::EventLog;
use crate::core::traits::policy::Policy;

const ALLOCATION_FAILED: &str = "Memory allocation failed";

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("memory allocation failed while prefilling {blocks} blocks: {source}")]
    Prefill {
        blocks: u64,
        #[source]
        source: AllocationError,
    },
    #[error("memory allocation failed on tick {tick} with {total_kb} KB committed: {source}")]
    Allocation {
        tick: u64,
        total_kb: u64,
        #[source]
        source: AllocationError,
    },
}

/// Drives one policy against one arena until the policy finishes or the
/// shutdown signal fires.
#[derive(Debug)]
pub struct Simulation<P, A> {
    policy: P,
    arena: BlockArena<A>,
    event_log: Arc<dyn EventLog>,
    rng: StdRng,
    pid: u32,
    command: String,
}

impl<P: Policy, A: Allocator> Simulation<P, A> {
    pub fn new(policy: P, allocator: A, event_log: Arc<dyn EventLog>) -> Self {
        Self {
            policy,
            arena: BlockArena::new(allocator),
            event_log,
            rng: StdRng::from_entropy(),
            pid: std::process::id(),
            command: std::env::args().next().unwrap_or_default(),
        }
    }

    pub fn with_rng(self, rng: StdRng) -> Self {
        Self { rng, ..self }
    }

    /// Runs the prefill, then ticks: observe, step, apply, log, pause.
    ///
    /// Every tick is sent to `reports` when given; a closed receiver is
    /// ignored.
    #[tracing::instrument(skip_all, fields(policy = P::NAME))]
    pub async fn run(
        mut self,
        shutdown: CancellationToken,
        reports: Option<UnboundedSender<Report<P::State>>>,
    ) -> Result<Outcome, SimulationError> {
        self.prefill(&reports).await?;

        let started = Instant::now();
        let mut state = self.policy.initial_state();
        let mut last_attempt_failed = false;
        let mut tick = 0u64;

        loop {
            if shutdown.is_cancelled() {
                return Ok(self.cancelled(tick));
            }

            let observation = Observation {
                total_kb: self.arena.total_kb(),
                last_block_kb: self.arena.last_block_kb(),
                elapsed: started.elapsed(),
                last_attempt_failed,
            };
            let step = self.policy.step(state, &observation, &mut self.rng);
            tracing::debug!("Tick {}: {:?} -> {:?}", tick, state, step);

            if step.action == Action::Finish {
                self.record_events(&step.events).await;
                let total_kb = self.arena.total_kb();
                tracing::info!("Finished after {} ticks", tick);
                return Ok(Outcome::Finished {
                    ticks: tick,
                    total_kb,
                });
            }

            let applied = match self.apply(step.action) {
                Ok(applied) => applied,
                Err(source) if step.action.tolerates_allocation_failure() => {
                    tracing::warn!(
                        "Memory allocation failed with {} KB committed, will retry: {}",
                        self.arena.total_kb(),
                        source
                    );
                    Applied::Failed {
                        bytes: requested_bytes(step.action),
                    }
                }
                Err(source) => {
                    record(self.event_log.as_ref(), ALLOCATION_FAILED).await;
                    tracing::error!("{}: {}", ALLOCATION_FAILED, source);
                    return Err(SimulationError::Allocation {
                        tick,
                        total_kb: self.arena.total_kb(),
                        source,
                    });
                }
            };

            let from = state;
            last_attempt_failed = matches!(applied, Applied::Failed { .. });
            let events = if last_attempt_failed {
                Vec::new()
            } else {
                state = step.next;
                self.record_events(&step.events).await;
                step.events
            };
            self.trace_applied(applied);

            send(
                &reports,
                Report::Tick(TickReport {
                    tick,
                    elapsed: observation.elapsed,
                    from,
                    to: state,
                    action: step.action,
                    applied,
                    total_kb: self.arena.total_kb(),
                    pause: step.pause,
                    events,
                }),
            );
            tick += 1;

            tokio::select! {
                _ = tokio::time::sleep(step.pause) => {}
                _ = shutdown.cancelled() => return Ok(self.cancelled(tick)),
            }
        }
    }

    async fn prefill(
        &mut self,
        reports: &Option<UnboundedSender<Report<P::State>>>,
    ) -> Result<(), SimulationError> {
        let Some(prefill) = self.policy.prefill() else {
            return Ok(());
        };

        for _ in 0..prefill.blocks {
            if let Err(source) = self.arena.allocate_kb(prefill.block_kb) {
                record(self.event_log.as_ref(), ALLOCATION_FAILED).await;
                tracing::error!("{} during prefill: {}", ALLOCATION_FAILED, source);
                return Err(SimulationError::Prefill {
                    blocks: prefill.blocks,
                    source,
                });
            }
        }

        let total_kb = self.arena.total_kb();
        tracing::info!("Memory initially allocated to upper limit: {} KB", total_kb);
        send(
            reports,
            Report::Prefilled {
                blocks: prefill.blocks,
                total_kb,
            },
        );
        Ok(())
    }

    fn apply(&mut self, action: Action) -> Result<Applied, AllocationError> {
        match action {
            Action::Allocate { bytes } => {
                let handle = self.arena.allocate(bytes)?;
                tracing::debug!("Committed block #{} of {} bytes", handle.index, handle.bytes);
                Ok(Applied::Allocated {
                    bytes: handle.bytes,
                })
            }
            Action::Free => {
                let bytes = self.arena.pop_block().map_or(0, |block| block.len_bytes());
                Ok(Applied::Freed { bytes })
            }
            Action::Probe { bytes } | Action::RetryAfterFailure { bytes } => {
                self.arena.probe(bytes)?;
                Ok(Applied::Probed { bytes })
            }
            Action::Hold | Action::Finish => Ok(Applied::Held),
        }
    }

    fn trace_applied(&self, applied: Applied) {
        let total_kb = self.arena.total_kb();
        match applied {
            Applied::Allocated { bytes } => tracing::info!(
                "Allocated {} KB of memory, Total allocated: {} KB",
                bytes / KIB,
                total_kb
            ),
            Applied::Freed { bytes } => tracing::info!(
                "Freed {} KB of memory, Total allocated: {} KB",
                bytes / KIB,
                total_kb
            ),
            Applied::Probed { bytes } => {
                tracing::info!("Allocated and released {} KB of memory", bytes / KIB)
            }
            Applied::Held => tracing::info!("Holding, Total allocated: {} KB", total_kb),
            Applied::Failed { .. } => {}
        }
    }

    async fn record_events(&mut self, events: &[Event]) {
        let lines: Vec<String> = events
            .iter()
            .map(|event| {
                format!(
                    "{}: Process (PID: {}), command: {} - {}: {} KB",
                    P::NAME,
                    self.pid,
                    self.command,
                    event,
                    self.arena.total_kb()
                )
            })
            .collect();

        for line in &lines {
            record(self.event_log.as_ref(), line).await;
        }
    }

    fn cancelled(&self, ticks: u64) -> Outcome {
        tracing::info!("Cancelled after {} ticks", ticks);
        Outcome::Cancelled {
            ticks,
            total_kb: self.arena.total_kb(),
        }
    }
}

fn requested_bytes(action: Action) -> u64 {
    match action {
        Action::Allocate { bytes }
        | Action::Probe { bytes }
        | Action::RetryAfterFailure { bytes } => bytes,
        Action::Free | Action::Hold | Action::Finish => 0,
    }
}

async fn record(event_log: &dyn EventLog, message: &str) {
    if let Err(err) = event_log.record(message).await {
        tracing::warn!("Dropping event log line {:?}: {}", message, err);
    }
}

fn send<S>(reports: &Option<UnboundedSender<Report<S>>>, report: Report<S>) {
    if let Some(tx) = reports {
        let _ = tx.send(report);
    }
}

use std::panic;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::constants::DEFAULT_CONFIG_FILE;
use crate::core::config::{self, ConfigError, ThresholdConfig};
use crate::core::domain::{Outcome, PolicyKind};
use crate::core::policies::{
    FailureProbe, GradualDecline, NearLimit, Oscillating, Phased, RandomWalk, UnboundedGrowth,
};
use crate::core::simulation::{Simulation, SimulationError};
use crate::core::traits::duplicator::{Duplication, Duplicator};
use crate::core::traits::event_log::EventLog;
use crate::core::traits::policy::Policy;
use crate::native::allocator::SystemAllocator;
use crate::native::duplicator::ProcessDuplicator;
use crate::native::event_log::FileEventLog;

/// Conventional status of a process stopped by SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;
const FAILURE_EXIT_CODE: u8 = 1;

/// Memory-pressure worker. Runs until killed unless its policy finishes.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// `KEY=VALUE` file with UPPER_LIMIT, LOWER_LIMIT and TIME_FRAME in KB
    /// and seconds.
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Shared entry point of every worker binary.
pub async fn main(kind: PolicyKind) -> ExitCode {
    let args = Args::parse();
    init_tracing();
    set_panic_hook();

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping");
            interrupt.cancel();
        }
    });

    let duplicator = ProcessDuplicator::for_current_process();
    let event_log = Arc::new(FileEventLog::from_env());

    let result = run(kind, &args.config, &duplicator, event_log, shutdown).await;
    match &result {
        Ok(outcome) => tracing::info!("{} worker stopped: {:?}", kind, outcome),
        Err(err) => {
            tracing::error!("{} worker failed: {}", kind, err);
            eprintln!("Error: {err}");
        }
    }
    ExitCode::from(exit_status(&result))
}

/// 0 only for a run that finished on its own, 130 for an interrupted one,
/// 1 for any error.
pub fn exit_status(result: &Result<Outcome, HarnessError>) -> u8 {
    match result {
        Ok(Outcome::Finished { .. }) => 0,
        Ok(Outcome::Cancelled { .. }) => INTERRUPTED_EXIT_CODE,
        Err(_) => FAILURE_EXIT_CODE,
    }
}

/// Duplicates the worker if its policy asks for it, loads and validates the
/// config, then drives the policy until it finishes or `shutdown` fires.
#[tracing::instrument(skip(duplicator, event_log, shutdown))]
pub async fn run(
    kind: PolicyKind,
    config_path: &Path,
    duplicator: &dyn Duplicator,
    event_log: Arc<dyn EventLog>,
    shutdown: CancellationToken,
) -> Result<Outcome, HarnessError> {
    if kind.duplicates_at_startup() {
        match duplicator.duplicate().await {
            Ok(Duplication::Spawned { pid }) => tracing::debug!("Duplicate started: {:?}", pid),
            Ok(Duplication::Skipped) => {}
            Err(err) => tracing::warn!("Continuing without a duplicate: {}", err),
        }
    }

    if !kind.reads_config() {
        tracing::info!("Starting {} simulation", kind);
        return simulate(RandomWalk::new(), event_log, shutdown).await;
    }

    let config = config::load(config_path)
        .await?
        .validate(kind.limit_rules())?;
    log_start(kind, &config);

    match kind {
        PolicyKind::UnboundedGrowth => {
            simulate(UnboundedGrowth::new(&config), event_log, shutdown).await
        }
        PolicyKind::Oscillating => simulate(Oscillating::new(&config), event_log, shutdown).await,
        PolicyKind::GradualDecline => {
            simulate(GradualDecline::new(&config), event_log, shutdown).await
        }
        PolicyKind::FailureProbe => simulate(FailureProbe::new(&config), event_log, shutdown).await,
        PolicyKind::NearLimit => simulate(NearLimit::new(&config), event_log, shutdown).await,
        PolicyKind::RandomWalk => simulate(RandomWalk::new(), event_log, shutdown).await,
        PolicyKind::Phased => simulate(Phased::new(&config), event_log, shutdown).await,
    }
}

async fn simulate<P: Policy>(
    policy: P,
    event_log: Arc<dyn EventLog>,
    shutdown: CancellationToken,
) -> Result<Outcome, HarnessError> {
    let outcome = Simulation::new(policy, SystemAllocator, event_log)
        .run(shutdown, None)
        .await?;
    Ok(outcome)
}

fn log_start(kind: PolicyKind, config: &ThresholdConfig) {
    match kind {
        PolicyKind::FailureProbe | PolicyKind::NearLimit => tracing::info!(
            "Starting {} simulation with upper limit: {} KB",
            kind,
            config.upper_limit_kb()
        ),
        PolicyKind::Phased => tracing::info!(
            "Starting {} simulation with upper limit: {} KB, lower limit: {} KB, time frame: {:?}",
            kind,
            config.upper_limit_kb(),
            config.lower_limit_kb(),
            config.time_frame()
        ),
        _ => tracing::info!(
            "Starting {} simulation with upper limit: {} KB, lower limit: {} KB",
            kind,
            config.upper_limit_kb(),
            config.lower_limit_kb()
        ),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}

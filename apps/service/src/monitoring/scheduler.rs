use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::executor::MonitoringExecutor;
use crate::database::HealthCheck;
use crate::error::StoreError;

/// Delay between the end of one sweep and the start of the next
pub const DEFAULT_SWEEP_DELAY: Duration = Duration::from_secs(60);

/// Environments probed at the same time within a sweep
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 8;

/// Scheduler cadence settings
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub sweep_delay: Duration,
    pub max_concurrent_probes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_delay: DEFAULT_SWEEP_DELAY,
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

/// Lifecycle of the scheduler loop.
///
/// `Idle -> Sweeping -> Sleeping -> Sweeping ...`, ending in `Stopped`
/// from `Sweeping` or `Sleeping`. When shutdown is already requested as
/// `run` starts, the loop never sweeps and goes `Idle -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sweeping,
    Sleeping,
    Stopped,
}

/// Counts from one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

type TaskResult = (Uuid, Result<Result<HealthCheck, StoreError>, String>);

/// Monitoring scheduler - sweeps every environment on a fixed delay
///
/// The delay is measured from the end of a sweep, so the effective period
/// is the delay plus the sweep's own duration. That drift is accepted for
/// the environment counts this runs against.
///
/// Run one scheduler per store: instances do not coordinate, and two of
/// them produce duplicate history and duplicate broadcasts.
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(executor: Arc<MonitoringExecutor>, config: SchedulerConfig) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self { executor, config, state }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Follow state transitions
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run the scheduler on its own task
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Sweep, sleep, repeat until `shutdown` turns true (or its sender is
    /// dropped). A sweep in flight is abandoned; writes already made stay.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            delay_secs = self.config.sweep_delay.as_secs(),
            max_concurrent_probes = self.config.max_concurrent_probes,
            "Monitoring scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(SchedulerState::Sweeping);
            tokio::select! {
                _ = self.sweep_once() => {}
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("Shutdown requested, abandoning in-flight probes");
                    break;
                }
            }

            self.set_state(SchedulerState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.config.sweep_delay) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!("Monitoring scheduler stopped");
    }

    /// Check every environment once.
    ///
    /// Each environment runs in its own task: a store error or a panic in
    /// one is logged and counted, the rest carry on. Listing failures skip
    /// the sweep.
    pub async fn sweep_once(&self) -> SweepReport {
        let started = Instant::now();

        let environments = match self.executor.database().list_environments().await {
            Ok(environments) => environments,
            Err(e) => {
                error!(error = %e, "Failed to list environments, retrying next cycle");
                return SweepReport::default();
            }
        };

        let mut report = SweepReport { total: environments.len(), ..SweepReport::default() };
        debug!(environments = report.total, "Sweep started");

        let limit = self.config.max_concurrent_probes.max(1);
        let mut pending = environments.into_iter();
        // Dropping the set aborts whatever is still running
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        loop {
            while tasks.len() < limit {
                let Some(environment) = pending.next() else { break };
                let executor = Arc::clone(&self.executor);

                tasks.spawn(async move {
                    let result = AssertUnwindSafe(executor.check_environment(&environment))
                        .catch_unwind()
                        .await
                        .map_err(panic_message);
                    (environment.id, result)
                });
            }

            let Some(joined) = tasks.join_next().await else { break };

            match joined {
                Ok((_, Ok(Ok(_)))) => report.succeeded += 1,
                Ok((environment_id, Ok(Err(e)))) => {
                    report.failed += 1;
                    error!(%environment_id, error = %e, "Health check failed");
                }
                Ok((environment_id, Err(panic))) => {
                    report.failed += 1;
                    error!(%environment_id, error = %panic, "Health check panicked");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "Health check task did not complete");
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sweep finished"
        );

        report
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
        debug!(?state, "Scheduler state changed");
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

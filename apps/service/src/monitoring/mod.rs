/// Monitoring engine module
///
/// This module is responsible for:
/// - Probing environment URLs and classifying the outcome (`prober`)
/// - Recording and announcing single checks (`executor`)
/// - Sweeping all environments on a fixed delay (`scheduler`)
pub mod executor;
pub mod prober;
pub mod scheduler;
pub mod types;

pub use executor::MonitoringExecutor;
pub use prober::{HttpProber, Prober, classify};
pub use scheduler::{MonitoringScheduler, SchedulerConfig, SchedulerState, SweepReport};
pub use types::{HealthStatus, ProbeOutcome};

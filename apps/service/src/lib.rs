//! Beacon monitoring engine
//!
//! Probes the environments of monitored services on a fixed cadence,
//! records every result, and pushes status changes to live subscribers.

pub mod broadcast;
pub mod config;
pub mod database;
pub mod error;
pub mod monitoring;
pub mod pool;
pub mod validation;

pub use broadcast::SubscriptionRegistry;
pub use config::Config;
pub use database::{Database, DatabaseImpl, Environment, HealthCheck, Tier};
pub use monitoring::{HealthStatus, HttpProber, MonitoringExecutor, MonitoringScheduler, Prober};

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::prober::Prober;
use crate::broadcast::SubscriptionRegistry;
use crate::database::{Database, Environment, HealthCheck, NewHealthCheck};
use crate::error::{CheckError, StoreError};

/// Monitoring executor - probes one environment, records the result and
/// announces it to subscribers
///
/// Shared by the scheduler sweep and the on-demand path; holds no lock of
/// its own, so on-demand checks never wait on a running sweep.
pub struct MonitoringExecutor {
    prober: Arc<dyn Prober>,
    database: Arc<dyn Database>,
    registry: Arc<SubscriptionRegistry>,
}

impl MonitoringExecutor {
    /// Create a new monitoring executor
    pub fn new(
        prober: Arc<dyn Prober>,
        database: Arc<dyn Database>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self { prober, database, registry }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Probe, persist, publish
    pub async fn check_environment(&self, environment: &Environment) -> Result<HealthCheck, StoreError> {
        let outcome = self.prober.probe(&environment.url).await;
        let check = self
            .database
            .save_health_check(NewHealthCheck::new(environment.id, outcome))
            .await?;

        let delivered = self
            .registry
            .publish_status_update(
                environment.service_id,
                environment.id,
                check.status,
                check.response_time_ms.unwrap_or(0),
                check.checked_at,
            )
            .await;

        debug!(
            environment_id = %environment.id,
            status = %check.status,
            response_time_ms = ?check.response_time_ms,
            delivered,
            "Health check recorded"
        );

        Ok(check)
    }

    /// On-demand check of a single environment, outside the sweep cadence
    pub async fn perform_check(&self, environment_id: Uuid) -> Result<HealthCheck, CheckError> {
        let environment = self
            .database
            .get_environment(environment_id)
            .await?
            .ok_or(CheckError::EnvironmentNotFound(environment_id))?;

        Ok(self.check_environment(&environment).await?)
    }
}

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use libsql::{Row, params};
use uuid::Uuid;

use super::models::{Environment, HealthCheck, NewHealthCheck, i64_to_timestamp, timestamp_to_i64};
use crate::error::StoreError;
use crate::monitoring::types::HealthStatus;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Upper bound on a single history query
pub const MAX_HISTORY_LIMIT: usize = 500;

/// History length returned when the caller has no preference
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Record store for environments and their health check history
#[async_trait]
pub trait Database: Send + Sync {
    /// Get every environment
    async fn list_environments(&self) -> Result<Vec<Environment>, StoreError>;

    /// Get an environment by id
    async fn get_environment(&self, id: Uuid) -> Result<Option<Environment>, StoreError>;

    /// Insert an environment, or update tier and URL of an existing one
    async fn save_environment(&self, environment: &Environment) -> Result<(), StoreError>;

    /// Delete an environment and its history; returns whether it existed
    async fn delete_environment(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Append a health check, assigning its id and timestamp
    async fn save_health_check(&self, check: NewHealthCheck) -> Result<HealthCheck, StoreError>;

    /// Most recent health check of an environment
    async fn get_latest_health_check(&self, environment_id: Uuid) -> Result<Option<HealthCheck>, StoreError>;

    /// Newest-first history, `limit` clamped to `1..=MAX_HISTORY_LIMIT`
    async fn get_health_check_history(
        &self,
        environment_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HealthCheck>, StoreError>;
}

const ENVIRONMENT_COLUMNS: &str = "id, service_id, tier, url, created_at, updated_at";
const HEALTH_CHECK_COLUMNS: &str =
    "id, environment_id, status, response_time_ms, status_code, error_message, checked_at";

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        Ok(self.pool.get().await?)
    }
}

fn environment_from_row(row: &Row) -> Result<Environment, StoreError> {
    let id: String = row.get(0)?;
    let service_id: String = row.get(1)?;
    let tier: String = row.get(2)?;

    Ok(Environment {
        id: Uuid::parse_str(&id)?,
        service_id: Uuid::parse_str(&service_id)?,
        tier: tier.parse().map_err(StoreError::Corrupt)?,
        url: row.get(3)?,
        created_at: i64_to_timestamp(row.get(4)?)?,
        updated_at: i64_to_timestamp(row.get(5)?)?,
    })
}

fn health_check_from_row(row: &Row) -> Result<HealthCheck, StoreError> {
    let id: String = row.get(0)?;
    let environment_id: String = row.get(1)?;
    let status: String = row.get(2)?;

    Ok(HealthCheck {
        id: Uuid::parse_str(&id)?,
        environment_id: Uuid::parse_str(&environment_id)?,
        status: HealthStatus::from_db(&status),
        response_time_ms: row.get::<Option<i64>>(3)?.map(|v| v as u64),
        status_code: row.get::<Option<i64>>(4)?.map(|v| v as u16),
        error_message: row.get(5)?,
        checked_at: i64_to_timestamp(row.get(6)?)?,
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_environments(&self) -> Result<Vec<Environment>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {ENVIRONMENT_COLUMNS} FROM environments ORDER BY created_at"),
                (),
            )
            .await?;

        let mut environments = Vec::new();
        while let Some(row) = rows.next().await? {
            environments.push(environment_from_row(&row)?);
        }

        Ok(environments)
    }

    async fn get_environment(&self, id: Uuid) -> Result<Option<Environment>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {ENVIRONMENT_COLUMNS} FROM environments WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(environment_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_environment(&self, environment: &Environment) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO environments (id, service_id, tier, url, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                tier = excluded.tier,
                url = excluded.url,
                updated_at = excluded.updated_at",
            params![
                environment.id.to_string(),
                environment.service_id.to_string(),
                environment.tier.as_str(),
                environment.url.clone(),
                timestamp_to_i64(environment.created_at),
                timestamp_to_i64(environment.updated_at)
            ],
        )
        .await?;

        Ok(())
    }

    async fn delete_environment(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.get_conn().await?;

        // health_checks rows are removed via ON DELETE CASCADE
        let affected = conn
            .execute("DELETE FROM environments WHERE id = ?", params![id.to_string()])
            .await?;

        Ok(affected > 0)
    }

    async fn save_health_check(&self, check: NewHealthCheck) -> Result<HealthCheck, StoreError> {
        let conn = self.get_conn().await?;
        // Stored at millisecond precision
        let record = check.into_record(Utc::now().trunc_subsecs(3));

        conn.execute(
            "INSERT INTO health_checks (id, environment_id, status, response_time_ms, status_code, error_message, checked_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id.to_string(),
                record.environment_id.to_string(),
                record.status.as_str(),
                record.response_time_ms.map(|v| v as i64),
                record.status_code.map(|v| v as i64),
                record.error_message.clone(),
                timestamp_to_i64(record.checked_at)
            ],
        )
        .await?;

        Ok(record)
    }

    async fn get_latest_health_check(&self, environment_id: Uuid) -> Result<Option<HealthCheck>, StoreError> {
        Ok(self.get_health_check_history(environment_id, 1).await?.into_iter().next())
    }

    async fn get_health_check_history(
        &self,
        environment_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HealthCheck>, StoreError> {
        let conn = self.get_conn().await?;
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {HEALTH_CHECK_COLUMNS} FROM health_checks
                     WHERE environment_id = ?
                     ORDER BY checked_at DESC, rowid DESC
                     LIMIT ?"
                ),
                params![environment_id.to_string(), limit as i64],
            )
            .await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            checks.push(health_check_from_row(&row)?);
        }

        Ok(checks)
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::monitoring::types::{HealthStatus, ProbeOutcome};

/// Deployment tier of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Development,
    Staging,
    Production,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Development => "development",
            Tier::Staging => "staging",
            Tier::Production => "production",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Tier::Development),
            "staging" => Ok(Tier::Staging),
            "production" | "prod" => Ok(Tier::Production),
            other => Err(format!("unknown tier '{other}' (expected development, staging or production)")),
        }
    }
}

/// Environment model - one monitored URL of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: Uuid,
    pub service_id: Uuid,
    pub tier: Tier,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Environment {
    /// Create a new environment
    pub fn new(service_id: Uuid, tier: Tier, url: impl Into<String>) -> Self {
        let now = Utc::now().trunc_subsecs(3);
        Self {
            id: Uuid::new_v4(),
            service_id,
            tier,
            url: url.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// HealthCheck model - one persisted probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub status: HealthStatus,
    pub response_time_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// A health check that has not been stored yet; the store assigns
/// identity and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHealthCheck {
    pub environment_id: Uuid,
    pub outcome: ProbeOutcome,
}

impl NewHealthCheck {
    pub fn new(environment_id: Uuid, outcome: ProbeOutcome) -> Self {
        Self { environment_id, outcome }
    }

    /// Stamp the record with a fresh identity and the given time
    pub fn into_record(self, checked_at: DateTime<Utc>) -> HealthCheck {
        HealthCheck {
            id: Uuid::new_v4(),
            environment_id: self.environment_id,
            status: self.outcome.status,
            response_time_ms: self.outcome.response_time_ms,
            status_code: self.outcome.status_code,
            error_message: self.outcome.error_message,
            checked_at,
        }
    }
}

/// Convert a timestamp to Unix milliseconds for storage
pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a timestamp
pub fn i64_to_timestamp(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {millis}")))
}

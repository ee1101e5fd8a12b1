use serde::{Deserialize, Serialize};

/// Health verdict of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
            HealthStatus::Unknown => "unknown",
        }
    }

    /// Parse the stored representation; anything unrecognised is `Unknown`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "healthy" => HealthStatus::Healthy,
            "degraded" => HealthStatus::Degraded,
            "down" => HealthStatus::Down,
            _ => HealthStatus::Unknown,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Classified verdict
    pub status: HealthStatus,

    /// Response time in milliseconds
    pub response_time_ms: Option<u64>,

    /// HTTP status code (absent when no response was received)
    pub status_code: Option<u16>,

    /// Error message (absent for healthy probes)
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// A response arrived and passed every check
    pub fn healthy(response_time_ms: u64, status_code: u16) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time_ms: Some(response_time_ms),
            status_code: Some(status_code),
            error_message: None,
        }
    }

    /// A response arrived but was a client error or too slow
    pub fn degraded(response_time_ms: u64, status_code: u16, error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            response_time_ms: Some(response_time_ms),
            status_code: Some(status_code),
            error_message: Some(error.into()),
        }
    }

    /// The endpoint is considered unavailable
    pub fn down(response_time_ms: u64, status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Down,
            response_time_ms: Some(response_time_ms),
            status_code,
            error_message: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&HealthStatus::Down).unwrap(), "\"down\"");
        assert_eq!(HealthStatus::from_db("degraded"), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_db("garbage"), HealthStatus::Unknown);
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
    }
}

//! Error types shared across the monitoring engine.

use deadpool::managed::PoolError;
use thiserror::Error;
use uuid::Uuid;

/// Why a probe never produced an HTTP status.
///
/// Never leaves the prober: both variants are folded into a `down`
/// outcome so the failure lands in the health-check history.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Request timed out")]
    Timeout,

    /// DNS, connect, TLS and every other transport-level failure.
    #[error("{0}")]
    Transport(String),
}

/// Failures of the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(#[from] libsql::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<PoolError<libsql::Error>> for StoreError {
    fn from(err: PoolError<libsql::Error>) -> Self {
        match err {
            PoolError::Backend(e) => StoreError::Unavailable(e),
            other => StoreError::Pool(other.to_string()),
        }
    }
}

impl From<uuid::Error> for StoreError {
    fn from(err: uuid::Error) -> Self {
        StoreError::Corrupt(format!("invalid uuid: {err}"))
    }
}

/// Failures of the on-demand check path.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Environment {0} not found")]
    EnvironmentNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-connection delivery failure during a publish pass.
///
/// Swallowed by the registry and turned into an implicit disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("Subscriber outbox closed")]
    SendFailed,

    #[error("Subscriber did not accept the message in time")]
    SendTimedOut,
}

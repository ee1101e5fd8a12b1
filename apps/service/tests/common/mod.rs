//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc;
use uuid::Uuid;

use beacon_service::broadcast::ServerMessage;
use beacon_service::database::{self, Database, DatabaseImpl, Environment, HealthCheck, NewHealthCheck, Tier};
use beacon_service::error::StoreError;
use beacon_service::monitoring::{ProbeOutcome, Prober};

/// Fresh on-disk database; keep the `TempDir` alive for the test's duration
pub async fn create_test_database() -> Result<(Arc<DatabaseImpl>, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let pool = database::open(&db_path.to_string_lossy()).await?;

    Ok((Arc::new(DatabaseImpl::new_from_pool(pool)), temp_dir))
}

/// Store an environment pointing at `url`
pub async fn add_environment(database: &dyn Database, url: &str) -> Result<Environment> {
    let environment = Environment::new(Uuid::new_v4(), Tier::Production, url);
    database.save_environment(&environment).await?;
    Ok(environment)
}

/// Prober answering from a table, with optional panics and stalls per URL
#[derive(Default)]
pub struct StubProber {
    outcomes: HashMap<String, ProbeOutcome>,
    panics: HashSet<String>,
    stalls: HashSet<String>,
}

impl StubProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, outcome: ProbeOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    pub fn panic_on(mut self, url: &str) -> Self {
        self.panics.insert(url.to_string());
        self
    }

    pub fn stall_on(mut self, url: &str) -> Self {
        self.stalls.insert(url.to_string());
        self
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        if self.panics.contains(url) {
            panic!("probe library blew up for {url}");
        }
        if self.stalls.contains(url) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.outcomes.get(url).cloned().unwrap_or_else(|| ProbeOutcome::healthy(12, 200))
    }
}

/// Store wrapper that fails on demand
pub struct FlakyStore {
    inner: Arc<DatabaseImpl>,
    fail_saves_for: HashSet<Uuid>,
    fail_listing: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<DatabaseImpl>) -> Self {
        Self { inner, fail_saves_for: HashSet::new(), fail_listing: AtomicBool::new(false) }
    }

    pub fn fail_saves_for(mut self, environment_id: Uuid) -> Self {
        self.fail_saves_for.insert(environment_id);
        self
    }

    pub fn set_listing_outage(&self, down: bool) {
        self.fail_listing.store(down, Ordering::SeqCst);
    }

    fn outage() -> StoreError {
        StoreError::Pool("simulated outage".to_string())
    }
}

#[async_trait]
impl Database for FlakyStore {
    async fn list_environments(&self) -> Result<Vec<Environment>, StoreError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.list_environments().await
    }

    async fn get_environment(&self, id: Uuid) -> Result<Option<Environment>, StoreError> {
        self.inner.get_environment(id).await
    }

    async fn save_environment(&self, environment: &Environment) -> Result<(), StoreError> {
        self.inner.save_environment(environment).await
    }

    async fn delete_environment(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_environment(id).await
    }

    async fn save_health_check(&self, check: NewHealthCheck) -> Result<HealthCheck, StoreError> {
        if self.fail_saves_for.contains(&check.environment_id) {
            return Err(Self::outage());
        }
        self.inner.save_health_check(check).await
    }

    async fn get_latest_health_check(&self, environment_id: Uuid) -> Result<Option<HealthCheck>, StoreError> {
        self.inner.get_latest_health_check(environment_id).await
    }

    async fn get_health_check_history(
        &self,
        environment_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HealthCheck>, StoreError> {
        self.inner.get_health_check_history(environment_id, limit).await
    }
}

/// Everything currently queued in a subscriber outbox
pub fn drain(inbox: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = inbox.try_recv() {
        messages.push(message);
    }
    messages
}

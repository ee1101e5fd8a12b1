//! Record store behaviour against a real LibSQL file

mod common;

use anyhow::Result;
use uuid::Uuid;

use beacon_service::database::{Database, Environment, NewHealthCheck, Tier};
use beacon_service::monitoring::{HealthStatus, ProbeOutcome};

use common::{add_environment, create_test_database};

#[tokio::test]
async fn test_environment_round_trip_and_update() -> Result<()> {
    let (database, _dir) = create_test_database().await?;
    let service_id = Uuid::new_v4();

    let mut environment = Environment::new(service_id, Tier::Staging, "https://staging.example.com");
    database.save_environment(&environment).await?;

    let stored = database.get_environment(environment.id).await?.expect("environment stored");
    assert_eq!(stored.service_id, service_id);
    assert_eq!(stored.tier, Tier::Staging);
    assert_eq!(stored.url, "https://staging.example.com");

    // Saving again updates in place
    environment.url = "https://staging2.example.com".to_string();
    environment.tier = Tier::Production;
    database.save_environment(&environment).await?;

    let all = database.list_environments().await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].url, "https://staging2.example.com");
    assert_eq!(all[0].tier, Tier::Production);

    assert!(database.get_environment(Uuid::new_v4()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_history_is_newest_first_and_limited() -> Result<()> {
    let (database, _dir) = create_test_database().await?;
    let environment = add_environment(database.as_ref(), "https://example.com").await?;

    let first = database
        .save_health_check(NewHealthCheck::new(environment.id, ProbeOutcome::healthy(100, 200)))
        .await?;
    let second = database
        .save_health_check(NewHealthCheck::new(environment.id, ProbeOutcome::degraded(110, 404, "Client error: 404")))
        .await?;
    let third = database
        .save_health_check(NewHealthCheck::new(environment.id, ProbeOutcome::down(120, Some(503), "Server error: 503")))
        .await?;

    let history = database.get_health_check_history(environment.id, 10).await?;
    let ids: Vec<Uuid> = history.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    assert_eq!(history[0].status, HealthStatus::Down);
    assert_eq!(history[0].status_code, Some(503));
    assert_eq!(history[0].error_message.as_deref(), Some("Server error: 503"));
    assert_eq!(history[2].error_message, None);

    assert_eq!(database.get_health_check_history(environment.id, 2).await?.len(), 2);
    // Zero is clamped up to one, huge limits down to the maximum
    assert_eq!(database.get_health_check_history(environment.id, 0).await?.len(), 1);
    assert_eq!(database.get_health_check_history(environment.id, 10_000).await?.len(), 3);

    let latest = database.get_latest_health_check(environment.id).await?.expect("latest check");
    assert_eq!(latest.id, third.id);
    Ok(())
}

#[tokio::test]
async fn test_latest_is_none_without_history() -> Result<()> {
    let (database, _dir) = create_test_database().await?;
    let environment = add_environment(database.as_ref(), "https://example.com").await?;

    assert!(database.get_latest_health_check(environment.id).await?.is_none());
    assert!(database.get_health_check_history(environment.id, 100).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_health_check_requires_existing_environment() -> Result<()> {
    let (database, _dir) = create_test_database().await?;

    let result = database
        .save_health_check(NewHealthCheck::new(Uuid::new_v4(), ProbeOutcome::healthy(5, 200)))
        .await;

    assert!(result.is_err(), "orphan health check must be rejected");
    Ok(())
}

#[tokio::test]
async fn test_delete_environment_cascades_history() -> Result<()> {
    let (database, _dir) = create_test_database().await?;
    let environment = add_environment(database.as_ref(), "https://example.com").await?;
    database
        .save_health_check(NewHealthCheck::new(environment.id, ProbeOutcome::healthy(5, 200)))
        .await?;

    assert!(database.delete_environment(environment.id).await?);
    assert!(!database.delete_environment(environment.id).await?);

    assert!(database.get_environment(environment.id).await?.is_none());
    assert!(database.get_health_check_history(environment.id, 100).await?.is_empty());
    Ok(())
}

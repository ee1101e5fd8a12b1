use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use beacon_service::database::{self, DEFAULT_HISTORY_LIMIT};
use beacon_service::validation::validate_environment_url;
use beacon_service::{
    Config, Database, DatabaseImpl, Environment, HttpProber, MonitoringExecutor, SubscriptionRegistry, Tier,
};

/// Operator tooling for the beacon record store
#[derive(Debug, Parser)]
#[command(name = "beacon-service", version, about)]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/beacon/config.toml)
    #[arg(short, long, env = "BEACON_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage monitored environments
    #[command(subcommand)]
    Env(EnvCommand),

    /// Probe one environment now and record the result
    Check { environment_id: Uuid },

    /// Show recorded health checks, newest first
    History {
        environment_id: Uuid,
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Show the most recent health check
    Latest { environment_id: Uuid },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum EnvCommand {
    /// Register an environment URL for a service
    Add {
        #[arg(long)]
        service_id: Uuid,
        #[arg(long)]
        tier: Tier,
        #[arg(long)]
        url: String,
    },

    /// List every environment
    List,

    /// Delete an environment together with its history
    Remove { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;

    match cli.command {
        Command::Config => println!("{config}"),
        Command::Env(EnvCommand::Add { service_id, tier, url }) => {
            validate_environment_url(&url).to_result()?;
            let database = open_store(&config).await?;
            let environment = Environment::new(service_id, tier, url);
            database.save_environment(&environment).await?;
            println!("{}", serde_json::to_string_pretty(&environment)?);
        }
        Command::Env(EnvCommand::List) => {
            let database = open_store(&config).await?;
            for environment in database.list_environments().await? {
                println!(
                    "{}  service={}  {:<11}  {}",
                    environment.id, environment.service_id, environment.tier, environment.url
                );
            }
        }
        Command::Env(EnvCommand::Remove { id }) => {
            let database = open_store(&config).await?;
            if !database.delete_environment(id).await? {
                bail!("Environment {id} not found");
            }
            println!("Removed environment {id}");
        }
        Command::Check { environment_id } => {
            let database = open_store(&config).await?;
            let prober = HttpProber::new(config.monitoring.timeout(), config.monitoring.slow_threshold_ms)?;
            // No live subscribers in this process; the server pushes its own checks
            let registry = Arc::new(SubscriptionRegistry::default());
            let executor = MonitoringExecutor::new(Arc::new(prober), database, registry);

            let check = executor.perform_check(environment_id).await?;
            println!("{}", serde_json::to_string_pretty(&check)?);
        }
        Command::History { environment_id, limit } => {
            let database = open_store(&config).await?;
            let history = database.get_health_check_history(environment_id, limit).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Command::Latest { environment_id } => {
            let database = open_store(&config).await?;
            match database.get_latest_health_check(environment_id).await? {
                Some(check) => println!("{}", serde_json::to_string_pretty(&check)?),
                None => bail!("No health checks found for environment {environment_id}"),
            }
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn Database>> {
    let pool = database::open(&config.database.path).await?;
    Ok(Arc::new(DatabaseImpl::new_from_pool(pool)))
}

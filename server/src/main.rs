mod config;
mod gate;
mod http;
mod login;
mod session;
mod views;

use std::{net::IpAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use platform_authn::HttpIdentityGateway;
use platform_authz::AccessPolicy;
use platform_db::{EmployeeStore, connect, ensure_database};
use platform_obs::{ObsConfig, init_tracing};
use products_directory::Directory;
use tracing::info;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
    session::SessionCookies,
};

#[derive(Parser, Debug)]
#[command(name = "staff-directory", version, about = "Internal staff directory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Create the employee table if it does not exist.
    Migrate,
    /// Insert the sample employees into an empty table.
    Seed,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    host: IpAddr,
    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Do not create or seed the employee table on start-up")]
    skip_bootstrap: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::Migrate => run_migrate(config).await,
        Command::Seed => run_seed(config).await,
    }
}

async fn open_store(config: &AppConfig) -> Result<EmployeeStore> {
    info!(database = %config.database.redacted_url(), table = %config.table, "connecting");
    ensure_database(&config.database)
        .await
        .context("failed to create the database")?;
    let pool = connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    Ok(EmployeeStore::new(pool, config.table.clone()))
}

async fn run_migrate(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    store.ensure_table().await?;
    info!(table = %store.table(), "employee table ready");
    Ok(())
}

async fn run_seed(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    bootstrap(&store).await
}

async fn bootstrap(store: &EmployeeStore) -> Result<()> {
    store.ensure_table().await?;
    let inserted = store.seed_samples().await?;
    info!(inserted, table = %store.table(), "sample employees seeded");
    Ok(())
}

async fn run_server(cmd: ServeCommand, config: AppConfig) -> Result<()> {
    let gateway = HttpIdentityGateway::new(config.require_gateway()?.clone())
        .context("failed to build identity gateway client")?;
    let store = open_store(&config).await?;
    if !cmd.skip_bootstrap {
        bootstrap(&store).await?;
    }

    let state = AppState {
        directory: Directory::new(store),
        gateway: Arc::new(gateway),
        policy: Arc::new(AccessPolicy::default()),
        cookies: SessionCookies::new(config.cookie_secure),
    };
    http::serve((&cmd).into(), state).await
}

mod backend;
mod journal;
mod pacer;
mod pipeline;
mod problem;
mod review_sheet;
mod router;
mod source;
mod telemetry;

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use paro_storage::Database;
use paro_util::{load_env_file, AppConfig};
use tracing::info;

use crate::pipeline::Pipeline;

/// Walking distances from employee homes to the AVE and SM sites.
#[derive(Debug, Parser)]
#[command(name = "paro-app", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Run one batch, print the report as JSON and exit.
    Batch,
    /// Apply database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            info!(stage = "storage", url = %config.database_url, "migrations applied");
            Ok(())
        }
        Command::Batch => {
            let pipeline = Pipeline::from_config(&config, &database).await?;
            let report = pipeline.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Serve => {
            let pipeline = Pipeline::from_config(&config, &database).await?;
            let state = router::AppState::new(metrics, database, pipeline, &config);

            let addr: SocketAddr = config.bind_addr;
            info!(
                stage = "app",
                %addr,
                env = %config.environment.as_str(),
                provider = config.maps.provider().as_str(),
                "starting HTTP server"
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router::app_router(state))
                .await
                .map_err(|err| err.into())
        }
    }
}

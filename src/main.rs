//! # Transcript intake service
//!
//! `serve` (default) runs pending migrations, seeds the local directory fixture when
//! configured, and serves the API. `migrate` only applies migrations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use tokio_util::sync::CancellationToken;
use transcript_intake::{
    config::{AppConfig, ConfigLoader},
    crypto::CryptoKey,
    db::init_pool,
    seeds::seed_directory_from_path,
    server::run_server,
    telemetry,
};

#[derive(Parser)]
#[command(name = "transcript-intake", version, about = "Meeting transcript ingestion and matching service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;
    telemetry::init_tracing(&config).context("failed to initialize tracing")?;

    if let Ok(redacted) = config.redacted_json() {
        tracing::info!(profile = %config.profile, config = %redacted, "Configuration loaded");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => migrate(&config).await,
        Command::Serve => serve(config).await,
    }
}

async fn migrate(config: &AppConfig) -> Result<()> {
    let db = init_pool(config).await?;
    Migrator::up(&db, None)
        .await
        .context("failed to apply migrations")?;
    tracing::info!("Migrations applied");
    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    let db = init_pool(&config).await?;
    Migrator::up(&db, None)
        .await
        .context("failed to apply migrations")?;

    if let Some(path) = config.seed_directory_path.as_deref() {
        if config.is_local_profile() {
            let key = CryptoKey::new(config.crypto_key.clone().unwrap_or_default())
                .context("invalid crypto key")?;
            seed_directory_from_path(&db, &key, path).await?;
        } else {
            tracing::warn!(
                profile = %config.profile,
                "Ignoring INTAKE_SEED_DIRECTORY_PATH outside local profiles"
            );
        }
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        signal_token.cancel();
    });

    run_server(config, db, shutdown).await
}

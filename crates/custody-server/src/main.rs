//! custody server binary.
//!
//! Reads `custody.toml` (or the path given with `--config`) layered with
//! `CUSTODY_*` environment variables, opens the SQLite store and either
//! serves the JSON API, applies migrations, or runs one expiry scan.
//!
//! ```text
//! custody serve
//! custody --config /etc/custody.toml migrate
//! CUSTODY_DIRECTORY__ALERT_RECIPIENTS=admin-1,admin-2 custody scan
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use custody_server::{AppContext, ServerConfig};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Custody ledger server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "custody.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Default)]
enum Command {
  /// Serve the HTTP API and run the background expiry scanner (default).
  #[default]
  Serve,
  /// Apply pending schema migrations and exit.
  Migrate,
  /// Run a single expiry scan and print its report.
  Scan,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = ServerConfig::load(&cli.config)?;

  // Opening the context applies migrations.
  let ctx = AppContext::open(config).await?;

  match cli.command.unwrap_or_default() {
    Command::Serve => serve(ctx).await,
    Command::Migrate => {
      let version = ctx.store.schema_version().await?;
      tracing::info!(version, "schema up to date");
      ctx.shutdown().await;
      Ok(())
    }
    Command::Scan => {
      let report = ctx.scanner.run_once().await?;
      println!("{}", serde_json::to_string_pretty(&report)?);
      ctx.shutdown().await;
      Ok(())
    }
  }
}

async fn serve(mut ctx: AppContext) -> anyhow::Result<()> {
  let address = ctx.config.address();
  let app = ctx.router();

  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  ctx.start();
  let served = axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error");

  ctx.shutdown().await;
  served
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}

//! `handover` binary.
//!
//! Reads `handover.toml` (or the path given with `--config`), opens the
//! parked-extension ledger, and either runs one reassignment, serves the
//! JSON API over HTTP, or inspects the ledger.

mod backend;
mod config;
mod gateway;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use clap::{Args, Parser, Subcommand};
use handover_store_sqlite::SqliteLedger;
use handover_workflow::{ReassignmentRequest, Reassigner};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::{
  backend::Routed,
  config::{HostConfig, expand_tilde},
  gateway::HttpGateway,
};

#[derive(Parser)]
#[command(author, version, about = "Hand a phone line over to a new owner")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "handover.toml", env = "HANDOVER_CONFIG")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run one reassignment and print its outcome as JSON.
  Run(RunArgs),
  /// Serve the JSON API.
  Serve,
  /// List parked extensions recorded in the ledger.
  Parked {
    /// Include released records.
    #[arg(long)]
    all: bool,
  },
  /// Mark a parked extension as released so it can be handed out again.
  Release { extension: String },
}

#[derive(Args)]
struct RunArgs {
  #[arg(long)]
  line:          String,
  #[arg(long)]
  device:        String,
  #[arg(long)]
  building:      i64,
  /// External phone number mask of the line appearance.
  #[arg(long)]
  mask:          String,
  #[arg(long)]
  current_owner: Option<String>,
  #[arg(long)]
  new_owner:     String,
  #[arg(long)]
  label:         String,
  /// Display name shown on the line.
  #[arg(long)]
  name:          String,
  /// Look everything up and log every decision, but change nothing.
  #[arg(long)]
  dry_run:       bool,
}

impl From<RunArgs> for ReassignmentRequest {
  fn from(args: RunArgs) -> Self {
    Self {
      line_id:       args.line,
      device_id:     args.device,
      building_id:   args.building,
      external_mask: args.mask,
      current_owner: args.current_owner,
      new_owner:     args.new_owner,
      label:         args.label,
      display_name:  args.name,
    }
  }
}

type HostReassigner = Reassigner<Routed<HttpGateway>, Routed<HttpGateway>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let mut host = HostConfig::load(&cli.config)?;

  let ledger_path = expand_tilde(&host.ledger_path);
  if let Some(parent) = ledger_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create ledger directory {parent:?}"))?;
  }
  let ledger = SqliteLedger::open(&ledger_path)
    .await
    .with_context(|| format!("failed to open ledger at {ledger_path:?}"))?;

  match cli.command {
    Command::Run(args) => {
      if args.dry_run {
        host.workflow.read_only = true;
      }
      let reassigner = reassigner(&host, ledger)?;
      let request = ReassignmentRequest::from(args);
      let outcome = reassigner.run(&request).await?;
      println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Command::Serve => serve(&host, ledger).await?,
    Command::Parked { all } => {
      let entries = if all { ledger.history().await? } else { ledger.active().await? };
      if entries.is_empty() {
        info!("no parked extensions");
      }
      for entry in entries {
        println!("{}", serde_json::to_string(&entry)?);
      }
    }
    Command::Release { extension } => {
      let entry = ledger.release(&extension).await?;
      println!("{}", serde_json::to_string_pretty(&entry)?);
    }
  }

  Ok(())
}

fn reassigner(host: &HostConfig, ledger: SqliteLedger) -> anyhow::Result<HostReassigner> {
  let gateway = HttpGateway::new(&host.gateway).context("failed to build HTTP client")?;
  let backend = Routed::new(gateway, ledger, host.workflow.systems.audit.clone());
  let reassigner = Reassigner::new(backend.clone(), backend, host.workflow.clone())?;
  Ok(reassigner)
}

async fn serve(host: &HostConfig, ledger: SqliteLedger) -> anyhow::Result<()> {
  if host.workflow.read_only {
    warn!("serving in read-only mode; no reassignment will change anything");
  }

  let reassigner = Arc::new(reassigner(host, ledger)?);
  let app = Router::new()
    .nest("/api", handover_api::api_router(reassigner))
    .layer(TraceLayer::new_for_http());

  let address = host.address()?;
  info!("Listening on http://{address}");
  let listener = TcpListener::bind(address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  info!("server shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "failed to listen for Ctrl+C; serving until killed");
    std::future::pending::<()>().await;
  }
  info!("received Ctrl+C, shutting down");
}

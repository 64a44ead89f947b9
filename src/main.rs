//! Bounty Review Server
//!
//! Winner allocation and submission review for sponsor dashboards

use std::sync::Arc;

use bounty_review::config::Config;
use bounty_review::notify::LogNotifier;
use bounty_review::store::SubmissionStore;
use bounty_review::BountyDashboardController;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "review-server", about = "Bounty review server")]
struct Args {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Override the configured bind host
    #[arg(long, env = "REVIEW_HOST")]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long, env = "REVIEW_PORT")]
    port: Option<u16>,

    /// Override the configured database path
    #[arg(long, env = "REVIEW_DATABASE")]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_from(&args.config)?;

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let db_path = args.database.unwrap_or(config.database.path);

    info!("Starting Bounty Review Server");

    let store = Arc::new(if db_path == ":memory:" {
        SubmissionStore::in_memory()?
    } else {
        SubmissionStore::open(&db_path)?
    });
    info!("Storage initialized at {}", db_path);

    let controller = Arc::new(BountyDashboardController::new(
        store,
        Arc::new(LogNotifier),
        config.pagination.limits(),
    ));

    bounty_review::server::run_server(&host, port, controller).await?;

    Ok(())
}

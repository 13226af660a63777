//! Keiba race data integrator
//!
//! Merges per-race scrape fragments into one integrated record per race,
//! maintains the trainer index, and serves integrated records read-only.

mod cli;
mod config;
mod error;
mod fragments;
mod history;
mod integrator;
mod marks;
mod normalize;
mod race_id;
mod routes;
mod storage;
mod trainer;
mod types;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::storage::IntegratedStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_integrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Integrate { race_id } => cli::run_integrate(race_id).await,
        Commands::Batch { date, concurrency } => cli::run_batch(date, concurrency).await,
        Commands::BuildIndex { dry_run } => cli::run_build_index(dry_run).await,
        Commands::IndexInfo => cli::run_index_info(),
        Commands::Serve { host, port } => run_server(host, port).await,
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Serving integrated races from {}", config.paths.data_root.display());

    let state = Arc::new(AppState {
        store: IntegratedStore::new(&config.paths.data_root),
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

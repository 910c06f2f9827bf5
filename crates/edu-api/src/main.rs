//! # edu-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Configuration comes from flags or the
//! environment; see [`edu_api::config::Cli`].

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use edu_api::config::Cli;
use edu_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_app_config();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Initialize database pool (optional; absent means in-memory only).
    let db_pool = edu_api::db::init_pool(config.database_url.as_deref())
        .await
        .inspect_err(|e| tracing::error!("Database initialization failed: {e}"))
        .context("database initialization")?;

    let port = config.port;
    let state = AppState::try_with_config(config, db_pool)
        .context("invalid token or password configuration")?;

    state
        .hydrate_from_db()
        .await
        .inspect_err(|e| tracing::error!("Database hydration failed: {e}"))
        .context("database hydration")?;

    let app = edu_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("edu-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

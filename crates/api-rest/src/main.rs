//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the sweep scheduler.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the HTTP
//! surface (with OpenAPI/Swagger UI). The workspace's main `convia-run`
//! binary runs the server together with the daily maintenance sweeps.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convia_core::config::{sweep_interval_from_env_value, DEFAULT_DATABASE_URL};
use convia_core::CoreConfig;

/// Main entry point for the standalone Convia REST API server.
///
/// # Environment Variables
/// - `CONVIA_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `DATABASE_URL`: SQLite database URL (default: "sqlite://convia.db")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the database cannot be opened or migrated, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("convia_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CONVIA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
    let sweep_interval =
        sweep_interval_from_env_value(std::env::var("CONVIA_SWEEP_INTERVAL_SECS").ok())?;
    let cfg = CoreConfig::new(database_url, sweep_interval)?;

    tracing::info!("-- Starting Convia REST API on {}", addr);

    let pool = convia_core::db::connect(cfg.database_url()).await?;
    convia_core::db::migrate(&pool).await?;

    let app = api_rest::router(pool);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

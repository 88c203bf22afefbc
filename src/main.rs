//! Main Convia binary: REST API plus the maintenance sweep scheduler.

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convia_core::config::{sweep_interval_from_env_value, DEFAULT_DATABASE_URL};
use convia_core::{CoreConfig, SweepService};

/// Main entry point for the Convia billing back office.
///
/// Starts the REST server and a background loop that promotes scheduled
/// avenants and expires overdue contracts on a fixed interval.
///
/// # Environment Variables
/// - `CONVIA_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `DATABASE_URL`: SQLite database URL (default: "sqlite://convia.db")
/// - `CONVIA_SWEEP_INTERVAL_SECS`: Sweep cadence in seconds (default: daily)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("convia=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("convia_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CONVIA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
    let sweep_interval =
        sweep_interval_from_env_value(std::env::var("CONVIA_SWEEP_INTERVAL_SECS").ok())?;
    let cfg = CoreConfig::new(database_url, sweep_interval)?;

    tracing::info!("++ Starting Convia REST on {}", rest_addr);
    tracing::info!(
        "++ Sweep scheduler every {}s",
        cfg.sweep_interval().as_secs()
    );

    let pool = convia_core::db::connect(cfg.database_url()).await?;
    convia_core::db::migrate(&pool).await?;

    let sweeps = SweepService::new(pool.clone());
    let interval = cfg.sweep_interval();
    tokio::spawn(run_sweeps(sweeps, interval));

    let app = api_rest::router(pool);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("++ Convia stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM. Dropping out of `main` afterwards
/// also tears down the spawned sweep loop.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

/// Background sweep loop. A failed round is logged and retried on the
/// next tick; the loop itself never exits.
async fn run_sweeps(sweeps: SweepService, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = sweeps.run_all().await {
            tracing::error!(error = %err, "maintenance sweep failed");
        }
    }
}

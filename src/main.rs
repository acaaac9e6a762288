use std::sync::Arc;

use sentinel_api::app::{app, AppState};
use sentinel_api::startup::{run_startup_checks, StartupError};
use sentinel_api::{auth, config, default_checker, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET_KEY, etc.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Arc::new(config::config().clone());
    tracing::info!("Starting Sentinel API in {} mode", config.environment);

    let checker = default_checker(Arc::clone(&config));
    let report = match run_startup_checks(&checker).await {
        Ok(report) => report,
        Err(StartupError::CriticalChecksFailed { report }) => {
            for failure in report.critical_failures() {
                tracing::error!(check = %failure.name, "{}", failure.message);
            }
            anyhow::bail!(
                "refusing to serve: {} critical startup check(s) failed",
                report.failed_critical
            );
        }
    };

    let state = AppState::new(Arc::clone(&config), report, auth::shared());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Sentinel API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

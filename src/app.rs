use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::JwtSecretManager;
use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::startup::StartupReport;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub report: Arc<StartupReport>,
    pub jwt: Arc<JwtSecretManager>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, report: StartupReport, jwt: Arc<JwtSecretManager>) -> Self {
        Self {
            config,
            report: Arc::new(report),
            jwt,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::root))
        .merge(health_routes())
        // Protected
        .merge(system_routes(state.clone()))
        .fallback(handlers::not_found)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    use handlers::health;

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/jwt", get(health::jwt))
}

fn system_routes(state: AppState) -> Router<AppState> {
    use handlers::system;

    Router::new()
        .route("/api/system/startup", get(system::startup_report))
        .route("/api/system/whoami", get(system::whoami))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

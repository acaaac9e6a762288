pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod startup;

use std::sync::Arc;

use crate::config::{AppConfig, EnvSource, ProcessEnv};
use crate::startup::{CheckContext, StartupChecker};

/// Startup checker wired to the process environment and the shared JWT secret manager.
pub fn default_checker(config: Arc<AppConfig>) -> StartupChecker {
    let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
    StartupChecker::new(CheckContext::new(config, env, auth::shared()))
}

/// `RUST_LOG`-driven subscriber, `info` by default.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

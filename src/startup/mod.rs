//! Dependency probes that run once before the server accepts traffic.
//!
//! Checks are grouped into four sub-checkers ([`EnvironmentChecker`],
//! [`SystemChecker`], [`DatabaseChecker`], [`ServiceChecker`]) and executed
//! sequentially by [`StartupChecker`]. Any failed check marked critical stops
//! the boot; non-critical failures are logged and reported.

pub mod database;
pub mod environment;
pub mod service;
pub mod system;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::{JwtSecretError, JwtSecretManager};
use crate::config::{AppConfig, EnvSource, Environment};

pub use database::DatabaseChecker;
pub use environment::EnvironmentChecker;
pub use service::ServiceChecker;
pub use system::SystemChecker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupCheckResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    #[serde(default = "default_critical")]
    pub critical: bool,
    #[serde(default)]
    pub duration_ms: f64,
}

fn default_critical() -> bool {
    true
}

impl StartupCheckResult {
    pub fn passed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            message: message.into(),
            critical: true,
            duration_ms: 0.0,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::passed(name, message)
        }
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_secs_f64() * 1000.0;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupReport {
    pub success: bool,
    pub environment: Environment,
    pub skipped: bool,
    pub total_checks: usize,
    pub passed: usize,
    pub failed_critical: usize,
    pub failed_non_critical: usize,
    pub duration_ms: f64,
    pub results: Vec<StartupCheckResult>,
}

impl StartupReport {
    pub fn from_results(environment: Environment, results: Vec<StartupCheckResult>, elapsed: Duration) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        let failed_critical = results.iter().filter(|r| !r.success && r.critical).count();
        let failed_non_critical = results.iter().filter(|r| !r.success && !r.critical).count();

        Self {
            success: failed_critical == 0,
            environment,
            skipped: false,
            total_checks: results.len(),
            passed,
            failed_critical,
            failed_non_critical,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            results,
        }
    }

    pub fn skipped(environment: Environment) -> Self {
        Self {
            skipped: true,
            ..Self::from_results(environment, Vec::new(), Duration::ZERO)
        }
    }

    pub fn critical_failures(&self) -> impl Iterator<Item = &StartupCheckResult> {
        self.results.iter().filter(|r| !r.success && r.critical)
    }

    pub fn critical_failure_summary(&self) -> String {
        self.critical_failures()
            .map(|r| format!("{}: {}", r.name, r.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("clickhouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Jwt(#[from] JwtSecretError),
}

impl CheckError {
    pub fn failed(message: impl Into<String>) -> Self {
        CheckError::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{} critical startup check(s) failed: {}", .report.failed_critical, .report.critical_failure_summary())]
    CriticalChecksFailed { report: Box<StartupReport> },
}

/// Everything a check may need. Built once per run.
#[derive(Clone)]
pub struct CheckContext {
    pub config: Arc<AppConfig>,
    pub env: Arc<dyn EnvSource>,
    pub jwt: Arc<JwtSecretManager>,
    pub http: reqwest::Client,
}

impl CheckContext {
    pub fn new(config: Arc<AppConfig>, env: Arc<dyn EnvSource>, jwt: Arc<JwtSecretManager>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.startup.check_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, env, jwt, http }
    }
}

#[async_trait]
pub trait StartupCheck: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_critical(&self, _config: &AppConfig) -> bool {
        true
    }

    /// Slow checks are skipped in fast startup mode.
    fn is_slow(&self) -> bool {
        false
    }

    /// Returns a human-readable success message.
    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError>;
}

pub struct StartupChecker {
    ctx: CheckContext,
    checks: Vec<Box<dyn StartupCheck>>,
}

impl StartupChecker {
    pub fn new(ctx: CheckContext) -> Self {
        let mut checks = EnvironmentChecker::checks();
        checks.extend(SystemChecker::checks());
        checks.extend(DatabaseChecker::checks());
        checks.extend(ServiceChecker::checks());
        Self::with_checks(ctx, checks)
    }

    pub fn with_checks(ctx: CheckContext, checks: Vec<Box<dyn StartupCheck>>) -> Self {
        Self { ctx, checks }
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn context(&self) -> &CheckContext {
        &self.ctx
    }

    /// Run every registered check in order and aggregate the results.
    pub async fn run_all_checks(&self) -> StartupReport {
        let config = &self.ctx.config;
        let started = Instant::now();
        let mut results = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let result = self.run_check(check.as_ref()).await;
            log_result(&result);
            results.push(result);
        }

        let report = StartupReport::from_results(config.environment, results, started.elapsed());
        info!(
            passed = report.passed,
            total = report.total_checks,
            failed_critical = report.failed_critical,
            failed_non_critical = report.failed_non_critical,
            duration_ms = report.duration_ms,
            "Startup checks completed"
        );
        report
    }

    async fn run_check(&self, check: &dyn StartupCheck) -> StartupCheckResult {
        let config = &self.ctx.config;
        let name = check.name();
        let critical = check.is_critical(config);

        if config.startup.fast_mode && check.is_slow() {
            return StartupCheckResult::passed(name, "Skipped in fast startup mode").with_critical(critical);
        }

        let timeout = config.startup.check_timeout();
        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, check.run(&self.ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CheckError::Timeout(timeout)),
        };

        let result = match outcome {
            Ok(message) => StartupCheckResult::passed(name, message),
            Err(e) => StartupCheckResult::failed(name, e.to_string()),
        };
        result.with_critical(critical).with_duration(started.elapsed())
    }
}

fn log_result(result: &StartupCheckResult) {
    if result.success {
        info!(check = %result.name, duration_ms = result.duration_ms, "✓ {}", result.message);
    } else if result.critical {
        error!(check = %result.name, duration_ms = result.duration_ms, "✗ {}", result.message);
    } else {
        warn!(check = %result.name, duration_ms = result.duration_ms, "⚠ {}", result.message);
    }
}

/// Boot gate: run all checks unless disabled, and fail if anything critical failed.
pub async fn run_startup_checks(checker: &StartupChecker) -> Result<StartupReport, StartupError> {
    let config = &checker.context().config;
    if config.startup.skip_checks {
        warn!("Startup checks skipped (SKIP_STARTUP_CHECKS)");
        return Ok(StartupReport::skipped(config.environment));
    }

    let report = checker.run_all_checks().await;
    if report.success {
        Ok(report)
    } else {
        Err(StartupError::CriticalChecksFailed {
            report: Box::new(report),
        })
    }
}

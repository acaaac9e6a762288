use async_trait::async_trait;
use url::Url;

use super::{CheckContext, CheckError, StartupCheck};
use crate::config::{AppConfig, Environment};

/// Required variables and configuration sanity.
pub struct EnvironmentChecker;

impl EnvironmentChecker {
    pub fn checks() -> Vec<Box<dyn StartupCheck>> {
        vec![Box::new(EnvironmentVariables), Box::new(Configuration)]
    }
}

pub struct EnvironmentVariables;

#[async_trait]
impl StartupCheck for EnvironmentVariables {
    fn name(&self) -> &'static str {
        "environment_variables"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let missing = missing_variables(ctx);
        if missing.is_empty() {
            Ok(format!(
                "All required environment variables present for {}",
                ctx.config.environment
            ))
        } else {
            Err(CheckError::failed(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )))
        }
    }
}

fn missing_variables(ctx: &CheckContext) -> Vec<String> {
    let config = &ctx.config;
    let services = &config.services;
    let mut missing = Vec::new();

    if config.environment != Environment::Testing && services.database_url.is_none() {
        missing.push("DATABASE_URL".to_string());
    }

    if config.environment.is_deployed() {
        let jwt_vars = ctx.jwt.checked_vars(config.environment);
        if !jwt_vars.iter().any(|v| ctx.env.get_non_empty(v).is_some()) {
            missing.push(format!("one of [{}]", jwt_vars.join(", ")));
        }
    }

    if config.startup.redis_required && services.redis_url.is_none() {
        missing.push("REDIS_URL".to_string());
    }
    if config.startup.clickhouse_required && services.clickhouse_url.is_none() {
        missing.push("CLICKHOUSE_URL".to_string());
    }

    missing
}

pub struct Configuration;

#[async_trait]
impl StartupCheck for Configuration {
    fn name(&self) -> &'static str {
        "configuration"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let problems = configuration_problems(&ctx.config);
        if problems.is_empty() {
            Ok("Configuration is valid".to_string())
        } else {
            Err(CheckError::failed(format!(
                "Invalid configuration: {}",
                problems.join("; ")
            )))
        }
    }
}

const MAX_JWT_EXPIRY_MINUTES: i64 = 60 * 24 * 365;

pub(crate) fn configuration_problems(config: &AppConfig) -> Vec<String> {
    let mut problems = Vec::new();

    if config.server.port == 0 {
        problems.push("server port must be non-zero".to_string());
    }
    if config.startup.check_timeout_secs == 0 {
        problems.push("STARTUP_CHECK_TIMEOUT_SECS must be positive".to_string());
    }
    if config.security.jwt_expiry_minutes <= 0 {
        problems.push("JWT_EXPIRY_MINUTES must be positive".to_string());
    } else if config.security.jwt_expiry_minutes > MAX_JWT_EXPIRY_MINUTES {
        problems.push(format!(
            "JWT_EXPIRY_MINUTES must be at most {} (one year)",
            MAX_JWT_EXPIRY_MINUTES
        ));
    }

    for (label, raw) in config.services.urls() {
        let allowed: &[&str] = match label {
            "database" => &["postgres", "postgresql"],
            "redis" => &["redis", "rediss"],
            _ => &["http", "https"],
        };
        match Url::parse(raw) {
            Ok(url) if !allowed.contains(&url.scheme()) => problems.push(format!(
                "{} URL scheme '{}' is not one of {}",
                label,
                url.scheme(),
                allowed.join("/")
            )),
            Ok(url) if url.port() == Some(0) => {
                problems.push(format!("{} URL has port 0", label))
            }
            Ok(url) if url.host_str().map_or(true, str::is_empty) => {
                problems.push(format!("{} URL has no host", label))
            }
            Ok(_) => {}
            Err(e) => problems.push(format!("{} URL does not parse: {}", label, e)),
        }
    }

    problems
}

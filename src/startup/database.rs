use async_trait::async_trait;
use deadpool_redis::{redis, Config as RedisConfig, Runtime};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashSet;
use url::Url;

use super::{CheckContext, CheckError, StartupCheck};
use crate::config::{AppConfig, Environment};

/// Datastores: Postgres (connectivity and schema), Redis, ClickHouse.
pub struct DatabaseChecker;

impl DatabaseChecker {
    pub fn checks() -> Vec<Box<dyn StartupCheck>> {
        vec![
            Box::new(DatabaseConnection),
            Box::new(DatabaseSchema),
            Box::new(RedisCheck),
            Box::new(ClickHouseCheck),
        ]
    }
}

async fn connect_postgres(ctx: &CheckContext, url: &str) -> Result<PgPool, CheckError> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ctx.config.startup.check_timeout())
        .connect(url)
        .await?;
    Ok(pool)
}

pub struct DatabaseConnection;

#[async_trait]
impl StartupCheck for DatabaseConnection {
    fn name(&self) -> &'static str {
        "database_connection"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let Some(url) = ctx.config.services.database_url.as_deref() else {
            if ctx.config.environment == Environment::Testing {
                return Ok("No database configured for testing".to_string());
            }
            return Err(CheckError::failed("DATABASE_URL is not set"));
        };

        let pool = connect_postgres(ctx, url).await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        let version: String = sqlx::query_scalar("SHOW server_version")
            .fetch_one(&pool)
            .await?;
        pool.close().await;

        Ok(format!("PostgreSQL {} reachable", version))
    }
}

pub struct DatabaseSchema;

#[async_trait]
impl StartupCheck for DatabaseSchema {
    fn name(&self) -> &'static str {
        "database_schema"
    }

    fn is_slow(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let required = &ctx.config.startup.required_tables;
        if required.is_empty() {
            return Ok("No required tables configured".to_string());
        }
        let Some(url) = ctx.config.services.database_url.as_deref() else {
            return Err(CheckError::failed("DATABASE_URL is not set"));
        };

        let pool = connect_postgres(ctx, url).await?;
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = ANY(current_schemas(false))",
        )
        .fetch_all(&pool)
        .await?;
        pool.close().await;

        let missing = missing_tables(required, &present);
        if missing.is_empty() {
            Ok(format!("All {} required tables present", required.len()))
        } else {
            Err(CheckError::failed(format!(
                "Missing tables: {}",
                missing.join(", ")
            )))
        }
    }
}

fn missing_tables<'a>(required: &'a [String], present: &[String]) -> Vec<&'a str> {
    let present: HashSet<&str> = present.iter().map(String::as_str).collect();
    required
        .iter()
        .map(String::as_str)
        .filter(|t| !present.contains(t))
        .collect()
}

pub struct RedisCheck;

#[async_trait]
impl StartupCheck for RedisCheck {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_critical(&self, config: &AppConfig) -> bool {
        config.startup.redis_required
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let Some(raw) = ctx.config.services.redis_url.as_deref() else {
            if ctx.config.startup.redis_required {
                return Err(CheckError::failed("REDIS_URL is not set"));
            }
            return Ok("Redis not configured; skipping".to_string());
        };

        let pool = RedisConfig::from_url(raw)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CheckError::failed(format!("Invalid REDIS_URL: {}", e)))?;
        let mut conn = pool
            .get()
            .await
            .map_err(|e| CheckError::failed(format!("Redis connection failed: {}", e)))?;

        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply != "PONG" {
            return Err(CheckError::failed(format!("Unexpected PING reply: {}", reply)));
        }
        Ok(format!("Redis at {} responded to PING", redacted_host(raw)))
    }
}

/// `host:port` of a service URL, without credentials.
fn redacted_host(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => url.scheme().to_string(),
        },
        Err(_) => "configured URL".to_string(),
    }
}

pub struct ClickHouseCheck;

#[async_trait]
impl StartupCheck for ClickHouseCheck {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn is_critical(&self, config: &AppConfig) -> bool {
        config.startup.clickhouse_required
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let services = &ctx.config.services;
        let Some(base) = services.clickhouse_url.as_deref() else {
            if ctx.config.startup.clickhouse_required {
                return Err(CheckError::failed("CLICKHOUSE_URL is not set"));
            }
            return Ok("ClickHouse not configured; skipping".to_string());
        };
        let base = base.trim_end_matches('/');

        let ping = ctx
            .http
            .get(format!("{}/ping", base))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        if ping.trim() != "Ok." {
            return Err(CheckError::failed(format!("Unexpected ClickHouse ping reply: {}", ping.trim())));
        }

        let mut client = clickhouse::Client::default()
            .with_url(base)
            .with_compression(clickhouse::Compression::None);
        if let Some(user) = &services.clickhouse_user {
            client = client.with_user(user);
        }
        if let Some(password) = &services.clickhouse_password {
            client = client.with_password(password);
        }
        client.query("SELECT 1").execute().await?;

        Ok(format!("ClickHouse at {} answered SELECT 1", redacted_host(base)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtSecretManager;
    use crate::config::{EnvSource, MapEnv};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn ctx(config: AppConfig) -> CheckContext {
        let env: Arc<dyn EnvSource> = Arc::new(MapEnv::new());
        CheckContext::new(Arc::new(config), env.clone(), Arc::new(JwtSecretManager::new(env)))
    }

    #[test]
    fn host_is_reported_without_credentials() {
        assert_eq!(redacted_host("redis://:hunter2@cache.internal:6380/3"), "cache.internal:6380");
        assert_eq!(redacted_host("https://default:pw@ch.internal"), "ch.internal");
        assert_eq!(redacted_host("not a url"), "configured URL");
    }

    #[test]
    fn reports_missing_tables_in_order() {
        let required = vec!["users".to_string(), "threads".to_string(), "runs".to_string()];
        let present = vec!["runs".to_string(), "users".to_string()];
        assert_eq!(missing_tables(&required, &present), vec!["threads"]);
    }

    #[tokio::test]
    async fn redis_optional_when_unconfigured() {
        let config = AppConfig::development();
        assert!(!RedisCheck.is_critical(&config));
        assert!(RedisCheck.run(&ctx(config)).await.is_ok());

        let config = AppConfig::production();
        assert!(RedisCheck.run(&ctx(config)).await.is_err());
    }

    #[tokio::test]
    async fn clickhouse_optional_when_unconfigured() {
        assert!(ClickHouseCheck.run(&ctx(AppConfig::development())).await.is_ok());
        assert!(ClickHouseCheck.run(&ctx(AppConfig::production())).await.is_err());
    }

    #[tokio::test]
    async fn testing_without_database_passes() {
        assert!(DatabaseConnection.run(&ctx(AppConfig::testing())).await.is_ok());
        assert!(DatabaseConnection.run(&ctx(AppConfig::development())).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_postgres_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = AppConfig::development();
        config.startup.check_timeout_secs = 2;
        config.services.database_url = Some(format!("postgres://u:p@127.0.0.1:{}/app", port));
        let err = DatabaseConnection.run(&ctx(config)).await.unwrap_err();
        assert!(matches!(err, CheckError::Database(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn schema_check_without_tables_passes() {
        let message = DatabaseSchema.run(&ctx(AppConfig::development())).await.unwrap();
        assert_eq!(message, "No required tables configured");
    }
}

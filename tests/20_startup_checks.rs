mod common;

use anyhow::Result;

use sentinel_api::config::MapEnv;
use sentinel_api::startup::{run_startup_checks, StartupChecker, StartupError};

fn testing_env() -> MapEnv {
    MapEnv::new()
        .with("ENVIRONMENT", "testing")
        .with("STARTUP_WRITABLE_DIRS", "")
}

fn result<'a>(report: &'a sentinel_api::startup::StartupReport, name: &str) -> &'a sentinel_api::startup::StartupCheckResult {
    report
        .results
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("no result for {}", name))
}

#[tokio::test]
async fn testing_environment_boots_without_services() -> Result<()> {
    let checker = StartupChecker::new(common::context(testing_env()));
    let report = run_startup_checks(&checker).await?;

    assert!(report.success);
    assert_eq!(report.total_checks, 11);
    assert_eq!(
        report.passed + report.failed_critical + report.failed_non_critical,
        report.total_checks
    );
    // Fast mode is on by default for testing.
    assert_eq!(result(&report, "network_connectivity").message, "Skipped in fast startup mode");
    assert!(result(&report, "jwt_secret").message.contains("development fallback"));
    // No LLM key: reported, but not critical outside deployed environments.
    let llm = result(&report, "llm_providers");
    assert!(!llm.success);
    assert!(!llm.critical);
    Ok(())
}

#[tokio::test]
async fn redis_probe_authenticates_and_pings() -> Result<()> {
    let addr = common::spawn_mock_redis(Some("hunter2")).await?;
    let env = testing_env()
        .with("REDIS_REQUIRED", "true")
        .with("REDIS_URL", format!("redis://:hunter2@{}/2", addr));

    let report = StartupChecker::new(common::context(env)).run_all_checks().await;
    let redis = result(&report, "redis");
    assert!(redis.success, "{}", redis.message);
    assert!(redis.critical);
    assert!(redis.message.contains("responded to PING"));
    Ok(())
}

#[tokio::test]
async fn redis_wrong_password_is_a_critical_failure_when_required() -> Result<()> {
    let addr = common::spawn_mock_redis(Some("hunter2")).await?;
    let env = testing_env()
        .with("REDIS_REQUIRED", "true")
        .with("REDIS_URL", format!("redis://:wrong@{}", addr));

    let checker = StartupChecker::new(common::context(env));
    match run_startup_checks(&checker).await {
        Err(StartupError::CriticalChecksFailed { report }) => {
            let redis = result(&report, "redis");
            assert!(!redis.success);
            assert!(redis.message.starts_with("Redis connection failed"), "{}", redis.message);
            assert_eq!(report.failed_critical, 1);
        }
        Ok(_) => panic!("expected redis failure to block startup"),
    }
    Ok(())
}

#[tokio::test]
async fn redis_password_is_percent_decoded() -> Result<()> {
    let addr = common::spawn_mock_redis(Some("p@ss:word")).await?;
    let env = testing_env()
        .with("REDIS_REQUIRED", "true")
        .with("REDIS_URL", format!("redis://:p%40ss%3Aword@{}", addr));

    let report = StartupChecker::new(common::context(env)).run_all_checks().await;
    let redis = result(&report, "redis");
    assert!(redis.success, "{}", redis.message);
    assert!(!redis.message.contains("p%40ss"));
    Ok(())
}

#[tokio::test]
async fn optional_redis_failure_does_not_block_startup() -> Result<()> {
    let addr = common::spawn_mock_redis(Some("hunter2")).await?;
    let env = testing_env().with("REDIS_URL", format!("redis://:wrong@{}", addr));

    let report = run_startup_checks(&StartupChecker::new(common::context(env))).await?;
    let redis = result(&report, "redis");
    assert!(!redis.success);
    assert!(!redis.critical);
    Ok(())
}

#[tokio::test]
async fn clickhouse_ping_and_query() -> Result<()> {
    let addr = common::spawn_mock_clickhouse("Ok.\n").await?;
    let env = testing_env()
        .with("CLICKHOUSE_REQUIRED", "true")
        .with("CLICKHOUSE_URL", format!("http://{}/", addr))
        .with("CLICKHOUSE_USER", "default");

    let report = StartupChecker::new(common::context(env)).run_all_checks().await;
    let clickhouse = result(&report, "clickhouse");
    assert!(clickhouse.success, "{}", clickhouse.message);
    assert!(clickhouse.message.contains("answered SELECT 1"));
    Ok(())
}

#[tokio::test]
async fn clickhouse_bad_ping_reply_fails() -> Result<()> {
    let addr = common::spawn_mock_clickhouse("Not ready").await?;
    let env = testing_env()
        .with("CLICKHOUSE_REQUIRED", "true")
        .with("CLICKHOUSE_URL", format!("http://{}", addr));

    let report = StartupChecker::new(common::context(env)).run_all_checks().await;
    let clickhouse = result(&report, "clickhouse");
    assert!(!clickhouse.success);
    assert!(clickhouse.message.contains("Not ready"));
    assert!(!report.success);
    Ok(())
}

#[tokio::test]
async fn production_without_configuration_lists_failures() -> Result<()> {
    let env = MapEnv::new()
        .with("ENVIRONMENT", "production")
        .with("FAST_STARTUP_MODE", "true")
        .with("STARTUP_WRITABLE_DIRS", "")
        .with("STARTUP_MIN_MEMORY_MB", "0");

    let checker = StartupChecker::new(common::context(env));
    let err = run_startup_checks(&checker).await.unwrap_err();
    let StartupError::CriticalChecksFailed { report } = &err;

    for name in ["environment_variables", "database_connection", "redis", "clickhouse", "llm_providers", "jwt_secret"] {
        let r = result(report, name);
        assert!(!r.success && r.critical, "{} should fail critically: {:?}", name, r);
    }
    assert!(err.to_string().contains("jwt_secret"));
    Ok(())
}

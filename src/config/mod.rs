pub mod env;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use env::{EnvSource, MapEnv, ProcessEnv};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub test_context: bool,
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub startup: StartupConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    /// Reads `ENVIRONMENT`, then `APP_ENV`. Unknown values mean development.
    pub fn detect(env: &dyn EnvSource) -> Self {
        let raw = env
            .get_non_empty("ENVIRONMENT")
            .or_else(|| env.get_non_empty("APP_ENV"))
            .unwrap_or_default();

        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            "test" | "testing" => Environment::Testing,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Staging and production: real secrets, real dependencies, no fallbacks.
    pub fn is_deployed(&self) -> bool {
        matches!(self, Environment::Staging | Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when running under a test harness.
pub fn is_test_context(env: &dyn EnvSource) -> bool {
    Environment::detect(env) == Environment::Testing
        || env.flag("TESTING").unwrap_or(false)
        || env.is_set("RUST_TEST_CONTEXT")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProvider {
    pub name: String,
    pub api_key_var: String,
    pub base_url: String,
    pub configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub clickhouse_url: Option<String>,
    pub clickhouse_user: Option<String>,
    #[serde(skip_serializing)]
    pub clickhouse_password: Option<String>,
    pub llm_providers: Vec<LlmProvider>,
    pub auth_service_url: Option<String>,
}

impl ServicesConfig {
    pub fn configured_llm_providers(&self) -> impl Iterator<Item = &LlmProvider> {
        self.llm_providers.iter().filter(|p| p.configured)
    }

    /// Every configured service URL, labelled.
    pub fn urls(&self) -> Vec<(&'static str, &str)> {
        let mut urls = Vec::new();
        if let Some(u) = &self.database_url {
            urls.push(("database", u.as_str()));
        }
        if let Some(u) = &self.redis_url {
            urls.push(("redis", u.as_str()));
        }
        if let Some(u) = &self.clickhouse_url {
            urls.push(("clickhouse", u.as_str()));
        }
        if let Some(u) = &self.auth_service_url {
            urls.push(("auth_service", u.as_str()));
        }
        urls
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    pub skip_checks: bool,
    pub fast_mode: bool,
    pub check_timeout_secs: u64,
    pub redis_required: bool,
    pub clickhouse_required: bool,
    pub llm_required: bool,
    pub required_tables: Vec<String>,
    pub writable_dirs: Vec<String>,
    pub network_probe_hosts: Vec<String>,
    pub min_available_memory_mb: u64,
}

impl StartupConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_expiry_minutes: i64,
    pub jwt_issuer: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(env: &dyn EnvSource) -> Self {
        let environment = Environment::detect(env);

        // Set defaults based on environment, then override with specific env vars
        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Testing => Self::testing(),
            Environment::Development => Self::development(),
        };
        config.test_context = is_test_context(env);
        config.with_env_overrides(env)
    }

    fn with_env_overrides(mut self, env: &dyn EnvSource) -> Self {
        // Server
        if let Some(v) = env.get_non_empty("HOST") {
            self.server.host = v;
        }
        if let Some(port) = env
            .get_non_empty("SENTINEL_API_PORT")
            .or_else(|| env.get_non_empty("PORT"))
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Services
        self.services.database_url = env.get_non_empty("DATABASE_URL");
        self.services.redis_url = env.get_non_empty("REDIS_URL");
        self.services.clickhouse_url = env.get_non_empty("CLICKHOUSE_URL");
        self.services.clickhouse_user = env.get_non_empty("CLICKHOUSE_USER");
        self.services.clickhouse_password = env.get_non_empty("CLICKHOUSE_PASSWORD");
        self.services.auth_service_url = env.get_non_empty("AUTH_SERVICE_URL");
        for provider in &mut self.services.llm_providers {
            provider.configured = env.get_non_empty(&provider.api_key_var).is_some();
        }

        // Startup overrides
        let startup = &mut self.startup;
        if let Some(v) = env.flag("SKIP_STARTUP_CHECKS") {
            startup.skip_checks = v;
        }
        if let Some(v) = env.flag("FAST_STARTUP_MODE") {
            startup.fast_mode = v;
        }
        if let Some(v) = env.get_non_empty("STARTUP_CHECK_TIMEOUT_SECS") {
            startup.check_timeout_secs = v.parse().unwrap_or(startup.check_timeout_secs);
        }
        if let Some(v) = env.flag("REDIS_REQUIRED") {
            startup.redis_required = v;
        }
        if let Some(v) = env.flag("CLICKHOUSE_REQUIRED") {
            startup.clickhouse_required = v;
        }
        if let Some(v) = env.flag("LLM_REQUIRED") {
            startup.llm_required = v;
        }
        if let Some(v) = env.get("STARTUP_REQUIRED_TABLES") {
            startup.required_tables = split_list(&v);
        }
        if let Some(v) = env.get("STARTUP_WRITABLE_DIRS") {
            startup.writable_dirs = split_list(&v);
        }
        if let Some(v) = env.get("STARTUP_NETWORK_HOSTS") {
            startup.network_probe_hosts = split_list(&v);
        }
        if let Some(v) = env.get_non_empty("STARTUP_MIN_MEMORY_MB") {
            startup.min_available_memory_mb = v.parse().unwrap_or(startup.min_available_memory_mb);
        }

        // Security overrides
        if let Some(v) = env.get_non_empty("JWT_EXPIRY_MINUTES") {
            self.security.jwt_expiry_minutes = v.parse().unwrap_or(self.security.jwt_expiry_minutes);
        }
        if let Some(v) = env.get_non_empty("JWT_ISSUER") {
            self.security.jwt_issuer = v;
        }

        self
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            test_context: false,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            services: ServicesConfig {
                database_url: None,
                redis_url: None,
                clickhouse_url: None,
                clickhouse_user: None,
                clickhouse_password: None,
                llm_providers: default_llm_providers(),
                auth_service_url: None,
            },
            startup: StartupConfig {
                skip_checks: false,
                fast_mode: false,
                check_timeout_secs: 10,
                redis_required: false,
                clickhouse_required: false,
                llm_required: false,
                required_tables: Vec::new(),
                writable_dirs: vec!["logs".to_string()],
                network_probe_hosts: Vec::new(),
                min_available_memory_mb: 256,
            },
            security: SecurityConfig {
                jwt_expiry_minutes: 60 * 24, // 1 day
                jwt_issuer: "sentinel-api".to_string(),
            },
        }
    }

    pub fn development() -> Self {
        Self::base(Environment::Development)
    }

    pub fn testing() -> Self {
        let mut config = Self::base(Environment::Testing);
        config.test_context = true;
        config.startup.fast_mode = true;
        config.startup.check_timeout_secs = 5;
        config.startup.min_available_memory_mb = 0;
        config.startup.writable_dirs = Vec::new();
        config.security.jwt_expiry_minutes = 15;
        config
    }

    pub fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.startup.check_timeout_secs = 30;
        config.startup.redis_required = true;
        config.startup.llm_required = true;
        config.startup.min_available_memory_mb = 512;
        config.security.jwt_expiry_minutes = 60;
        config
    }

    pub fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.startup.check_timeout_secs = 30;
        config.startup.redis_required = true;
        config.startup.clickhouse_required = true;
        config.startup.llm_required = true;
        config.startup.min_available_memory_mb = 1024;
        config.security.jwt_expiry_minutes = 15;
        config
    }
}

fn default_llm_providers() -> Vec<LlmProvider> {
    [
        ("openai", "OPENAI_API_KEY", "https://api.openai.com"),
        ("anthropic", "ANTHROPIC_API_KEY", "https://api.anthropic.com"),
        ("gemini", "GEMINI_API_KEY", "https://generativelanguage.googleapis.com"),
    ]
    .into_iter()
    .map(|(name, var, url)| LlmProvider {
        name: name.to_string(),
        api_key_var: var.to_string(),
        base_url: url.to_string(),
        configured: false,
    })
    .collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_aliases() {
        let cases = [
            ("prod", Environment::Production),
            ("Production", Environment::Production),
            ("stage", Environment::Staging),
            ("test", Environment::Testing),
            ("local", Environment::Development),
            ("nonsense", Environment::Development),
        ];
        for (raw, expected) in cases {
            let env = MapEnv::new().with("ENVIRONMENT", raw);
            assert_eq!(Environment::detect(&env), expected, "{}", raw);
        }
    }

    #[test]
    fn environment_falls_back_to_app_env() {
        let env = MapEnv::new().with("APP_ENV", "staging");
        assert_eq!(Environment::detect(&env), Environment::Staging);

        let env = MapEnv::new().with("ENVIRONMENT", "production").with("APP_ENV", "staging");
        assert_eq!(Environment::detect(&env), Environment::Production);
    }

    #[test]
    fn test_context_detection() {
        assert!(!is_test_context(&MapEnv::new()));
        assert!(is_test_context(&MapEnv::new().with("ENVIRONMENT", "testing")));
        assert!(is_test_context(&MapEnv::new().with("TESTING", "1")));
        assert!(is_test_context(&MapEnv::new().with("RUST_TEST_CONTEXT", "")));
        assert!(!is_test_context(&MapEnv::new().with("TESTING", "false")));
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.startup.redis_required);
        assert!(config.startup.clickhouse_required);
        assert_eq!(config.security.jwt_expiry_minutes, 15);
    }

    #[test]
    fn env_overrides_apply() {
        let env = MapEnv::new()
            .with("ENVIRONMENT", "staging")
            .with("PORT", "9001")
            .with("DATABASE_URL", "postgres://localhost/app")
            .with("REDIS_REQUIRED", "false")
            .with("STARTUP_REQUIRED_TABLES", "users, threads,,")
            .with("ANTHROPIC_API_KEY", "sk-ant-xyz");

        let config = AppConfig::from_source(&env);
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.server.port, 9001);
        assert!(!config.startup.redis_required);
        assert_eq!(config.startup.required_tables, vec!["users", "threads"]);
        let configured: Vec<_> = config
            .services
            .configured_llm_providers()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(configured, vec!["anthropic"]);
        assert_eq!(config.services.urls(), vec![("database", "postgres://localhost/app")]);
    }
}

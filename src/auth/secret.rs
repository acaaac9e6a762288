use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{is_test_context, EnvSource, Environment};

pub const MIN_SECRET_LENGTH: usize = 32;

const SECRET_KEY_VAR: &str = "JWT_SECRET_KEY";
const SECRET_FILE_VAR: &str = "JWT_SECRET_FILE";
const GENERIC_VAR: &str = "JWT_SECRET";
const LEGACY_AUTH_VAR: &str = "AUTH_JWT_SECRET";

/// Values that show up in copied `.env.example` files and must never sign real tokens.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "secret",
    "changeme",
    "change-me",
    "your-secret-key",
    "your_secret_key",
    "jwt-secret",
    "development-secret",
];

#[derive(Debug, Error)]
pub enum JwtSecretError {
    #[error("JWT secret not configured for {environment}; set one of: {}", .checked.join(", "))]
    NotConfigured {
        environment: Environment,
        checked: Vec<String>,
    },

    #[error("JWT secret from {origin} is {length} characters; {environment} requires at least {minimum}")]
    TooShort {
        origin: SecretSource,
        environment: Environment,
        length: usize,
        minimum: usize,
    },

    #[error("JWT secret from {0} is a placeholder value")]
    Placeholder(SecretSource),

    #[error("Failed to read JWT secret file {path}: {message}")]
    FileUnreadable { path: PathBuf, message: String },
}

/// Where a resolved secret came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SecretSource {
    EnvironmentSpecific(String),
    SecretKey,
    SecretFile(PathBuf),
    Generic,
    LegacyAuth,
    DevelopmentFallback,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::EnvironmentSpecific(var) => write!(f, "{}", var),
            SecretSource::SecretKey => f.write_str(SECRET_KEY_VAR),
            SecretSource::SecretFile(path) => write!(f, "{} ({})", SECRET_FILE_VAR, path.display()),
            SecretSource::Generic => f.write_str(GENERIC_VAR),
            SecretSource::LegacyAuth => f.write_str(LEGACY_AUTH_VAR),
            SecretSource::DevelopmentFallback => f.write_str("development fallback"),
        }
    }
}

/// A secret together with its origin. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    value: String,
    pub source: SecretSource,
}

impl ResolvedSecret {
    pub fn new(value: impl Into<String>, source: SecretSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.value)
    }
}

impl fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"[redacted]")
            .field("source", &self.source)
            .finish()
    }
}

/// First 16 hex chars of the secret's SHA-256. Safe to log and to compare across services.
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let hash_str = format!("{:x}", hasher.finalize());
    hash_str[..16].to_string()
}

/// Deterministic secret for local and test runs, identical in every process of one environment.
pub fn development_secret(environment: Environment) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("sentinel-dev-jwt-secret:{}", environment.as_str()).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolves the HMAC key used to sign and verify access tokens.
///
/// Sources are consulted in priority order:
/// 1. `JWT_SECRET_{ENV}` (e.g. `JWT_SECRET_STAGING`)
/// 2. `JWT_SECRET_KEY`
/// 3. `JWT_SECRET_FILE` (path to a file holding the secret)
/// 4. `JWT_SECRET`
/// 5. `AUTH_JWT_SECRET`
///
/// Development and test runs fall back to [`development_secret`]; staging and
/// production fail instead. The first successful resolution is cached until
/// [`JwtSecretManager::clear_cache`] is called.
pub struct JwtSecretManager {
    env: Arc<dyn EnvSource>,
    cache: RwLock<Option<ResolvedSecret>>,
}

impl JwtSecretManager {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self {
            env,
            cache: RwLock::new(None),
        }
    }

    /// Environment as seen by this manager's env source.
    pub fn environment(&self) -> Environment {
        Environment::detect(self.env.as_ref())
    }

    pub fn get_secret(&self) -> Result<String, JwtSecretError> {
        self.get_resolved().map(|r| r.value)
    }

    /// Cached resolution; resolves and caches on first use.
    pub fn get_resolved(&self) -> Result<ResolvedSecret, JwtSecretError> {
        if let Some(cached) = self.read_cache() {
            return Ok(cached);
        }

        let resolved = self.resolve()?;
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have won the race; keep whichever landed first.
        Ok(cache.get_or_insert(resolved).clone())
    }

    pub fn source(&self) -> Result<SecretSource, JwtSecretError> {
        self.get_resolved().map(|r| r.source)
    }

    pub fn fingerprint(&self) -> Result<String, JwtSecretError> {
        self.get_resolved().map(|r| r.fingerprint())
    }

    pub fn is_cached(&self) -> bool {
        self.read_cache().is_some()
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.take().is_some() {
            debug!("JWT secret cache cleared");
        }
    }

    /// Resolve without consulting or touching the cache.
    pub fn resolve(&self) -> Result<ResolvedSecret, JwtSecretError> {
        let environment = self.environment();

        if let Some(resolved) = self.lookup(environment)? {
            validate(&resolved, environment)?;
            info!(source = %resolved.source, fingerprint = %resolved.fingerprint(), "JWT secret resolved");
            return Ok(resolved);
        }

        // Deployed environments never get a derived secret, test harness or not.
        if environment.is_deployed() {
            return Err(JwtSecretError::NotConfigured {
                environment,
                checked: self.checked_vars(environment),
            });
        }

        if is_test_context(self.env.as_ref()) {
            debug!(%environment, "Using deterministic JWT secret for test context");
        } else {
            warn!(%environment, "No JWT secret configured; using deterministic development secret");
        }
        Ok(ResolvedSecret::new(
            development_secret(environment),
            SecretSource::DevelopmentFallback,
        ))
    }

    /// Variable names consulted for `environment`, in priority order.
    pub fn checked_vars(&self, environment: Environment) -> Vec<String> {
        vec![
            environment_specific_var(environment),
            SECRET_KEY_VAR.to_string(),
            SECRET_FILE_VAR.to_string(),
            GENERIC_VAR.to_string(),
            LEGACY_AUTH_VAR.to_string(),
        ]
    }

    fn lookup(&self, environment: Environment) -> Result<Option<ResolvedSecret>, JwtSecretError> {
        let env = self.env.as_ref();

        let specific = environment_specific_var(environment);
        if let Some(v) = env.get_non_empty(&specific) {
            return Ok(Some(ResolvedSecret::new(v, SecretSource::EnvironmentSpecific(specific))));
        }
        if let Some(v) = env.get_non_empty(SECRET_KEY_VAR) {
            return Ok(Some(ResolvedSecret::new(v, SecretSource::SecretKey)));
        }
        if let Some(path) = env.get_non_empty(SECRET_FILE_VAR) {
            let path = PathBuf::from(path);
            let contents = std::fs::read_to_string(&path).map_err(|e| JwtSecretError::FileUnreadable {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let contents = contents.trim();
            if !contents.is_empty() {
                return Ok(Some(ResolvedSecret::new(contents, SecretSource::SecretFile(path))));
            }
            warn!(path = %path.display(), "JWT secret file is empty; trying next source");
        }
        if let Some(v) = env.get_non_empty(GENERIC_VAR) {
            return Ok(Some(ResolvedSecret::new(v, SecretSource::Generic)));
        }
        if let Some(v) = env.get_non_empty(LEGACY_AUTH_VAR) {
            return Ok(Some(ResolvedSecret::new(v, SecretSource::LegacyAuth)));
        }
        Ok(None)
    }

    fn read_cache(&self) -> Option<ResolvedSecret> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn environment_specific_var(environment: Environment) -> String {
    format!("JWT_SECRET_{}", environment.as_str().to_ascii_uppercase())
}

fn validate(resolved: &ResolvedSecret, environment: Environment) -> Result<(), JwtSecretError> {
    if !environment.is_deployed() {
        if resolved.value.len() < MIN_SECRET_LENGTH {
            warn!(source = %resolved.source, "JWT secret is shorter than {} characters", MIN_SECRET_LENGTH);
        }
        return Ok(());
    }

    let lowered = resolved.value.to_ascii_lowercase();
    if PLACEHOLDER_SECRETS.contains(&lowered.as_str()) {
        return Err(JwtSecretError::Placeholder(resolved.source.clone()));
    }
    if resolved.value.len() < MIN_SECRET_LENGTH {
        return Err(JwtSecretError::TooShort {
            origin: resolved.source.clone(),
            environment,
            length: resolved.value.len(),
            minimum: MIN_SECRET_LENGTH,
        });
    }
    Ok(())
}

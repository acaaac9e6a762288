use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CheckContext, CheckError, StartupCheck};
use crate::auth::{fetch_peer_fingerprint, verify_shared_secret};
use crate::config::AppConfig;

/// External services: LLM providers and the JWT secret shared with the auth service.
pub struct ServiceChecker;

impl ServiceChecker {
    pub fn checks() -> Vec<Box<dyn StartupCheck>> {
        vec![Box::new(LlmProviders), Box::new(JwtSecret)]
    }
}

pub struct LlmProviders;

#[async_trait]
impl StartupCheck for LlmProviders {
    fn name(&self) -> &'static str {
        "llm_providers"
    }

    fn is_critical(&self, config: &AppConfig) -> bool {
        config.startup.llm_required
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let providers: Vec<_> = ctx.config.services.configured_llm_providers().collect();
        if providers.is_empty() {
            let vars: Vec<&str> = ctx
                .config
                .services
                .llm_providers
                .iter()
                .map(|p| p.api_key_var.as_str())
                .collect();
            return Err(CheckError::failed(format!(
                "No LLM provider configured; set one of {}",
                vars.join(", ")
            )));
        }

        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        if ctx.config.startup.fast_mode {
            return Ok(format!("LLM providers configured: {}", names.join(", ")));
        }

        let mut unreachable = Vec::new();
        for provider in &providers {
            // Any HTTP status proves the endpoint is reachable; auth is exercised at call time.
            match ctx.http.get(&provider.base_url).send().await {
                Ok(resp) => debug!(provider = %provider.name, status = %resp.status(), "LLM provider reachable"),
                Err(e) => unreachable.push(format!("{} ({})", provider.name, e)),
            }
        }

        if unreachable.is_empty() {
            Ok(format!("LLM providers configured and reachable: {}", names.join(", ")))
        } else {
            Err(CheckError::failed(format!(
                "LLM providers unreachable: {}",
                unreachable.join(", ")
            )))
        }
    }
}

pub struct JwtSecret;

#[async_trait]
impl StartupCheck for JwtSecret {
    fn name(&self) -> &'static str {
        "jwt_secret"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let resolved = ctx.jwt.get_resolved()?;
        if !verify_shared_secret(resolved.expose(), resolved.expose()) {
            return Err(CheckError::failed("JWT secret cannot sign and verify a probe token"));
        }
        let local = resolved.fingerprint();

        let peer_note = match ctx.config.services.auth_service_url.as_deref() {
            Some(peer) if !ctx.config.startup.fast_mode => {
                match fetch_peer_fingerprint(&ctx.http, peer).await {
                    Ok(remote) if remote.eq_ignore_ascii_case(&local) => ", in sync with auth service".to_string(),
                    Ok(remote) => {
                        return Err(CheckError::failed(format!(
                            "JWT secret mismatch with auth service at {}: local {} vs remote {}",
                            peer, local, remote
                        )))
                    }
                    // The auth service may boot after us; an unreachable peer is not a mismatch.
                    Err(e) => {
                        warn!(%peer, "Could not fetch auth service JWT fingerprint: {}", e);
                        ", auth service not reachable for comparison".to_string()
                    }
                }
            }
            _ => String::new(),
        };

        Ok(format!(
            "JWT secret from {} (fingerprint {}){}",
            resolved.source, local, peer_note
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtSecretManager;
    use crate::config::{EnvSource, MapEnv};
    use std::sync::Arc;

    fn ctx_for(env: MapEnv) -> CheckContext {
        let config = Arc::new(crate::config::AppConfig::from_source(&env));
        let env: Arc<dyn EnvSource> = Arc::new(env);
        CheckContext::new(config, env.clone(), Arc::new(JwtSecretManager::new(env)))
    }

    #[tokio::test]
    async fn no_llm_provider_fails_but_only_critical_when_required() {
        let ctx = ctx_for(MapEnv::new());
        let err = LlmProviders.run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        assert!(!LlmProviders.is_critical(&ctx.config));
        assert!(LlmProviders.is_critical(&AppConfig::production()));
    }

    #[tokio::test]
    async fn llm_listing_in_fast_mode() {
        let ctx = ctx_for(
            MapEnv::new()
                .with("FAST_STARTUP_MODE", "true")
                .with("OPENAI_API_KEY", "sk-test")
                .with("GEMINI_API_KEY", "g-test"),
        );
        assert_eq!(
            LlmProviders.run(&ctx).await.unwrap(),
            "LLM providers configured: openai, gemini"
        );
    }

    #[tokio::test]
    async fn jwt_check_reports_source_without_secret() {
        let ctx = ctx_for(MapEnv::new().with("JWT_SECRET_KEY", "a-very-private-value"));
        let message = JwtSecret.run(&ctx).await.unwrap();
        assert!(message.starts_with("JWT secret from JWT_SECRET_KEY"));
        assert!(!message.contains("a-very-private-value"));
    }

    #[tokio::test]
    async fn jwt_check_fails_in_production_without_secret() {
        let ctx = ctx_for(MapEnv::new().with("ENVIRONMENT", "production"));
        let err = JwtSecret.run(&ctx).await.unwrap_err();
        assert!(matches!(err, CheckError::Jwt(_)));
    }

    #[tokio::test]
    async fn unreachable_auth_service_is_not_a_mismatch() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let ctx = ctx_for(
            MapEnv::new()
                .with("JWT_SECRET", "dev-secret")
                .with("AUTH_SERVICE_URL", format!("http://127.0.0.1:{}", port)),
        );
        let message = JwtSecret.run(&ctx).await.unwrap();
        assert!(message.ends_with("auth service not reachable for comparison"));
    }
}

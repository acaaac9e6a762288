use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::secret::{JwtSecretError, JwtSecretManager};
use crate::config::SecurityConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub token_type: String,
    pub jti: Uuid,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Secret(#[from] JwtSecretError),

    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Invalid JWT token: {0}")]
    Invalid(String),
}

/// HS256 signer/verifier bound to one secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, issuer: impl Into<String>, expiry: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            expiry,
        }
    }

    pub fn from_manager(manager: &JwtSecretManager, security: &SecurityConfig) -> Result<Self, TokenError> {
        let expiry = Duration::try_minutes(security.jwt_expiry_minutes).ok_or_else(|| {
            TokenError::Generation(format!(
                "JWT expiry of {} minutes is out of range",
                security.jwt_expiry_minutes
            ))
        })?;
        let secret = manager.get_secret()?;
        Ok(Self::new(&secret, security.jwt_issuer.clone(), expiry))
    }

    pub fn issue(&self, subject: &str, token_type: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.expiry)
                .ok_or_else(|| TokenError::Generation("token expiry overflows the calendar".to_string()))?
                .timestamp(),
            token_type: token_type.to_string(),
            jti: Uuid::new_v4(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

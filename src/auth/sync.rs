use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::secret::{JwtSecretError, JwtSecretManager};
use super::token::TokenCodec;

const PROBE_ISSUER: &str = "sentinel-sync-probe";

/// Outcome of comparing this process's secret against a peer's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub local_fingerprint: String,
    pub peer_fingerprint: String,
    pub local_source: String,
    pub in_sync: bool,
}

/// Compare the local secret's fingerprint to one reported by another service.
pub fn compare_fingerprints(
    manager: &JwtSecretManager,
    peer_fingerprint: &str,
) -> Result<SyncStatus, JwtSecretError> {
    let resolved = manager.get_resolved()?;
    let local_fingerprint = resolved.fingerprint();
    let peer_fingerprint = peer_fingerprint.trim().to_ascii_lowercase();
    let in_sync = local_fingerprint == peer_fingerprint;

    Ok(SyncStatus {
        in_sync,
        local_fingerprint,
        peer_fingerprint,
        local_source: resolved.source.to_string(),
    })
}

/// Sign a probe token with `signing` and verify it with `verifying`.
///
/// Succeeds exactly when a token minted by one side is accepted by the other.
pub fn verify_shared_secret(signing: &str, verifying: &str) -> bool {
    let probe = TokenCodec::new(signing, PROBE_ISSUER, Duration::minutes(1));
    let Ok(token) = probe.issue("sync-probe", "probe") else {
        return false;
    };
    TokenCodec::new(verifying, PROBE_ISSUER, Duration::minutes(1))
        .verify(&token)
        .is_ok()
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Peer request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Peer response did not include a JWT fingerprint")]
    MissingFingerprint,
}

/// Fetch the fingerprint a peer service publishes at `GET /health/jwt`.
pub async fn fetch_peer_fingerprint(client: &reqwest::Client, base_url: &str) -> Result<String, PeerError> {
    let url = format!("{}/health/jwt", base_url.trim_end_matches('/'));
    let body: serde_json::Value = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    body["data"]["fingerprint"]
        .as_str()
        .map(str::to_string)
        .ok_or(PeerError::MissingFingerprint)
}

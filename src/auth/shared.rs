// Process-wide secret manager. Every signer and verifier in this process goes
// through here so the backend and the embedded auth paths cannot disagree.
use once_cell::sync::Lazy;
use std::sync::Arc;

use super::secret::{JwtSecretError, JwtSecretManager};
use super::sync::{compare_fingerprints, SyncStatus};
use crate::config::ProcessEnv;

static SHARED: Lazy<Arc<JwtSecretManager>> =
    Lazy::new(|| Arc::new(JwtSecretManager::new(Arc::new(ProcessEnv))));

pub fn shared() -> Arc<JwtSecretManager> {
    Arc::clone(&SHARED)
}

pub fn get_jwt_secret() -> Result<String, JwtSecretError> {
    SHARED.get_secret()
}

pub fn clear_jwt_secret_cache() {
    SHARED.clear_cache()
}

pub fn validate_synchronization(peer_fingerprint: &str) -> Result<SyncStatus, JwtSecretError> {
    compare_fingerprints(&SHARED, peer_fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::secret::fingerprint;

    // The shared manager reads the real process environment, so assertions are
    // made relative to whatever secret it resolves rather than a fixed value.
    #[test]
    fn free_functions_use_the_shared_manager() {
        let Ok(secret) = get_jwt_secret() else {
            // Deployed environment without a secret configured: nothing to compare.
            return;
        };
        assert!(shared().is_cached());

        let status = validate_synchronization(&fingerprint(&secret).to_uppercase()).unwrap();
        assert!(status.in_sync);
        assert_eq!(status.local_fingerprint, fingerprint(&secret));

        let status = validate_synchronization(&fingerprint("some-other-service-secret")).unwrap();
        assert!(!status.in_sync);

        clear_jwt_secret_cache();
        assert!(!shared().is_cached());
        assert_eq!(get_jwt_secret().unwrap(), secret);
        assert!(shared().is_cached());
    }
}

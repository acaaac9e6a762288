pub mod secret;
pub mod shared;
pub mod sync;
pub mod token;

pub use secret::{JwtSecretError, JwtSecretManager, ResolvedSecret, SecretSource};
pub use shared::{clear_jwt_secret_cache, get_jwt_secret, shared, validate_synchronization};
pub use sync::{fetch_peer_fingerprint, verify_shared_secret, PeerError, SyncStatus};
pub use token::{Claims, TokenCodec, TokenError};

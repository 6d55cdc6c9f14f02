//! Authentication for the Firestore REST API.
//!
//! Service-account tokens are cached with a refresh margin and refreshed
//! under a write lock so concurrent requests never stampede the token
//! endpoint. The emulator mode skips GCP auth entirely and sends the
//! fixed `owner` token the emulator expects.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Fallback TTL when the provider does not report an expiry.
const DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Token source for outgoing requests.
pub enum Authenticator {
    /// Real service-account auth with caching.
    ServiceAccount {
        provider: Arc<dyn TokenProvider>,
        cache: RwLock<Option<CachedTokenBox>>,
    },
    /// Firestore emulator: fixed token, no refresh.
    Emulator,
}

// RwLock payload must be Sized + Send; newtype keeps the private struct out
// of the public enum signature.
pub struct CachedTokenBox(CachedToken);

impl Authenticator {
    /// Build from `GOOGLE_APPLICATION_CREDENTIALS` in the environment.
    pub fn from_env() -> FirestoreResult<Self> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Self::ServiceAccount {
                provider: Arc::new(sa),
                cache: RwLock::new(None),
            }),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Emulator-mode authenticator.
    pub fn emulator() -> Self {
        Self::Emulator
    }

    /// Get a bearer token for the next request.
    pub async fn token(&self) -> FirestoreResult<String> {
        match self {
            Self::Emulator => Ok("owner".to_string()),
            Self::ServiceAccount { provider, cache } => {
                // Fast path under the read lock
                {
                    let cached = cache.read().await;
                    if let Some(CachedTokenBox(t)) = cached.as_ref() {
                        if t.is_fresh() {
                            return Ok(t.access_token.clone());
                        }
                    }
                }

                let mut cached = cache.write().await;
                // Another task may have refreshed while we waited
                if let Some(CachedTokenBox(t)) = cached.as_ref() {
                    if t.is_fresh() {
                        return Ok(t.access_token.clone());
                    }
                }

                match provider.token(&[FIRESTORE_SCOPE]).await {
                    Ok(token) => {
                        let access_token = token.as_str().to_string();
                        let now = Utc::now();
                        let exp = token.expires_at();
                        let expires_at = if exp > now {
                            match (exp - now).to_std() {
                                Ok(ttl) => Instant::now() + ttl,
                                Err(_) => Instant::now() + DEFAULT_TTL,
                            }
                        } else {
                            // Already expired: force a refresh on the next call
                            Instant::now()
                        };

                        *cached = Some(CachedTokenBox(CachedToken {
                            access_token: access_token.clone(),
                            expires_at,
                        }));
                        debug!("Refreshed Firestore auth token");
                        Ok(access_token)
                    }
                    Err(e) => {
                        // Keep serving a still-usable token through a refresh
                        // outage
                        if let Some(CachedTokenBox(t)) = cached.as_ref() {
                            if t.is_usable() {
                                warn!("Token refresh failed, reusing current token: {}", e);
                                return Ok(t.access_token.clone());
                            }
                        }
                        Err(FirestoreError::auth_error(format!(
                            "Failed to obtain auth token: {}",
                            e
                        )))
                    }
                }
            }
        }
    }

    /// Drop any cached token (after an `UNAUTHENTICATED` response).
    pub async fn invalidate(&self) {
        if let Self::ServiceAccount { cache, .. } = self {
            *cache.write().await = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emulator_token_is_fixed() {
        let auth = Authenticator::emulator();
        assert_eq!(auth.token().await.unwrap(), "owner");
        auth.invalidate().await;
        assert_eq!(auth.token().await.unwrap(), "owner");
    }
}

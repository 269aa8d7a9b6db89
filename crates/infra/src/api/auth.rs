//! Signed access tokens for the entitlement API
//!
//! [`RsaCredentialProvider`] mints short-lived RS512 tokens from a PEM key on
//! disk. [`CredentialCache`] owns the current token for one client and is the
//! only place that re-issues it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use entsync_domain::constants::{CUSTOMER_SUBJECT_PREFIX, TOKEN_EXPIRY_SKEW_SECS};
use entsync_domain::{AppConfig, CredentialConfig, EntsyncError, Network, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::endpoints::NetworkProfile;
use crate::errors::map_infra;

/// A signed token bound to one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub network: Network,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Usable at `now`, keeping a safety margin before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_EXPIRY_SKEW_SECS) < self.expires_at
    }
}

/// JWT claims for token-based authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Source of fresh credentials.
///
/// Implementations do no caching; that belongs to [`CredentialCache`].
pub trait TokenIssuer: Send + Sync {
    /// Mint a new credential for `network`.
    ///
    /// # Errors
    /// Returns `EntsyncError::Config` when key material or identity is
    /// missing or unusable.
    fn issue(&self, network: Network) -> Result<Credential>;
}

/// Issues customer-scoped RS512 tokens.
#[derive(Debug, Clone)]
pub struct RsaCredentialProvider {
    private_key_path: PathBuf,
    public_key_id: String,
    pod_id: Option<String>,
    ttl: Duration,
}

impl RsaCredentialProvider {
    /// Provider for the given key material, issuing tokens valid for `ttl_secs`.
    pub fn new(credentials: &CredentialConfig, ttl_secs: i64) -> Self {
        Self {
            private_key_path: credentials.private_key_path.clone(),
            public_key_id: credentials.public_key_id.clone(),
            pod_id: credentials.pod_id.clone(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Provider using the configured credentials and token lifetime.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.credentials, config.api.token_ttl_secs)
    }

    /// Token subject for `network`.
    ///
    /// # Errors
    /// Returns `EntsyncError::Config` when the network needs a pod id and
    /// none is configured.
    pub fn subject(&self, network: Network) -> Result<String> {
        let base = format!("{CUSTOMER_SUBJECT_PREFIX}{}", self.public_key_id);
        if !NetworkProfile::for_network(network).subject_includes_pod {
            return Ok(base);
        }

        match self.pod_id.as_deref().filter(|id| !id.is_empty()) {
            Some(pod_id) => Ok(format!("{base}:{pod_id}")),
            None => Err(EntsyncError::Config(format!(
                "credentials.pod_id is required to authenticate against {network}"
            ))),
        }
    }
}

impl TokenIssuer for RsaCredentialProvider {
    fn issue(&self, network: Network) -> Result<Credential> {
        let subject = self.subject(network)?;
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;

        let claims =
            Claims { sub: subject, iat: issued_at.timestamp(), exp: expires_at.timestamp() };
        let token = sign_rs512(&self.private_key_path, &claims)?;

        debug!(%network, expires_at = %expires_at, "issued access token");
        Ok(Credential { network, token, issued_at, expires_at })
    }
}

/// Sign `claims` with the RS512 key at `key_path`.
///
/// The key is read on every call so a rotated file is picked up without a
/// restart.
///
/// # Errors
/// Returns `EntsyncError::Config` when the key cannot be read or parsed.
pub fn sign_rs512(key_path: &Path, claims: &Claims) -> Result<String> {
    let pem = std::fs::read(key_path).map_err(|e| {
        EntsyncError::Config(format!(
            "failed to read private key {}: {e}",
            key_path.display()
        ))
    })?;
    let key = EncodingKey::from_rsa_pem(&pem).map_err(|e| {
        EntsyncError::Config(format!("invalid private key {}: {e}", key_path.display()))
    })?;

    encode(&Header::new(Algorithm::RS512), claims, &key).map_err(map_infra)
}

/// Owned cache holding the current credential for one network.
pub struct CredentialCache {
    issuer: Arc<dyn TokenIssuer>,
    network: Network,
    current: Mutex<Option<Credential>>,
}

impl CredentialCache {
    /// Empty cache; the first [`current`](Self::current) call issues.
    pub fn new(issuer: Arc<dyn TokenIssuer>, network: Network) -> Self {
        Self { issuer, network, current: Mutex::new(None) }
    }

    /// The cached credential, or a newly issued one when none is cached or
    /// the cached one is about to expire.
    pub fn current(&self) -> Result<Credential> {
        let mut slot = self.current.lock();
        if let Some(credential) = slot.as_ref() {
            if credential.is_fresh(Utc::now()) {
                return Ok(credential.clone());
            }
            debug!(network = %self.network, "cached token near expiry");
        }

        let credential = self.issuer.issue(self.network)?;
        *slot = Some(credential.clone());
        Ok(credential)
    }

    /// Drop the cached credential.
    pub fn invalidate(&self) {
        self.current.lock().take();
    }

    /// Replace a token the server rejected.
    ///
    /// Runs under the cache lock. If another caller already swapped out
    /// `stale`, its replacement is returned instead of issuing again.
    pub fn refresh(&self, stale: &str) -> Result<Credential> {
        let mut slot = self.current.lock();
        if let Some(credential) = slot.as_ref() {
            if credential.token != stale && credential.is_fresh(Utc::now()) {
                return Ok(credential.clone());
            }
        }
        slot.take();

        info!(network = %self.network, "re-authenticating after rejected token");
        let credential = self.issuer.issue(self.network)?;
        *slot = Some(credential.clone());
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use jsonwebtoken::{decode, DecodingKey, Validation};

    use super::*;

    const PRIVATE_KEY: &str =
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/test_rsa_private.pem");
    const PUBLIC_KEY: &str =
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/test_rsa_public.pem");

    fn provider(pod_id: Option<&str>) -> RsaCredentialProvider {
        RsaCredentialProvider::new(
            &CredentialConfig {
                private_key_path: PathBuf::from(PRIVATE_KEY),
                public_key_id: "acme-key".into(),
                pod_id: pod_id.map(str::to_string),
            },
            290,
        )
    }

    fn verify(token: &str) -> Claims {
        let pem = std::fs::read(PUBLIC_KEY).unwrap();
        let key = DecodingKey::from_rsa_pem(&pem).unwrap();
        decode::<Claims>(token, &key, &Validation::new(Algorithm::RS512)).unwrap().claims
    }

    #[test]
    fn whatsapp_token_has_customer_subject() {
        let credential = provider(Some("pod-7")).issue(Network::WhatsApp).unwrap();
        let claims = verify(&credential.token);

        assert_eq!(claims.sub, "ces:customer:acme-key");
        assert_eq!(claims.exp - claims.iat, 290);
        assert_eq!(credential.expires_at - credential.issued_at, Duration::seconds(290));
        assert_eq!(credential.network, Network::WhatsApp);
    }

    #[test]
    fn wechat_token_subject_embeds_pod() {
        let credential = provider(Some("pod-7")).issue(Network::WeChat).unwrap();
        assert_eq!(verify(&credential.token).sub, "ces:customer:acme-key:pod-7");
    }

    #[test]
    fn wechat_without_pod_id_is_config_error() {
        let result = provider(None).issue(Network::WeChat);
        assert!(matches!(result, Err(EntsyncError::Config(msg)) if msg.contains("pod_id")));
    }

    #[test]
    fn unreadable_key_is_config_error() {
        let mut provider = provider(None);
        provider.private_key_path = PathBuf::from("/nonexistent/key.pem");

        let result = provider.issue(Network::WhatsApp);
        assert!(matches!(result, Err(EntsyncError::Config(msg)) if msg.contains("private key")));
    }

    #[test]
    fn malformed_key_is_config_error() {
        let mut provider = provider(None);
        provider.private_key_path = PathBuf::from(PUBLIC_KEY);

        assert!(matches!(provider.issue(Network::WhatsApp), Err(EntsyncError::Config(_))));
    }

    struct CountingIssuer {
        issued: AtomicUsize,
        ttl_secs: i64,
    }

    impl CountingIssuer {
        fn new(ttl_secs: i64) -> Arc<Self> {
            Arc::new(Self { issued: AtomicUsize::new(0), ttl_secs })
        }

        fn count(&self) -> usize {
            self.issued.load(Ordering::SeqCst)
        }
    }

    impl TokenIssuer for CountingIssuer {
        fn issue(&self, network: Network) -> Result<Credential> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            let issued_at = Utc::now();
            Ok(Credential {
                network,
                token: format!("token-{n}"),
                issued_at,
                expires_at: issued_at + Duration::seconds(self.ttl_secs),
            })
        }
    }

    #[test]
    fn cache_reuses_fresh_credential() {
        let issuer = CountingIssuer::new(290);
        let cache = CredentialCache::new(issuer.clone(), Network::WhatsApp);

        assert_eq!(cache.current().unwrap().token, "token-1");
        assert_eq!(cache.current().unwrap().token, "token-1");
        assert_eq!(issuer.count(), 1);
    }

    #[test]
    fn invalidate_forces_reissue() {
        let issuer = CountingIssuer::new(290);
        let cache = CredentialCache::new(issuer.clone(), Network::WhatsApp);

        cache.current().unwrap();
        cache.invalidate();

        assert_eq!(cache.current().unwrap().token, "token-2");
        assert_eq!(issuer.count(), 2);
    }

    #[test]
    fn credential_inside_skew_window_is_reissued() {
        let issuer = CountingIssuer::new(5);
        let cache = CredentialCache::new(issuer.clone(), Network::WhatsApp);

        cache.current().unwrap();
        cache.current().unwrap();

        assert_eq!(issuer.count(), 2);
    }

    #[test]
    fn refresh_replaces_stale_token_once() {
        let issuer = CountingIssuer::new(290);
        let cache = CredentialCache::new(issuer.clone(), Network::WhatsApp);

        let stale = cache.current().unwrap();
        let fresh = cache.refresh(&stale.token).unwrap();
        assert_eq!(fresh.token, "token-2");

        // A second caller holding the same stale token gets the replacement.
        let again = cache.refresh(&stale.token).unwrap();
        assert_eq!(again.token, "token-2");
        assert_eq!(issuer.count(), 2);
    }
}

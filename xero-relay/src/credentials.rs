//! Xero credential loading and caching.
//!
//! The webhook signing key and API access token live in an external
//! parameter store as one JSON document:
//!
//! ```json
//! {"xero_webhook_key": "...", "xero_access_token": "..."}
//! ```
//!
//! The bundle is cached process-wide for a configurable TTL. Callers that
//! suspect the cached copy is stale (a signature mismatch, for example) can
//! force a reload with [`CredentialCache::refresh`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;

/// Webhook signing key and upstream access token.
#[derive(Clone, Deserialize)]
pub struct CredentialBundle {
    #[serde(rename = "xero_webhook_key")]
    pub webhook_key: String,
    #[serde(rename = "xero_access_token")]
    pub access_token: String,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("webhook_key", &"<redacted>")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// The credential bundle could not be loaded.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret parameter {0} is not set")]
    NotFound(String),

    #[error("secret parameter {name} is not a valid credential bundle: {source}")]
    Invalid {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read secret file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of the credential bundle.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn load(&self) -> Result<CredentialBundle, SecretError>;
}

fn parse_bundle(name: &str, raw: &str) -> Result<CredentialBundle, SecretError> {
    serde_json::from_str(raw).map_err(|source| SecretError::Invalid {
        name: name.to_string(),
        source,
    })
}

/// Reads the bundle from the environment variable named by the parameter.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    param: String,
}

impl EnvSecretStore {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn load(&self) -> Result<CredentialBundle, SecretError> {
        let raw = std::env::var(&self.param)
            .map_err(|_| SecretError::NotFound(self.param.clone()))?;
        parse_bundle(&self.param, &raw)
    }
}

/// Reads the bundle from a JSON file, e.g. a mounted secret volume.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn load(&self) -> Result<CredentialBundle, SecretError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SecretError::Io {
                path: self.path.clone(),
                source,
            })?;
        parse_bundle(&self.path.display().to_string(), &raw)
    }
}

/// Build the store selected by configuration.
pub fn store_from_config(config: &Config) -> Arc<dyn SecretStore> {
    match &config.secret_file {
        Some(path) => Arc::new(FileSecretStore::new(path.clone())),
        None => Arc::new(EnvSecretStore::new(config.secret_param.clone())),
    }
}

/// A bundle handed out by the cache.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub bundle: Arc<CredentialBundle>,
    /// True when the bundle was loaded from the store for this call.
    pub fresh: bool,
}

struct CachedBundle {
    bundle: Arc<CredentialBundle>,
    loaded_at: Instant,
    /// Loaded by `refresh_stale` rather than by TTL expiry
    forced: bool,
}

/// Process-wide, read-mostly cache in front of a [`SecretStore`].
pub struct CredentialCache {
    store: Arc<dyn SecretStore>,
    ttl: Duration,
    min_refresh: Duration,
    cached: RwLock<Option<CachedBundle>>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn SecretStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            min_refresh: Duration::ZERO,
            cached: RwLock::new(None),
        }
    }

    /// Limit how often consecutive [`refresh_stale`](Self::refresh_stale)
    /// calls may hit the store.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh = interval;
        self
    }

    /// Return the cached bundle, loading it if absent or expired.
    pub async fn get(&self) -> Result<Credentials, SecretError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.loaded_at.elapsed() < self.ttl {
                    return Ok(Credentials {
                        bundle: Arc::clone(&entry.bundle),
                        fresh: false,
                    });
                }
            }
        }

        let mut cached = self.cached.write().await;

        // Double-check after acquiring write lock
        if let Some(entry) = cached.as_ref() {
            if entry.loaded_at.elapsed() < self.ttl {
                return Ok(Credentials {
                    bundle: Arc::clone(&entry.bundle),
                    fresh: false,
                });
            }
        }

        let bundle = self.load_into(&mut cached, false).await?;
        Ok(Credentials {
            bundle,
            fresh: true,
        })
    }

    /// Reload a bundle suspected to be stale.
    ///
    /// The first call after a regular load always reaches the store. Only a
    /// bundle that was itself produced by this method within the minimum
    /// refresh interval is kept, in which case `None` is returned.
    pub async fn refresh_stale(&self) -> Result<Option<Arc<CredentialBundle>>, SecretError> {
        let mut cached = self.cached.write().await;

        if let Some(entry) = cached.as_ref() {
            if entry.forced && entry.loaded_at.elapsed() < self.min_refresh {
                return Ok(None);
            }
        }

        self.load_into(&mut cached, true).await.map(Some)
    }

    async fn load_into(
        &self,
        slot: &mut Option<CachedBundle>,
        forced: bool,
    ) -> Result<Arc<CredentialBundle>, SecretError> {
        match self.store.load().await {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                *slot = Some(CachedBundle {
                    bundle: Arc::clone(&bundle),
                    loaded_at: Instant::now(),
                    forced,
                });
                info!(ttl_secs = self.ttl.as_secs(), "xero_credentials_loaded");
                Ok(bundle)
            }
            Err(e) => {
                warn!(error = %e, "xero_credentials_load_failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that counts loads; the bundle can be swapped mid-test.
    pub(crate) struct StaticStore {
        pub bundle: Mutex<Option<(String, String)>>,
        pub loads: AtomicUsize,
    }

    impl StaticStore {
        pub(crate) fn new(webhook_key: &str, access_token: &str) -> Self {
            Self {
                bundle: Mutex::new(Some((webhook_key.to_string(), access_token.to_string()))),
                loads: AtomicUsize::new(0),
            }
        }

        pub(crate) fn set(&self, webhook_key: &str, access_token: &str) {
            *self.bundle.lock().unwrap() =
                Some((webhook_key.to_string(), access_token.to_string()));
        }

        pub(crate) fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SecretStore for StaticStore {
        async fn load(&self) -> Result<CredentialBundle, SecretError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            match self.bundle.lock().unwrap().clone() {
                Some((webhook_key, access_token)) => Ok(CredentialBundle {
                    webhook_key,
                    access_token,
                }),
                None => Err(SecretError::NotFound("static".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_cache_reuses_bundle_within_ttl() {
        let store = Arc::new(StaticStore::new("key", "token"));
        let cache = CredentialCache::new(store.clone(), Duration::from_secs(60));

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert!(first.fresh);
        assert!(!second.fresh);
        assert_eq!(second.bundle.access_token, "token");
        assert_eq!(store.loads(), 1);
    }

    #[tokio::test]
    async fn test_cache_zero_ttl_always_reloads() {
        let store = Arc::new(StaticStore::new("key", "token"));
        let cache = CredentialCache::new(store.clone(), Duration::ZERO);

        assert!(cache.get().await.unwrap().fresh);
        assert!(cache.get().await.unwrap().fresh);
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_rotated_key() {
        let store = Arc::new(StaticStore::new("old-key", "token"));
        let cache = CredentialCache::new(store.clone(), Duration::from_secs(60));

        assert_eq!(cache.get().await.unwrap().bundle.webhook_key, "old-key");
        store.set("new-key", "token");
        assert_eq!(cache.get().await.unwrap().bundle.webhook_key, "old-key");

        let refreshed = cache.refresh_stale().await.unwrap().unwrap();
        assert_eq!(refreshed.webhook_key, "new-key");
        assert_eq!(cache.get().await.unwrap().bundle.webhook_key, "new-key");
    }

    #[tokio::test]
    async fn test_refresh_stale_reloads_young_bundle_once() {
        let store = Arc::new(StaticStore::new("old-key", "token"));
        let cache = CredentialCache::new(store.clone(), Duration::from_secs(300))
            .with_min_refresh_interval(Duration::from_secs(30));

        cache.get().await.unwrap();
        store.set("new-key", "token");

        let refreshed = cache.refresh_stale().await.unwrap();
        assert_eq!(refreshed.unwrap().webhook_key, "new-key");
        assert_eq!(store.loads(), 2);

        // A second forced reload inside the interval is throttled.
        assert!(cache.refresh_stale().await.unwrap().is_none());
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn test_refresh_stale_without_interval_always_reloads() {
        let store = Arc::new(StaticStore::new("key", "token"));
        let cache = CredentialCache::new(store.clone(), Duration::from_secs(60));

        cache.get().await.unwrap();
        assert!(cache.refresh_stale().await.unwrap().is_some());
        assert!(cache.refresh_stale().await.unwrap().is_some());
        assert_eq!(store.loads(), 3);
    }

    #[tokio::test]
    async fn test_load_failure_is_reported() {
        let store = Arc::new(StaticStore::new("key", "token"));
        *store.bundle.lock().unwrap() = None;
        let cache = CredentialCache::new(store.clone(), Duration::from_secs(60));

        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_env_store() {
        std::env::set_var(
            "TEST_XERO_PARAMS_ENV_STORE",
            r#"{"xero_webhook_key": "k", "xero_access_token": "t"}"#,
        );
        let bundle = EnvSecretStore::new("TEST_XERO_PARAMS_ENV_STORE")
            .load()
            .await
            .unwrap();
        assert_eq!(bundle.webhook_key, "k");
        assert_eq!(bundle.access_token, "t");
        std::env::remove_var("TEST_XERO_PARAMS_ENV_STORE");

        let err = EnvSecretStore::new("TEST_XERO_PARAMS_ENV_STORE")
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_env_store_invalid_json() {
        std::env::set_var("TEST_XERO_PARAMS_INVALID", r#"{"xero_webhook_key": "k"}"#);
        let err = EnvSecretStore::new("TEST_XERO_PARAMS_INVALID")
            .load()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("xero_access_token"));
        std::env::remove_var("TEST_XERO_PARAMS_INVALID");
    }

    #[tokio::test]
    async fn test_file_store() {
        let path = std::env::temp_dir().join(format!(
            "xero-relay-secret-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"xero_webhook_key": "fk", "xero_access_token": "ft"}"#)
            .unwrap();

        let bundle = FileSecretStore::new(&path).load().await.unwrap();
        assert_eq!(bundle.webhook_key, "fk");
        std::fs::remove_file(&path).unwrap();

        let err = FileSecretStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, SecretError::Io { .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let bundle = CredentialBundle {
            webhook_key: "super-secret".to_string(),
            access_token: "bearer-secret".to_string(),
        };
        let printed = format!("{:?}", bundle);
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("bearer-secret"));
    }
}

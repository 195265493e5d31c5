//! Access tokens cached per (delegate, scope set).

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::cache::TtlCache;

/// Cache key: who the token acts as, and for which scopes. Scope order and
/// duplicates do not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub delegate: Option<String>,
    pub scopes: BTreeSet<String>,
}

impl TokenKey {
    pub fn new<I, S>(delegate: Option<&str>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delegate: delegate.map(str::to_string),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<SystemTime>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("token refresh i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Mints fresh tokens. Implemented by whatever owns the real credentials.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn refresh(
        &self,
        delegate: Option<&str>,
        scopes: &BTreeSet<String>,
    ) -> Result<AccessToken, TokenError>;
}

/// Caching front for a [`TokenSource`].
pub struct TokenGenerator<S> {
    source: S,
    cache: Mutex<TtlCache<TokenKey, AccessToken>>,
}

impl<S: TokenSource> TokenGenerator<S> {
    pub fn new(source: S, max_entries: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            source,
            cache: Mutex::new(TtlCache::new(max_entries, ttl)),
        }
    }

    pub async fn access_token<I, T>(&self, scopes: I) -> Result<AccessToken, TokenError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.get_or_refresh(TokenKey::new(None, scopes)).await
    }

    pub async fn delegated_access_token<I, T>(
        &self,
        delegate: &str,
        scopes: I,
    ) -> Result<AccessToken, TokenError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.get_or_refresh(TokenKey::new(Some(delegate), scopes))
            .await
    }

    /// The cache lock is held across the refresh, so concurrent callers for
    /// a missing key wait for one refresh instead of issuing several.
    async fn get_or_refresh(&self, key: TokenKey) -> Result<AccessToken, TokenError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(&key) {
            return Ok(token);
        }
        tracing::debug!(delegate = ?key.delegate, scopes = ?key.scopes, "refreshing access token");
        let token = self
            .source
            .refresh(key.delegate.as_deref(), &key.scopes)
            .await?;
        cache.insert(key, token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenSource for Counting {
        async fn refresh(
            &self,
            delegate: Option<&str>,
            scopes: &BTreeSet<String>,
        ) -> Result<AccessToken, TokenError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
            Ok(AccessToken {
                value: format!("{}:{}:{}", delegate.unwrap_or("-"), scopes.join(","), n),
                expires_at: None,
            })
        }
    }

    #[tokio::test]
    async fn same_scope_set_hits_cache_in_any_order() {
        let generator = TokenGenerator::new(Counting::default(), None, None);
        let a = generator.access_token(["read", "write"]).await.unwrap();
        let b = generator.access_token(["write", "read", "read"]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(generator.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delegate_is_part_of_the_key() {
        let generator = TokenGenerator::new(Counting::default(), None, None);
        let own = generator.access_token(["read"]).await.unwrap();
        let delegated = generator
            .delegated_access_token("ops@example.com", ["read"])
            .await
            .unwrap();
        assert_ne!(own, delegated);
        assert!(delegated.value.starts_with("ops@example.com:"));
        assert_eq!(generator.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delegate_never_collides_with_a_scope_name() {
        let generator = TokenGenerator::new(Counting::default(), None, None);
        let scoped = generator.access_token(["admin", "read"]).await.unwrap();
        let delegated = generator
            .delegated_access_token("admin", ["read"])
            .await
            .unwrap();
        assert_ne!(scoped, delegated);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_is_refreshed() {
        let generator =
            TokenGenerator::new(Counting::default(), Some(10), Some(Duration::from_secs(300)));
        let first = generator.access_token(["read"]).await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        let second = generator.access_token(["read"]).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(generator.source.calls.load(Ordering::SeqCst), 2);
    }
}

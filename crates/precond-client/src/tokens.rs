//! Access-token lifecycle

use std::sync::Arc;

use tracing::{debug, info, warn};

use precond_core::{
    keys, MemoryTokenStore, PrecondError, PrimaryCredential, Result, TokenPair, TokenStore,
};

use crate::auth::TokenExchange;

/// Refresh attempts per call while the stored refresh token keeps moving
const REFRESH_ROUNDS: usize = 3;

/// Produces a usable access token from whatever credential is available.
///
/// Resolution order: cached access token, refresh-token exchange, primary
/// credential exchange. All token state lives in the injected store.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    exchange: Option<Arc<dyn TokenExchange>>,
    primary: Option<PrimaryCredential>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, exchange: Option<Arc<dyn TokenExchange>>) -> Self {
        Self {
            store,
            exchange,
            primary: None,
        }
    }

    /// Fall back to this credential once no refresh token is left
    pub fn with_primary_credential(mut self, credential: PrimaryCredential) -> Self {
        self.primary = Some(credential);
        self
    }

    /// Request-scoped manager holding a caller-supplied token only.
    ///
    /// Nothing can be refreshed: once the token is invalidated every call
    /// fails with `NoCredential`.
    pub fn ephemeral(access_token: &str) -> Self {
        let store = MemoryTokenStore::with_entries([(keys::ACCESS_TOKEN, access_token)]);
        Self::new(Arc::new(store), None)
    }

    /// Backing store
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Return a valid access token, exchanging credentials if needed
    pub async fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_access_token().await? {
            return Ok(token);
        }

        let Some(exchange) = self.exchange.as_ref() else {
            return Err(PrecondError::NoCredential);
        };

        let mut presented = self.store.get(keys::REFRESH_TOKEN).await?;
        for _ in 0..REFRESH_ROUNDS {
            let Some(refresh_token) = presented.take() else {
                break;
            };
            debug!("Exchanging refresh token");
            let pair = exchange.refresh(&refresh_token).await?;
            if let Some(access_token) = pair.access_token {
                self.persist(&access_token, pair.refresh_token.as_deref())
                    .await?;
                info!("Access token refreshed");
                return Ok(access_token);
            }

            // A concurrent caller may have rotated the token we presented
            if let Some(token) = self.cached_access_token().await? {
                debug!("Refresh token rotated concurrently, using the new access token");
                return Ok(token);
            }
            match self.store.get(keys::REFRESH_TOKEN).await? {
                Some(current) if current != refresh_token => {
                    debug!("Refresh token rotated concurrently, retrying");
                    presented = Some(current);
                }
                current => {
                    if current.is_some() {
                        warn!("Refresh token rejected, discarding it");
                        self.store.delete(keys::REFRESH_TOKEN).await?;
                    }
                    return Err(PrecondError::RefreshFailed(
                        "refresh token was rejected".to_string(),
                    ));
                }
            }
        }
        if presented.is_some() {
            return Err(PrecondError::RefreshFailed(
                "refresh token keeps rotating".to_string(),
            ));
        }

        if let Some(primary) = self.primary.as_ref() {
            debug!(identity = %primary.identity, "Exchanging primary credential");
            let TokenPair {
                access_token,
                refresh_token,
            } = exchange.login(primary).await?;
            let Some(access_token) = access_token else {
                return Err(PrecondError::RefreshFailed(
                    "primary credential was rejected".to_string(),
                ));
            };
            self.persist(&access_token, refresh_token.as_deref()).await?;
            info!("Access token obtained from primary credential");
            return Ok(access_token);
        }

        Err(PrecondError::NoCredential)
    }

    /// Forget the cached access token; the refresh token is kept
    pub async fn invalidate(&self) -> Result<()> {
        debug!("Invalidating access token");
        self.store.delete(keys::ACCESS_TOKEN).await
    }

    async fn cached_access_token(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(keys::ACCESS_TOKEN)
            .await?
            .filter(|token| !token.is_empty()))
    }

    async fn persist(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        match refresh_token {
            Some(refresh_token) => {
                self.store
                    .put_many(&[
                        (keys::ACCESS_TOKEN, access_token),
                        (keys::REFRESH_TOKEN, refresh_token),
                    ])
                    .await
            }
            None => self.store.put(keys::ACCESS_TOKEN, access_token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTokenExchange;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    /// Provider that accepts only its current refresh token and rotates it
    /// on every successful exchange
    struct RotatingExchange {
        current: Mutex<String>,
        generation: AtomicUsize,
        calls: AtomicUsize,
        /// The first `gated` calls meet here before answering
        gated: usize,
        barrier: Barrier,
        /// Store updated with the current token on every rejection
        shared_store: Option<Arc<MemoryTokenStore>>,
    }

    impl RotatingExchange {
        fn new(current: &str) -> Self {
            Self {
                current: Mutex::new(current.to_string()),
                generation: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                gated: 0,
                barrier: Barrier::new(2),
                shared_store: None,
            }
        }

        fn gated(mut self, calls: usize) -> Self {
            self.gated = calls;
            self
        }

        fn sharing(mut self, store: Arc<MemoryTokenStore>) -> Self {
            self.shared_store = Some(store);
            self
        }

        fn current(&self) -> String {
            self.current.lock().clone()
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenExchange for RotatingExchange {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.gated {
                self.barrier.wait().await;
            }
            let rotated = {
                let mut current = self.current.lock();
                if *current == refresh_token {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    *current = format!("r{}", generation);
                    Some(TokenPair::new(format!("a{}", generation), current.clone()))
                } else {
                    None
                }
            };
            match rotated {
                Some(pair) => Ok(pair),
                None => {
                    if let Some(store) = &self.shared_store {
                        store.put(keys::REFRESH_TOKEN, &self.current()).await?;
                    }
                    Ok(TokenPair::empty())
                }
            }
        }

        async fn login(&self, _credential: &PrimaryCredential) -> Result<TokenPair> {
            Ok(TokenPair::empty())
        }
    }

    fn manager(
        entries: &[(&str, &str)],
        exchange: Arc<MockTokenExchange>,
    ) -> (TokenManager, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::with_entries(entries.iter().copied()));
        let manager = TokenManager::new(store.clone(), Some(exchange));
        (manager, store)
    }

    #[tokio::test]
    async fn test_cached_token_needs_no_exchange() {
        let exchange = Arc::new(MockTokenExchange::new());
        let (manager, _) = manager(&[(keys::ACCESS_TOKEN, "a0")], exchange.clone());

        assert_eq!(manager.get_access_token().await.unwrap(), "a0");
        assert_eq!(exchange.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_persists_both_tokens() {
        let exchange = Arc::new(MockTokenExchange::new().on_refresh(TokenPair::new("a1", "r1")));
        let (manager, store) = manager(&[(keys::REFRESH_TOKEN, "r0")], exchange.clone());

        assert_eq!(manager.get_access_token().await.unwrap(), "a1");
        assert_eq!(exchange.refresh_calls(), 1);
        assert_eq!(exchange.last_refresh_token().as_deref(), Some("r0"));
        assert_eq!(
            store.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(),
            Some("a1")
        );
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(),
            Some("r1")
        );
    }

    #[tokio::test]
    async fn test_refresh_without_new_refresh_token_keeps_old_one() {
        let exchange = Arc::new(MockTokenExchange::new().on_refresh(TokenPair {
            access_token: Some("a1".into()),
            refresh_token: None,
        }));
        let (manager, store) = manager(&[(keys::REFRESH_TOKEN, "r0")], exchange);

        manager.get_access_token().await.unwrap();
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(),
            Some("r0")
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_deletes_refresh_token() {
        let exchange = Arc::new(MockTokenExchange::new().on_refresh(TokenPair::empty()));
        let (manager, store) = manager(&[(keys::REFRESH_TOKEN, "r0")], exchange);

        let err = manager.get_access_token().await.unwrap_err();
        assert!(matches!(err, PrecondError::RefreshFailed(_)));
        assert!(!store.contains(keys::REFRESH_TOKEN));

        // Nothing left to try
        let err = manager.get_access_token().await.unwrap_err();
        assert!(matches!(err, PrecondError::NoCredential));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_keeps_rotated_token() {
        let exchange = Arc::new(RotatingExchange::new("r0").gated(2));
        let store = Arc::new(MemoryTokenStore::with_entries([(keys::REFRESH_TOKEN, "r0")]));
        let manager = TokenManager::new(store.clone(), Some(exchange.clone()));

        // Both callers present r0; only one of them wins the rotation
        let (a, b) = tokio::join!(manager.get_access_token(), manager.get_access_token());
        assert_eq!(a.unwrap(), "a1");
        assert_eq!(b.unwrap(), "a1");
        assert_eq!(exchange.current(), "r1");
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(),
            Some("r1")
        );

        // The rotated token still works afterwards
        manager.invalidate().await.unwrap();
        assert_eq!(manager.get_access_token().await.unwrap(), "a2");
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(),
            Some("r2")
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_retries_with_rotated_token() {
        let store = Arc::new(MemoryTokenStore::with_entries([(keys::REFRESH_TOKEN, "r0")]));
        // Provider already moved on to r0b; the rotation lands in the store
        // while our stale exchange is in flight
        let exchange = Arc::new(RotatingExchange::new("r0b").sharing(store.clone()));
        let manager = TokenManager::new(store.clone(), Some(exchange.clone()));

        assert_eq!(manager.get_access_token().await.unwrap(), "a1");
        assert_eq!(exchange.calls(), 2);
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(),
            Some("r1")
        );
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_refresh_token() {
        let exchange = Arc::new(MockTokenExchange::new().failing_refresh("connection reset"));
        let (manager, store) = manager(&[(keys::REFRESH_TOKEN, "r0")], exchange);

        let err = manager.get_access_token().await.unwrap_err();
        assert!(matches!(err, PrecondError::RefreshFailed(_)));
        assert!(store.contains(keys::REFRESH_TOKEN));
    }

    #[tokio::test]
    async fn test_falls_back_to_primary_credential_after_refresh_is_discarded() {
        let exchange = Arc::new(
            MockTokenExchange::new()
                .on_refresh(TokenPair::empty())
                .on_login(TokenPair::new("a2", "r2")),
        );
        let store = Arc::new(MemoryTokenStore::with_entries([(keys::REFRESH_TOKEN, "r0")]));
        let manager = TokenManager::new(store.clone(), Some(exchange.clone()))
            .with_primary_credential(PrimaryCredential::new("owner@example.com", "pw"));

        assert!(manager.get_access_token().await.is_err());
        assert_eq!(manager.get_access_token().await.unwrap(), "a2");
        assert_eq!(exchange.login_calls(), 1);
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(),
            Some("r2")
        );
    }

    #[tokio::test]
    async fn test_no_credential() {
        let exchange = Arc::new(MockTokenExchange::new());
        let (manager, _) = manager(&[], exchange);
        assert!(matches!(
            manager.get_access_token().await.unwrap_err(),
            PrecondError::NoCredential
        ));
    }

    #[tokio::test]
    async fn test_invalidate_clears_access_token_only() {
        let exchange = Arc::new(MockTokenExchange::new());
        let (manager, store) = manager(
            &[(keys::ACCESS_TOKEN, "a0"), (keys::REFRESH_TOKEN, "r0")],
            exchange,
        );

        manager.invalidate().await.unwrap();
        assert!(!store.contains(keys::ACCESS_TOKEN));
        assert!(store.contains(keys::REFRESH_TOKEN));
    }

    #[tokio::test]
    async fn test_ephemeral_manager_cannot_refresh() {
        let manager = TokenManager::ephemeral("caller-token");
        assert_eq!(manager.get_access_token().await.unwrap(), "caller-token");

        manager.invalidate().await.unwrap();
        assert!(matches!(
            manager.get_access_token().await.unwrap_err(),
            PrecondError::NoCredential
        ));
    }
}

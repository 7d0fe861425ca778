//! Application state for the preconditioning API

use std::sync::Arc;

use precond_client::{
    CommandDispatcher, DispatchPolicy, OwnerApiClient, RetryConfig, SessionController,
    TokenManager, VehicleResolver, WakeOrchestrator, WakePolicy,
};
use precond_core::{Delay, MemoryTokenStore, PrecondError, Result, TokioDelay};

use crate::request::CallerCredential;

/// Vehicle ids cached for caller-token sessions; a miss costs one list fetch
pub const CALLER_VIN_CACHE_CAPACITY: usize = 1024;

/// Credentials held by the deployment, unlocked by the pre-shared token
#[derive(Clone)]
struct Account {
    access_secret: String,
    tokens: Arc<TokenManager>,
    resolver: VehicleResolver,
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    client: OwnerApiClient,
    delay: Arc<dyn Delay>,
    dispatch_policy: DispatchPolicy,
    wake_policy: WakePolicy,
    /// VIN cache for sessions authenticated with a caller-owned token
    caller_resolver: VehicleResolver,
    account: Option<Account>,
}

impl AppState {
    /// Create a new AppState talking to the owner API through `client`
    pub fn new(client: OwnerApiClient, retry: &RetryConfig) -> Self {
        Self {
            client,
            delay: Arc::new(TokioDelay),
            dispatch_policy: DispatchPolicy::from(retry),
            wake_policy: WakePolicy::from(retry),
            caller_resolver: VehicleResolver::new(Arc::new(MemoryTokenStore::bounded(
                CALLER_VIN_CACHE_CAPACITY,
            ))),
            account: None,
        }
    }

    /// Replace the delay used by every retry loop
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Enable pre-shared token mode.
    ///
    /// Requests presenting `access_secret` run against `tokens`, and their
    /// VIN cache lives in the same store.
    pub fn with_account(
        mut self,
        access_secret: impl Into<String>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        let resolver = VehicleResolver::new(tokens.store().clone());
        self.account = Some(Account {
            access_secret: access_secret.into(),
            tokens,
            resolver,
        });
        self
    }

    /// Build the session for one request
    pub fn session_for(&self, credential: &CallerCredential) -> Result<SessionController> {
        let (tokens, resolver) = match credential {
            CallerCredential::AccessToken(token) => (
                Arc::new(TokenManager::ephemeral(token)),
                self.caller_resolver.clone(),
            ),
            CallerCredential::SharedSecret(secret) => match &self.account {
                Some(account) if account.access_secret == *secret => {
                    (account.tokens.clone(), account.resolver.clone())
                }
                _ => {
                    return Err(PrecondError::InvalidRequest(
                        "Invalid access token".to_string(),
                    ))
                }
            },
            CallerCredential::None => return Err(PrecondError::NoCredential),
        };

        let dispatcher = CommandDispatcher::new(
            self.client.clone(),
            tokens,
            self.delay.clone(),
            self.dispatch_policy,
        );
        let wake = WakeOrchestrator::new(self.delay.clone(), self.wake_policy);

        Ok(SessionController::new(dispatcher, resolver, wake))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let client = OwnerApiClient::new("http://127.0.0.1:9").unwrap();
        AppState::new(client, &RetryConfig::default())
    }

    #[test]
    fn test_missing_credential() {
        let err = state().session_for(&CallerCredential::None).err().unwrap();
        assert_eq!(err.to_string(), "No access token provided");
    }

    #[test]
    fn test_shared_secret_without_account_is_rejected() {
        let err = state()
            .session_for(&CallerCredential::SharedSecret("s".into()))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Invalid access token");
    }

    #[test]
    fn test_shared_secret_must_match() {
        let tokens = Arc::new(TokenManager::ephemeral("a0"));
        let state = state().with_account("secret", tokens);

        assert!(state
            .session_for(&CallerCredential::SharedSecret("secret".into()))
            .is_ok());
        assert!(state
            .session_for(&CallerCredential::SharedSecret("guess".into()))
            .is_err());
    }

    #[test]
    fn test_caller_token_session() {
        assert!(state()
            .session_for(&CallerCredential::AccessToken("a".into()))
            .is_ok());
    }
}

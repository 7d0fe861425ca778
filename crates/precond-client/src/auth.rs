//! OAuth token exchange

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use precond_core::{PrecondError, PrimaryCredential, Result, TokenPair};

/// Scope requested with every grant
const SCOPE: &str = "openid email offline_access";

/// Exchanges long-lived credentials for a token pair.
///
/// A rejected grant is reported as `Ok` with an empty [`TokenPair`];
/// `Err(RefreshFailed)` is reserved for failures where the credential may
/// still be valid (network errors, server errors).
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange a refresh token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair>;

    /// Exchange the primary credential
    async fn login(&self, credential: &PrimaryCredential) -> Result<TokenPair>;
}

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum GrantRequest<'a> {
    RefreshToken {
        client_id: &'a str,
        refresh_token: &'a str,
        scope: &'a str,
    },
    Password {
        client_id: &'a str,
        email: &'a str,
        password: &'a str,
        scope: &'a str,
    },
}

#[derive(Deserialize)]
struct GrantResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Token exchange against an OAuth2 token endpoint
#[derive(Debug, Clone)]
pub struct OAuthTokenExchange {
    client: Client,
    token_url: Url,
    client_id: String,
}

impl OAuthTokenExchange {
    pub fn new(client: Client, token_url: &str, client_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            token_url: Url::parse(token_url)?,
            client_id: client_id.into(),
        })
    }

    async fn grant(&self, request: &GrantRequest<'_>) -> Result<TokenPair> {
        let response = self
            .client
            .post(self.token_url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| PrecondError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                warn!(status = status.as_u16(), "Token grant rejected");
                Ok(TokenPair::empty())
            }
            s if s.is_success() => {
                let body: GrantResponse = response
                    .json()
                    .await
                    .map_err(|e| PrecondError::RefreshFailed(e.to_string()))?;
                debug!("Token grant succeeded");
                Ok(TokenPair {
                    access_token: non_empty(body.access_token),
                    refresh_token: non_empty(body.refresh_token),
                })
            }
            s => Err(PrecondError::RefreshFailed(format!(
                "token endpoint returned {}",
                s.as_u16()
            ))),
        }
    }
}

#[async_trait]
impl TokenExchange for OAuthTokenExchange {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.grant(&GrantRequest::RefreshToken {
            client_id: &self.client_id,
            refresh_token,
            scope: SCOPE,
        })
        .await
    }

    #[instrument(skip_all, fields(identity = %credential.identity))]
    async fn login(&self, credential: &PrimaryCredential) -> Result<TokenPair> {
        self.grant(&GrantRequest::Password {
            client_id: &self.client_id,
            email: &credential.identity,
            password: &credential.secret,
            scope: SCOPE,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_request_shape() {
        let body = serde_json::to_value(GrantRequest::RefreshToken {
            client_id: "ownerapi",
            refresh_token: "r1",
            scope: SCOPE,
        })
        .unwrap();
        assert_eq!(body["grant_type"], "refresh_token");
        assert_eq!(body["refresh_token"], "r1");
        assert_eq!(body["client_id"], "ownerapi");

        let body = serde_json::to_value(GrantRequest::Password {
            client_id: "ownerapi",
            email: "owner@example.com",
            password: "pw",
            scope: SCOPE,
        })
        .unwrap();
        assert_eq!(body["grant_type"], "password");
        assert_eq!(body["email"], "owner@example.com");
    }

    #[test]
    fn test_empty_strings_are_missing_tokens() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("a".into())).as_deref(), Some("a"));
    }
}

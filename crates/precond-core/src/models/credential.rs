//! Credential models
//!
//! None of these types print secret material through `Debug`.

use std::fmt;

use serde::{Deserialize, Serialize};

fn redact(value: Option<&String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<none>"
    }
}

/// Account identity and secret exchanged for a token pair when no refresh
/// token is available
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryCredential {
    pub identity: String,
    pub secret: String,
}

impl PrimaryCredential {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for PrimaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryCredential")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Token pair returned by an exchange.
///
/// Either half may be missing: a response without an access token means the
/// grant was rejected, a response without a refresh token means the old one
/// stays valid.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// A pair carrying no tokens at all (rejected grant)
    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &redact(self.access_token.as_ref()))
            .field("refresh_token", &redact(self.refresh_token.as_ref()))
            .finish()
    }
}

//! Configuration file handling for preconditiond

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use precond_client::{ApiConfig, RetryConfig};
use precond_core::PrimaryCredential;

/// Daemon configuration, read from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Listening address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Credentials held by the deployment for pre-shared token mode
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Token callers present to use the stored credentials
    #[serde(default)]
    pub access_secret: Option<String>,
    /// Seed refresh token, used only while the store holds none
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Token store file (default: `<data dir>/preconditiond/tokens.json`)
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl CredentialsConfig {
    /// Primary credential, when both halves are configured
    pub fn primary(&self) -> Option<PrimaryCredential> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(PrimaryCredential::new(email, password)),
            _ => None,
        }
    }

    /// Whether anything beyond the access secret is configured
    pub fn has_stored_credentials(&self) -> bool {
        self.refresh_token.is_some() || self.primary().is_some()
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<redacted>" } else { "<none>" };
        f.debug_struct("CredentialsConfig")
            .field("access_secret", &redact(&self.access_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("email", &self.email)
            .field("password", &redact(&self.password))
            .field("store_path", &self.store_path)
            .finish()
    }
}

impl ServiceConfig {
    /// Load configuration from `path`; defaults when no file is given or
    /// the file does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load_from(path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.bind, self.server.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind))
    }

    /// Token store location, falling back to the platform data directory
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials.store_path {
            return Ok(path.clone());
        }
        let dir = dirs::data_local_dir()
            .context("Could not determine data directory")?
            .join("preconditiond");
        Ok(dir.join("tokens.json"))
    }
}

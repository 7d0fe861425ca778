//! preconditiond - Vehicle preconditioning daemon
//!
//! Serves the preconditioning endpoint. Callers either bring their own
//! owner API access token, or present the pre-shared access secret to use
//! the credentials held by this deployment.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use precond_api::{create_router, AppState};
use precond_client::{OAuthTokenExchange, OwnerApiClient, TokenManager};
use precond_core::{keys, FileTokenStore, TokenStore};

use crate::config::ServiceConfig;

#[derive(Parser)]
#[command(name = "preconditiond")]
#[command(author, version, about = "Vehicle preconditioning daemon")]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "PRECOND_CONFIG")]
    config: Option<PathBuf>,

    /// Listening port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Token store file, overrides the config file
    #[arg(long)]
    store: Option<PathBuf>,

    /// Pre-shared token callers present instead of an access token
    #[arg(long, env = "PRECOND_ACCESS_SECRET", hide_env_values = true)]
    access_secret: Option<String>,

    /// Seed refresh token
    #[arg(long, env = "PRECOND_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Account email for the password grant
    #[arg(long, env = "PRECOND_EMAIL")]
    email: Option<String>,

    /// Account password for the password grant
    #[arg(long, env = "PRECOND_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl Cli {
    /// Apply command-line and environment overrides
    fn apply(self, config: &mut ServiceConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        let credentials = &mut config.credentials;
        if self.store.is_some() {
            credentials.store_path = self.store;
        }
        if self.access_secret.is_some() {
            credentials.access_secret = self.access_secret;
        }
        if self.refresh_token.is_some() {
            credentials.refresh_token = self.refresh_token;
        }
        if self.email.is_some() {
            credentials.email = self.email;
        }
        if self.password.is_some() {
            credentials.password = self.password;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "preconditiond=info,precond_api=info,precond_client=info".into()
        }))
        .with(fmt::layer())
        .init();

    tracing::info!("Starting preconditiond");

    let cli = Cli::parse();
    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    match &cli.config {
        Some(path) if path.exists() => tracing::info!("Loaded config from: {}", path.display()),
        Some(path) => tracing::warn!("Config file {} not found, using defaults", path.display()),
        None => tracing::info!("No config file provided, using defaults"),
    }
    cli.apply(&mut config);

    let client = OwnerApiClient::with_config(
        &config.api.base_url,
        config.api.request_timeout(),
        config.api.connect_timeout(),
    )
    .context("Failed to create owner API client")?;

    let mut state = AppState::new(client.clone(), &config.retry);

    match config.credentials.access_secret.clone() {
        Some(secret) => {
            let tokens = account_tokens(&config, &client).await?;
            state = state.with_account(secret, Arc::new(tokens));
            tracing::info!("Pre-shared token mode enabled");
        }
        None if config.credentials.has_stored_credentials() => {
            tracing::warn!("Stored credentials configured without an access secret; ignoring them");
        }
        None => {}
    }

    let app = create_router(state);

    let addr = config.socket_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

/// Token manager over the persistent store for pre-shared token mode
async fn account_tokens(config: &ServiceConfig, client: &OwnerApiClient) -> Result<TokenManager> {
    let path = config.store_path()?;
    let store = FileTokenStore::open(&path)
        .await
        .with_context(|| format!("Failed to open token store: {}", path.display()))?;
    tracing::info!("Using token store at {}", store.path().display());

    // A rotated refresh token in the store wins over the configured seed
    if let Some(seed) = &config.credentials.refresh_token {
        if store.get(keys::REFRESH_TOKEN).await?.is_none() {
            store.put(keys::REFRESH_TOKEN, seed).await?;
            tracing::info!("Seeded refresh token");
        }
    }

    let exchange = OAuthTokenExchange::new(
        client.http_client().clone(),
        &config.api.token_url,
        config.api.client_id.clone(),
    )?;

    let mut tokens = TokenManager::new(Arc::new(store), Some(Arc::new(exchange)));
    if let Some(primary) = config.credentials.primary() {
        tokens = tokens.with_primary_credential(primary);
    }
    Ok(tokens)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

//! Owner API client and preconditioning orchestration
//!
//! Layered leaf-first:
//!
//! - [`OwnerApiClient`]: one bearer-authenticated request per call
//! - [`TokenManager`]: cached token, refresh exchange, primary credential
//! - [`CommandDispatcher`]: 408/401/404 response policy over the client
//! - [`VehicleResolver`]: VIN to internal id, cached in the store
//! - [`WakeOrchestrator`]: wake request plus bounded state polling
//! - [`SessionController`]: the full resolve, wake, climate, seats sequence
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use precond_client::{
//!     CommandDispatcher, DispatchPolicy, OwnerApiClient, PreconditionRequest,
//!     SessionController, TokenManager, VehicleResolver, WakeOrchestrator, WakePolicy,
//! };
//! use precond_core::TokioDelay;
//!
//! # async fn run() -> precond_core::Result<()> {
//! let client = OwnerApiClient::new("https://owner-api.teslamotors.com")?;
//! let tokens = Arc::new(TokenManager::ephemeral("access-token"));
//! let resolver = VehicleResolver::new(tokens.store().clone());
//! let dispatcher =
//!     CommandDispatcher::new(client, tokens, Arc::new(TokioDelay), DispatchPolicy::default());
//! let wake = WakeOrchestrator::new(Arc::new(TokioDelay), WakePolicy::default());
//!
//! let session = SessionController::new(dispatcher, resolver, wake);
//! let message = session
//!     .run(&PreconditionRequest {
//!         vin: "5YJ3E1EA7KF000001".into(),
//!         temperature: Some(21.0),
//!         seats: vec![Some(3), None, Some(3)],
//!     })
//!     .await;
//! println!("{}", message);
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process owner API and test doubles:
//!
//! ```rust,ignore
//! use precond_client::testing::{MockOwnerApi, RecordingDelay, TestServer};
//!
//! let api = MockOwnerApi::new().with_vehicle("V1", "VIN1", VehicleState::Asleep);
//! let server = TestServer::start(api.router()).await?;
//! ```

pub mod auth;
mod client;
pub mod config;
mod dispatcher;
mod resolver;
mod session;
pub mod testing;
mod tokens;
mod types;
mod wake;

pub use auth::{OAuthTokenExchange, TokenExchange};
pub use client::{Endpoint, OwnerApiClient};
pub use config::{ApiConfig, RetryConfig};
pub use dispatcher::{CommandDispatcher, DispatchPolicy};
pub use resolver::VehicleResolver;
pub use session::{PreconditionRequest, SessionController};
pub use tokens::TokenManager;
pub use types::*;
pub use wake::{WakeOrchestrator, WakePolicy};

// Re-export core types for convenience
pub use precond_core::{PrecondError, Result};

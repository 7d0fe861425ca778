//! precond-api - HTTP endpoint for vehicle preconditioning
//!
//! One endpoint, `/`, accepting GET or POST. Credentials and parameters come
//! from `X-Tesla-*` headers or the query string; the answer is always `200`
//! with `{"response": "<message>"}`.
//!
//! # Usage
//!
//! ```ignore
//! use precond_api::{create_router, AppState};
//! use precond_client::{OwnerApiClient, RetryConfig};
//!
//! let client = OwnerApiClient::new("https://owner-api.teslamotors.com")?;
//! let state = AppState::new(client, &RetryConfig::default());
//! let router = create_router(state);
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod state;

pub use error::{ApiError, MessageResponse};
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the preconditioning router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        .route(
            "/",
            get(handlers::precondition::precondition).post(handlers::precondition::precondition),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

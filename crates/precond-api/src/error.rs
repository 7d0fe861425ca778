//! API error rendering
//!
//! The endpoint never signals failure through the status code: every error
//! is rendered as `200` with `{"response": "Error: <message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use precond_core::PrecondError;

/// Body of every response from the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub response: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            response: message.into(),
        }
    }

    pub fn error(err: &PrecondError) -> Self {
        Self::new(format!("Error: {}", err))
    }
}

/// Error raised before a session could run
#[derive(Debug)]
pub struct ApiError(pub PrecondError);

impl From<PrecondError> for ApiError {
    fn from(err: PrecondError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(kind = self.0.kind(), error = %self.0, "Request rejected");
        (StatusCode::OK, Json(MessageResponse::error(&self.0))).into_response()
    }
}

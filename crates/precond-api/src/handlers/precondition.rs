//! Preconditioning handler

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use tracing::info;

use precond_core::PrecondError;

use crate::error::{ApiError, MessageResponse};
use crate::request::{PreconditionParams, PreconditionQuery};
use crate::state::AppState;

/// Wake the vehicle and start preconditioning
///
/// GET|POST /
pub async fn precondition(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PreconditionQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    // A malformed query string still gets the usual JSON error body
    let Query(query) = query.map_err(|e| PrecondError::InvalidRequest(e.body_text()))?;
    let params = PreconditionParams::from_parts(&headers, query);
    let session = state.session_for(&params.credential())?;
    let request = params.to_request()?;

    info!(
        vin = %request.vin,
        temperature = ?request.temperature,
        seats = request.seats.len(),
        "Preconditioning request"
    );

    let message = session.run(&request).await;
    Ok(Json(MessageResponse::new(message)))
}

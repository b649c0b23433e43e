use crate::{error::ApiError, state::AppState};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

/// Guards admin routes with `Authorization: Bearer <ADMIN_TOKEN>` when a token is configured.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if !provided.is_some_and(|provided| tokens_match(provided.as_bytes(), expected.as_bytes())) {
        warn!(path = %request.uri().path(), "rejected admin request");
        return Err(ApiError::unauthorized());
    }

    Ok(next.run(request).await)
}

/// Compares every byte regardless of where the first mismatch is.
fn tokens_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::token::TokenService;
use crate::gateway::types::ApiError;

/// Verify the Bearer token and make its `Claims` available to handlers.
pub async fn jwt_auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::missing_auth("Missing Authorization header"))?;

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return ApiError::unauthorized("Invalid token format").into_err();
    };

    // 2. Verify Token
    match tokens.verify(token) {
        Ok(claims) => {
            // 3. Inject claims
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => ApiError::unauthorized("Invalid or expired token").into_err(),
    }
}

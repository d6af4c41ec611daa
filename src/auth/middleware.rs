//! Authentication Middleware
//! Mission: Protect API endpoints with access-token validation

use crate::auth::jwt::{JwtIssuer, TokenError};
use crate::auth::models::AuthenticatedActor;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Auth middleware that validates access tokens and attaches the caller
/// identity to the request.
pub async fn require_auth(
    State(issuer): State<Arc<JwtIssuer>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let token = bearer_token(&req).ok_or(AuthRejection::MissingToken)?;

    let claims = issuer.verify(&token).map_err(|e| match e {
        TokenError::Expired => AuthRejection::ExpiredToken,
        TokenError::Invalid => AuthRejection::InvalidToken,
    })?;

    let actor = AuthenticatedActor::from_claims(&claims).ok_or(AuthRejection::InvalidToken)?;
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

/// Optional variant: attaches the caller identity when a valid token is
/// present but never rejects. Runs ahead of the rate limiter so buckets can
/// key on the authenticated principal.
pub async fn optional_auth(
    State(issuer): State<Arc<JwtIssuer>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req) {
        if let Ok(claims) = issuer.verify(&token) {
            if let Some(actor) = AuthenticatedActor::from_claims(&claims) {
                req.extensions_mut().insert(actor);
            }
        }
    }

    next.run(req).await
}

/// Extract the authenticated actor from a request (use after `require_auth`).
pub fn extract_actor(req: &Request) -> Option<&AuthenticatedActor> {
    req.extensions().get::<AuthenticatedActor>()
}

/// Token-validation rejections
#[derive(Debug)]
pub enum AuthRejection {
    MissingToken,
    InvalidToken,
    ExpiredToken,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthRejection::MissingToken => {
                (StatusCode::UNAUTHORIZED, "Missing authorization token")
            }
            AuthRejection::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid access token"),
            AuthRejection::ExpiredToken => (StatusCode::UNAUTHORIZED, "Access token has expired"),
        };

        (status, message).into_response()
    }
}

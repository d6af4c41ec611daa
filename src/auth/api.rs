//! Authentication API Endpoints
//! Mission: Expose login, refresh, logout, and current-actor endpoints

use crate::auth::middleware::extract_actor;
use crate::auth::models::{
    ActorSummary, LoginRequest, LogoutRequest, RefreshRequest, SessionResponse,
};
use crate::auth::service::{AuthError, AuthService};
use crate::middleware::rate_limit::forwarded_client_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }
}

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(USER_AGENT).and_then(|h| h.to_str().ok())
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AuthApiError> {
    let client_ip = forwarded_client_ip(&headers, addr);

    let session = state.service.login(
        &payload.email,
        &payload.password,
        Some(&client_ip),
        user_agent(&headers),
    )?;

    Ok(Json(session))
}

/// Refresh endpoint - POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AuthState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<SessionResponse>, AuthApiError> {
    let client_ip = forwarded_client_ip(&headers, addr);

    let session = state.service.refresh(
        &payload.refresh_token,
        Some(&client_ip),
        user_agent(&headers),
    )?;

    Ok(Json(session))
}

/// Logout endpoint - POST /api/auth/logout
///
/// Idempotent: a missing body or an already-dead token still acknowledges.
pub async fn logout(
    State(state): State<AuthState>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<serde_json::Value>, AuthApiError> {
    let token = payload.as_ref().and_then(|p| p.refresh_token.as_deref());
    state.service.logout(token)?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Current actor - GET /api/auth/me (behind `require_auth`)
pub async fn current_actor(
    State(state): State<AuthState>,
    req: Request,
) -> Result<Json<ActorSummary>, AuthApiError> {
    let summary = state.service.current_actor(extract_actor(&req))?;
    Ok(Json(summary))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    Unauthenticated,
    TokenNotFound,
    TokenRevoked,
    TokenExpired,
    AccessDenied,
    OwnerNotFound,
    InternalError,
}

impl From<AuthError> for AuthApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => AuthApiError::InvalidCredentials,
            AuthError::Unauthenticated => AuthApiError::Unauthenticated,
            AuthError::TokenNotFound => AuthApiError::TokenNotFound,
            AuthError::TokenRevoked => AuthApiError::TokenRevoked,
            AuthError::TokenExpired => AuthApiError::TokenExpired,
            AuthError::OwnerNotFound => AuthApiError::OwnerNotFound,
            AuthError::Internal(err) => {
                error!("Auth internal error: {err:#}");
                AuthApiError::InternalError
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            AuthApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthApiError::TokenNotFound => (StatusCode::UNAUTHORIZED, "Invalid refresh token"),
            AuthApiError::TokenRevoked => {
                (StatusCode::UNAUTHORIZED, "Refresh token has been revoked")
            }
            AuthApiError::TokenExpired => (StatusCode::UNAUTHORIZED, "Refresh token has expired"),
            AuthApiError::AccessDenied => (StatusCode::FORBIDDEN, "Insufficient permissions"),
            AuthApiError::OwnerNotFound => (StatusCode::NOT_FOUND, "Resource not found"),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            AuthApiError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthApiError::TokenRevoked.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthApiError::AccessDenied.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthApiError::OwnerNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AuthApiError::InternalError.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_auth_error() {
        assert!(matches!(
            AuthApiError::from(AuthError::InvalidCredentials),
            AuthApiError::InvalidCredentials
        ));
        assert!(matches!(
            AuthApiError::from(AuthError::TokenExpired),
            AuthApiError::TokenExpired
        ));
        assert!(matches!(
            AuthApiError::from(AuthError::Internal(anyhow::anyhow!("boom"))),
            AuthApiError::InternalError
        ));
    }
}

//! Auth Coordinator
//! Mission: Orchestrate login, refresh, and logout over the auth leaves
//!
//! Holds no state of its own; every decision is delegated to the password
//! verifier, the token issuer, the refresh-token store, or the directory.

use crate::auth::actor_store::ActorStore;
use crate::auth::jwt::JwtIssuer;
use crate::auth::models::{ActorSummary, AuthenticatedActor, SessionResponse};
use crate::auth::password::verify_password;
use crate::auth::permissions::authorities_for;
use crate::auth::refresh_store::{RefreshTokenError, RefreshTokenStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Expected auth failures, surfaced as structured responses and never
/// retried internally.
#[derive(Debug)]
pub enum AuthError {
    /// Bad email or password; deliberately does not say which.
    InvalidCredentials,
    /// No authenticated context on the request.
    Unauthenticated,
    TokenNotFound,
    TokenRevoked,
    TokenExpired,
    OwnerNotFound,
    /// Unexpected storage/signing failure; fatal for this request.
    Internal(anyhow::Error),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::Unauthenticated => write!(f, "User is not authenticated"),
            AuthError::TokenNotFound => write!(f, "Refresh token not found"),
            AuthError::TokenRevoked => write!(f, "Refresh token has been revoked"),
            AuthError::TokenExpired => write!(f, "Refresh token has expired"),
            AuthError::OwnerNotFound => write!(f, "Token owner not found"),
            AuthError::Internal(e) => write!(f, "Internal auth error: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<RefreshTokenError> for AuthError {
    fn from(e: RefreshTokenError) -> Self {
        match e {
            RefreshTokenError::NotFound => AuthError::TokenNotFound,
            RefreshTokenError::Revoked => AuthError::TokenRevoked,
            RefreshTokenError::Expired => AuthError::TokenExpired,
            RefreshTokenError::OwnerNotFound => AuthError::OwnerNotFound,
            RefreshTokenError::Storage(e) => AuthError::Internal(e),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Internal(e)
    }
}

/// Orchestrates the auth flows. Cheap to clone behind `Arc`s.
pub struct AuthService {
    actors: Arc<ActorStore>,
    issuer: Arc<JwtIssuer>,
    refresh_tokens: Arc<RefreshTokenStore>,
}

impl AuthService {
    pub fn new(
        actors: Arc<ActorStore>,
        issuer: Arc<JwtIssuer>,
        refresh_tokens: Arc<RefreshTokenStore>,
    ) -> Self {
        Self {
            actors,
            issuer,
            refresh_tokens,
        }
    }

    /// Verify credentials and open a session: access token plus persisted
    /// refresh token. Any failure is the single generic InvalidCredentials.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SessionResponse, AuthError> {
        info!(email, "Login attempt");

        let actor = match self.actors.find_by_email(email)? {
            Some(actor) if actor.active => actor,
            _ => {
                warn!(email, "Failed login attempt");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(password, &actor.password_hash)? {
            warn!(email, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let authorities = authorities_for(&actor.roles);
        let (access_token, expires_in) = self.issuer.issue(actor.id, &actor.email, &authorities)?;
        let refresh_token =
            self.refresh_tokens
                .create(actor.id, client_ip, user_agent, Utc::now())?;

        info!(email, actor_id = actor.id, "Login successful");

        Ok(SessionResponse {
            access_token,
            refresh_token: refresh_token.token,
            token_type: "Bearer".to_string(),
            expires_in_seconds: expires_in,
            actor_id: actor.id,
            email: actor.email,
            roles: actor.roles,
        })
    }

    /// Exchange a refresh token for a fresh session. The token is rotated
    /// unconditionally, and authorities are re-derived from the actor's
    /// current state so role changes take effect here.
    pub fn refresh(
        &self,
        refresh_token: &str,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SessionResponse, AuthError> {
        let now = Utc::now();
        let record = self.refresh_tokens.verify(refresh_token, now)?;

        let actor = self
            .actors
            .find_by_id(record.owner_id)?
            .ok_or(AuthError::OwnerNotFound)?;
        if !actor.active {
            warn!(actor_id = actor.id, "Refresh attempt for inactive actor");
            return Err(AuthError::InvalidCredentials);
        }

        let rotated =
            self.refresh_tokens
                .rotate(refresh_token, actor.id, client_ip, user_agent, now)?;

        let authorities = authorities_for(&actor.roles);
        let (access_token, expires_in) = self.issuer.issue(actor.id, &actor.email, &authorities)?;

        info!(actor_id = actor.id, "Session refreshed");

        Ok(SessionResponse {
            access_token,
            refresh_token: rotated.token,
            token_type: "Bearer".to_string(),
            expires_in_seconds: expires_in,
            actor_id: actor.id,
            email: actor.email,
            roles: actor.roles,
        })
    }

    /// Best-effort revoke of the presented refresh token. Idempotent: a
    /// missing or already-dead token is not an error here.
    pub fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = refresh_token.filter(|t| !t.trim().is_empty()) {
            match self.refresh_tokens.revoke(token) {
                Ok(()) => info!("Logout: refresh token revoked"),
                Err(RefreshTokenError::Storage(e)) => return Err(AuthError::Internal(e)),
                Err(_) => info!("Logout: token already invalid"),
            }
        }
        Ok(())
    }

    /// Summary of the authenticated caller, or Unauthenticated.
    pub fn current_actor(
        &self,
        authenticated: Option<&AuthenticatedActor>,
    ) -> Result<ActorSummary, AuthError> {
        let actor = authenticated.ok_or(AuthError::Unauthenticated)?;
        Ok(ActorSummary {
            id: actor.id,
            email: actor.email.clone(),
            roles: actor.roles(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::RoleName;
    use tempfile::NamedTempFile;

    fn create_test_service() -> (AuthService, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let actors = Arc::new(ActorStore::new(db_path).unwrap());
        let issuer = Arc::new(JwtIssuer::new("test-secret-key-12345".to_string()));
        let refresh_tokens = Arc::new(RefreshTokenStore::new(db_path, 7).unwrap());
        (AuthService::new(actors, issuer, refresh_tokens), temp_file)
    }

    #[test]
    fn test_login_issues_verifiable_session() {
        let (service, _temp) = create_test_service();

        let session = service
            .login("hr@company.com", "Hr@123", Some("10.0.0.1"), None)
            .unwrap();
        assert_eq!(session.token_type, "Bearer");
        assert_eq!(session.roles, vec![RoleName::Hr]);

        // Access token round-trips the actor id and full authority set
        let issuer = JwtIssuer::new("test-secret-key-12345".to_string());
        let claims = issuer.verify(&session.access_token).unwrap();
        assert_eq!(claims.sub, session.actor_id.to_string());
        assert_eq!(claims.email, "hr@company.com");
        assert_eq!(claims.authorities, authorities_for(&[RoleName::Hr]));
    }

    #[test]
    fn test_login_bad_password_is_generic() {
        let (service, _temp) = create_test_service();

        let err = service
            .login("hr@company.com", "wrong", None, None)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = service
            .login("ghost@company.com", "Hr@123", None, None)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_refresh_rotates_token() {
        let (service, _temp) = create_test_service();

        let session = service
            .login("employee@company.com", "Employee@123", None, None)
            .unwrap();
        let refreshed = service.refresh(&session.refresh_token, None, None).unwrap();

        assert_ne!(session.refresh_token, refreshed.refresh_token);
        assert_eq!(refreshed.actor_id, session.actor_id);

        // The old refresh token is dead after rotation
        let err = service
            .refresh(&session.refresh_token, None, None)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));

        // The new one still works
        service.refresh(&refreshed.refresh_token, None, None).unwrap();
    }

    #[test]
    fn test_refresh_unknown_token() {
        let (service, _temp) = create_test_service();

        let err = service.refresh("no-such-token", None, None).unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let (service, _temp) = create_test_service();

        // No token, blank token, garbage token: all fine
        service.logout(None).unwrap();
        service.logout(Some("")).unwrap();
        service.logout(Some("never-issued")).unwrap();

        // Real token: revoked, and a second logout is still fine
        let session = service
            .login("manager@company.com", "Manager@123", None, None)
            .unwrap();
        service.logout(Some(&session.refresh_token)).unwrap();
        service.logout(Some(&session.refresh_token)).unwrap();

        let err = service
            .refresh(&session.refresh_token, None, None)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[test]
    fn test_current_actor() {
        let (service, _temp) = create_test_service();

        let err = service.current_actor(None).unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));

        let session = service
            .login("admin@company.com", "Admin@123", None, None)
            .unwrap();
        let issuer = JwtIssuer::new("test-secret-key-12345".to_string());
        let claims = issuer.verify(&session.access_token).unwrap();
        let actor = AuthenticatedActor::from_claims(&claims).unwrap();

        let summary = service.current_actor(Some(&actor)).unwrap();
        assert_eq!(summary.id, session.actor_id);
        assert_eq!(summary.roles, vec![RoleName::Admin]);
    }
}

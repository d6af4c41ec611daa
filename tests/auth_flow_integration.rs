//! End-to-end auth flow against real stores on a throwaway database:
//! login, access-token verification, permission checks, refresh rotation,
//! logout, and login-category rate limiting.

use std::sync::Arc;

use chrono::Utc;
use staffhub_backend::auth::models::{AuthenticatedActor, RoleName};
use staffhub_backend::auth::permissions::authorities_for;
use staffhub_backend::auth::service::AuthError;
use staffhub_backend::auth::{
    ActorStore, AuthService, JwtIssuer, PermissionEvaluator, RefreshTokenStore,
};
use staffhub_backend::middleware::{RateLimitCategory, RateLimiter};
use tempfile::NamedTempFile;

const SECRET: &str = "integration-test-secret";

fn build_service() -> (AuthService, Arc<RefreshTokenStore>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap();
    let actors = Arc::new(ActorStore::new(db_path).unwrap());
    let issuer = Arc::new(JwtIssuer::new(SECRET.to_string()));
    let refresh_tokens = Arc::new(RefreshTokenStore::new(db_path, 7).unwrap());
    let service = AuthService::new(actors, issuer, refresh_tokens.clone());
    (service, refresh_tokens, temp_file)
}

#[test]
fn full_session_lifecycle() {
    let (service, refresh_tokens, _temp) = build_service();

    // Login as HR
    let session = service
        .login("hr@company.com", "Hr@123", Some("10.1.2.3"), Some("it"))
        .unwrap();
    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.roles, vec![RoleName::Hr]);

    // The access token proves identity without touching storage
    let issuer = JwtIssuer::new(SECRET.to_string());
    let claims = issuer.verify(&session.access_token).unwrap();
    assert_eq!(claims.sub, session.actor_id.to_string());
    assert_eq!(claims.authorities, authorities_for(&[RoleName::Hr]));

    // Row-level authorization from the verified claims
    let actor = AuthenticatedActor::from_claims(&claims).unwrap();
    let eval = PermissionEvaluator::new();
    assert!(eval.can_view(&actor, 12345));
    assert!(eval.can_modify(&actor, 12345));
    assert!(!eval.has_authority(&actor, "DELETE_EMPLOYEE"));

    // Refresh rotates the persisted token
    let refreshed = service.refresh(&session.refresh_token, None, None).unwrap();
    assert_ne!(refreshed.refresh_token, session.refresh_token);
    assert!(matches!(
        service.refresh(&session.refresh_token, None, None),
        Err(AuthError::TokenRevoked)
    ));
    assert_eq!(
        refresh_tokens
            .count_active(session.actor_id, Utc::now())
            .unwrap(),
        1
    );

    // Logout kills the current token and repeated logout is fine
    service.logout(Some(&refreshed.refresh_token)).unwrap();
    service.logout(Some(&refreshed.refresh_token)).unwrap();
    assert!(matches!(
        service.refresh(&refreshed.refresh_token, None, None),
        Err(AuthError::TokenRevoked)
    ));
}

#[test]
fn employee_is_confined_to_own_record_across_stack() {
    let (service, _refresh_tokens, _temp) = build_service();

    let session = service
        .login("employee@company.com", "Employee@123", None, None)
        .unwrap();

    let issuer = JwtIssuer::new(SECRET.to_string());
    let claims = issuer.verify(&session.access_token).unwrap();
    let actor = AuthenticatedActor::from_claims(&claims).unwrap();
    let eval = PermissionEvaluator::new();

    assert!(eval.can_view(&actor, session.actor_id));
    assert!(eval.can_modify(&actor, session.actor_id));
    assert!(!eval.can_view(&actor, session.actor_id + 1));
    assert!(!eval.can_modify(&actor, session.actor_id + 1));
}

#[test]
fn revoke_all_ends_every_session() {
    let (service, refresh_tokens, _temp) = build_service();

    let s1 = service
        .login("manager@company.com", "Manager@123", None, None)
        .unwrap();
    let s2 = service
        .login("manager@company.com", "Manager@123", None, None)
        .unwrap();

    refresh_tokens.revoke_all(s1.actor_id).unwrap();

    for token in [&s1.refresh_token, &s2.refresh_token] {
        assert!(matches!(
            service.refresh(token, None, None),
            Err(AuthError::TokenRevoked)
        ));
    }
}

#[test]
fn login_bucket_exhausts_after_capacity() {
    let limiter = RateLimiter::new();

    for _ in 0..5 {
        assert!(limiter.try_consume("ip:198.51.100.7", RateLimitCategory::Login));
    }
    assert!(!limiter.try_consume("ip:198.51.100.7", RateLimitCategory::Login));

    // Unrelated clients are untouched
    assert!(limiter.try_consume("user:hr@company.com", RateLimitCategory::Login));
}

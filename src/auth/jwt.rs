//! JWT Token Issuer
//! Mission: Generate and validate short-lived signed access tokens
//!
//! Tokens are stateless: verification recomputes the HMAC signature and
//! checks expiry without any storage lookup, which is why access tokens are
//! deliberately short-lived (refresh tokens cover long sessions). Signing
//! lives entirely behind this type so the algorithm can be swapped without
//! touching the coordinator.

use crate::auth::models::AccessClaims;
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

const DEFAULT_TTL_MINUTES: i64 = 15;

/// Access-token verification failures.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Signature valid but `exp` is in the past.
    Expired,
    /// Bad signature, malformed token, or unparseable claims.
    Invalid,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Expired => write!(f, "Access token has expired"),
            TokenError::Invalid => write!(f, "Invalid access token"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Issues and verifies HS256 access tokens with a process-wide secret.
pub struct JwtIssuer {
    secret: String,
    ttl_minutes: i64,
}

impl JwtIssuer {
    /// Create an issuer with the default minutes-scale TTL.
    pub fn new(secret: String) -> Self {
        Self::with_ttl(secret, DEFAULT_TTL_MINUTES)
    }

    pub fn with_ttl(secret: String, ttl_minutes: i64) -> Self {
        Self {
            secret,
            ttl_minutes,
        }
    }

    /// Issue a signed token for an actor. Returns the token and its lifetime
    /// in seconds.
    pub fn issue(
        &self,
        actor_id: i64,
        email: &str,
        authorities: &[String],
    ) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::minutes(self.ttl_minutes))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let expires_in = (self.ttl_minutes * 60) as usize;

        let claims = AccessClaims {
            sub: actor_id.to_string(),
            email: email.to_string(),
            authorities: authorities.to_vec(),
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        debug!(
            actor_id,
            email, ttl_minutes = self.ttl_minutes, "Issuing access token"
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign access token")?;

        Ok((token, expires_in))
    }

    /// Verify a token and extract its claims. No storage access; an access
    /// token cannot be revoked before its natural expiry.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        debug!(email = %decoded.claims.email, "Validated access token");

        Ok(decoded.claims)
    }
}

//! Authentication Models
//! Mission: Define the identity, role, and session data structures

use crate::auth::permissions::authorities_for;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Employee roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoleName {
    #[serde(rename = "ADMIN")]
    Admin, // Full access to all endpoints
    #[serde(rename = "MANAGER")]
    Manager, // View any record, manage employees
    #[serde(rename = "HR")]
    Hr, // Employee data access without admin rights
    #[serde(rename = "EMPLOYEE")]
    Employee, // Self-service only
}

impl RoleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "ADMIN",
            RoleName::Manager => "MANAGER",
            RoleName::Hr => "HR",
            RoleName::Employee => "EMPLOYEE",
        }
    }

    /// Authority marker carried alongside permission names in token claims.
    pub fn authority(&self) -> &'static str {
        match self {
            RoleName::Admin => "ROLE_ADMIN",
            RoleName::Manager => "ROLE_MANAGER",
            RoleName::Hr => "ROLE_HR",
            RoleName::Employee => "ROLE_EMPLOYEE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Some(RoleName::Admin),
            "MANAGER" => Some(RoleName::Manager),
            "HR" => Some(RoleName::Hr),
            "EMPLOYEE" => Some(RoleName::Employee),
            _ => None,
        }
    }

    /// Reverse of `authority()`; used when rebuilding an actor from claims.
    pub fn from_authority(s: &str) -> Option<Self> {
        s.strip_prefix("ROLE_").and_then(Self::from_str)
    }
}

/// Employee account as seen by the auth core.
///
/// The employee directory owns the full record; only the fields needed for
/// authentication and ownership checks cross the boundary.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: i64,
    pub email: String,
    pub password_hash: String, // bcrypt hash - never serialized
    pub active: bool,
    pub roles: Vec<RoleName>,
}

/// JWT claims payload for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // subject (actor id)
    pub email: String,
    pub authorities: Vec<String>, // role markers + permission names
    pub iat: usize,               // issued-at timestamp
    pub exp: usize,               // expiration timestamp
}

/// Verified caller identity attached to a request after token validation.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor {
    pub id: i64,
    pub email: String,
    pub authorities: HashSet<String>,
}

impl AuthenticatedActor {
    /// Build from a directory actor, resolving the full authority set.
    pub fn from_actor(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            email: actor.email.clone(),
            authorities: authorities_for(&actor.roles).into_iter().collect(),
        }
    }

    /// Build from verified token claims. Returns `None` when the subject is
    /// not a valid actor id.
    pub fn from_claims(claims: &AccessClaims) -> Option<Self> {
        let id = claims.sub.parse::<i64>().ok()?;
        Some(Self {
            id,
            email: claims.email.clone(),
            authorities: claims.authorities.iter().cloned().collect(),
        })
    }

    pub fn has_role(&self, role: RoleName) -> bool {
        self.authorities.contains(role.authority())
    }

    /// Roles recovered from the authority markers, in declaration order.
    pub fn roles(&self) -> Vec<RoleName> {
        [
            RoleName::Admin,
            RoleName::Manager,
            RoleName::Hr,
            RoleName::Employee,
        ]
        .into_iter()
        .filter(|r| self.has_role(*r))
        .collect()
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request body; the refresh token is optional so logout stays
/// idempotent even for callers that lost theirs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Session issued by login/refresh
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String, // always "Bearer"
    pub expires_in_seconds: usize,
    pub actor_id: i64,
    pub email: String,
    pub roles: Vec<RoleName>,
}

/// Actor summary (sanitized)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSummary {
    pub id: i64,
    pub email: String,
    pub roles: Vec<RoleName>,
}

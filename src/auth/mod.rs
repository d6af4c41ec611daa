//! Authentication & Authorization Module
//! Mission: Secure the employee API with JWT sessions, RBAC, and ownership checks

pub mod actor_store;
pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod permissions;
pub mod refresh_store;
pub mod service;

pub use actor_store::ActorStore;
pub use api::AuthState;
pub use jwt::JwtIssuer;
pub use middleware::{optional_auth, require_auth};
pub use permissions::PermissionEvaluator;
pub use refresh_store::RefreshTokenStore;
pub use service::AuthService;

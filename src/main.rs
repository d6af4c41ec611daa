//! StaffHub - Employee Management Backend
//! Mission: Serve the employee API behind hardened session handling
//!
//! The interesting machinery is the auth core: short-lived signed access
//! tokens, rotating persisted refresh tokens, per-client rate limiting, and
//! role/ownership permission checks.

use anyhow::{Context, Result};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::{env, str::FromStr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use staffhub_backend::{
    auth::{
        api as auth_api, optional_auth, require_auth, ActorStore, AuthService, AuthState,
        JwtIssuer, RefreshTokenStore,
    },
    middleware::{rate_limit_middleware, request_logging, RateLimiter},
};

const DEFAULT_DB_PATH: &str = "staffhub_auth.db";
const CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60; // daily sweep

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staffhub_backend=info,staffhub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let db_path = env_or("AUTH_DB_PATH", DEFAULT_DB_PATH);
    let jwt_secret = match env::var("JWT_SECRET") {
        Ok(secret) if !secret.trim().is_empty() => secret,
        _ => {
            warn!("JWT_SECRET not set - using an insecure development secret");
            "staffhub-dev-secret-change-me".to_string()
        }
    };
    let jwt_ttl_minutes: i64 = env_parse("JWT_TTL_MINUTES", 15);
    let refresh_ttl_days: i64 = env_parse("REFRESH_TTL_DAYS", 7);
    let port: u16 = env_parse("PORT", 8080);

    let actors = Arc::new(ActorStore::new(&db_path)?);
    let issuer = Arc::new(JwtIssuer::with_ttl(jwt_secret, jwt_ttl_minutes));
    let refresh_tokens = Arc::new(RefreshTokenStore::new(&db_path, refresh_ttl_days)?);
    let service = Arc::new(AuthService::new(
        actors,
        issuer.clone(),
        refresh_tokens.clone(),
    ));
    let limiter = RateLimiter::new();

    info!(
        db_path = %db_path,
        jwt_ttl_minutes,
        refresh_ttl_days,
        "Auth core initialized"
    );

    // Daily cleanup of expired refresh tokens, owned here and stopped at
    // shutdown. Without it expired rows accumulate without bound.
    let cleanup_store = refresh_tokens.clone();
    let cleanup_task = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            match cleanup_store.cleanup(Utc::now()) {
                Ok(deleted) => info!(deleted, "Refresh token cleanup pass finished"),
                Err(e) => error!("Refresh token cleanup failed: {e:#}"),
            }
        }
    });

    let auth_state = AuthState::new(service);

    let public_routes = Router::new()
        .route("/api/auth/login", post(auth_api::login))
        .route("/api/auth/refresh", post(auth_api::refresh))
        .route("/api/auth/logout", post(auth_api::logout))
        .with_state(auth_state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::current_actor))
        .route_layer(from_fn_with_state(issuer.clone(), require_auth))
        .with_state(auth_state);

    // Layer order (outermost first): CORS -> request logging -> optional
    // auth -> rate limiting. Optional auth runs ahead of the limiter so
    // buckets key on the authenticated principal when one is present.
    let app = Router::new()
        .route("/health", get(health))
        .merge(public_routes)
        .merge(protected_routes)
        .layer(from_fn_with_state(limiter.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(issuer.clone(), optional_auth))
        .layer(from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("StaffHub backend listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    cleanup_task.abort();

    Ok(())
}

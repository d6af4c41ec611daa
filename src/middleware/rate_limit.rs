//! Rate limiting middleware.
//!
//! Per-client token buckets with greedy continuous refill, one bucket per
//! (client key, category) pair. Login attempts get a much tighter budget
//! than ordinary reads and writes.

use crate::auth::models::AuthenticatedActor;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Request categories with distinct token-bucket budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitCategory {
    /// Credential-guessing surface: 5 per 5 minutes.
    Login,
    /// Mutating calls: 20 per minute.
    Write,
    /// Pure retrieval: 200 per minute.
    Read,
    /// Everything else: 100 per minute.
    General,
}

impl RateLimitCategory {
    pub fn capacity(&self) -> u32 {
        match self {
            RateLimitCategory::Login => 5,
            RateLimitCategory::Write => 20,
            RateLimitCategory::Read => 200,
            RateLimitCategory::General => 100,
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            RateLimitCategory::Login => Duration::from_secs(5 * 60),
            _ => Duration::from_secs(60),
        }
    }

    pub fn window_label(&self) -> &'static str {
        match self {
            RateLimitCategory::Login => "5 minutes",
            _ => "1 minute",
        }
    }

    /// Login paths always map to LOGIN regardless of method; otherwise the
    /// method decides.
    pub fn classify(path: &str, method: &Method) -> Self {
        if path.contains("/auth/login") {
            return RateLimitCategory::Login;
        }

        match *method {
            Method::POST | Method::PUT | Method::DELETE | Method::PATCH => {
                RateLimitCategory::Write
            }
            Method::GET => RateLimitCategory::Read,
            _ => RateLimitCategory::General,
        }
    }
}

/// Token bucket with continuous refill: tokens accrue proportionally to
/// elapsed time, capped at capacity.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    available: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(category: RateLimitCategory, now: Instant) -> Self {
        let capacity = category.capacity() as f64;
        Self {
            capacity,
            refill_per_sec: capacity / category.window().as_secs_f64(),
            available: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.available =
            (self.available + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Check-and-decrement by one permit; no mutation when denied.
    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.available >= 1.0 {
            self.available -= 1.0;
            true
        } else {
            false
        }
    }

    fn available_tokens(&mut self, now: Instant) -> u64 {
        self.refill(now);
        self.available as u64
    }
}

/// Shared per-client bucket registry. Buckets are created lazily on first
/// access (single winner under the registry lock) and live for the process
/// lifetime unless an operator evicts them.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<(String, RateLimitCategory), Arc<Mutex<TokenBucket>>>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn bucket(&self, key: &str, category: RateLimitCategory) -> Arc<Mutex<TokenBucket>> {
        let mut registry = self.buckets.lock();
        registry
            .entry((key.to_string(), category))
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(category, Instant::now()))))
            .clone()
        // Registry lock released here; contention on one key never blocks
        // consumers of another.
    }

    pub fn try_consume(&self, key: &str, category: RateLimitCategory) -> bool {
        self.try_consume_at(key, category, Instant::now())
    }

    fn try_consume_at(&self, key: &str, category: RateLimitCategory, now: Instant) -> bool {
        self.bucket(key, category).lock().try_consume(now)
    }

    pub fn available_tokens(&self, key: &str, category: RateLimitCategory) -> u64 {
        self.bucket(key, category).lock().available_tokens(Instant::now())
    }

    /// Operator action: drop every bucket for a client key.
    pub fn evict(&self, key: &str) {
        self.buckets.lock().retain(|(k, _), _| k != key);
    }

    /// Operator action: drop all buckets.
    pub fn clear(&self) {
        self.buckets.lock().clear();
    }
}

/// Bucket key for a request: the authenticated principal when present,
/// otherwise the first forwarded-for hop, otherwise the peer address. The
/// prefixes keep the two namespaces from colliding.
pub fn client_key(req: &Request, peer: SocketAddr) -> String {
    if let Some(actor) = req.extensions().get::<AuthenticatedActor>() {
        return format!("user:{}", actor.email);
    }
    format!("ip:{}", forwarded_client_ip(req.headers(), peer))
}

/// First address in the X-Forwarded-For chain, or the direct peer.
pub fn forwarded_client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Rate limiting middleware function.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let category = RateLimitCategory::classify(request.uri().path(), request.method());
    let key = client_key(&request, addr);

    if !limiter.try_consume(&key, category) {
        warn!(
            client = %key,
            path = %request.uri().path(),
            category = ?category,
            "Rate limit exceeded"
        );
        return rate_limit_rejection(category);
    }

    let remaining = limiter.available_tokens(&key, category);
    let mut response = next.run(request).await;
    set_rate_limit_headers(response.headers_mut(), category, remaining);
    response
}

fn rate_limit_rejection(category: RateLimitCategory) -> Response {
    let body = serde_json::json!({
        "success": false,
        "message": "Rate limit exceeded. Please try again later.",
        "details": format!(
            "Limit: {} requests per {}",
            category.capacity(),
            category.window_label()
        ),
        "timestamp": Utc::now().to_rfc3339(),
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    set_rate_limit_headers(response.headers_mut(), category, 0);
    response
}

fn set_rate_limit_headers(headers: &mut HeaderMap, category: RateLimitCategory, remaining: u64) {
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(category.capacity()),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
}

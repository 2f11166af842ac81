//! Per-client token-bucket rate limiting for the public API.
//!
//! Buckets refill continuously at `per_second` and cap at `burst`. A client
//! over the limit gets a 429 with the same JSON error shape as [`ApiError`].

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Sustained requests per second.
    pub per_second: f64,
    /// Maximum burst above the sustained rate.
    pub burst: f64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            per_second: 10.0,
            burst: 30.0,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    touched: Instant,
}

impl Bucket {
    fn full(policy: RateLimitPolicy) -> Self {
        Self {
            tokens: policy.burst,
            touched: Instant::now(),
        }
    }

    fn take(&mut self, policy: RateLimitPolicy) -> bool {
        let now = Instant::now();
        let refill = now.duration_since(self.touched).as_secs_f64() * policy.per_second;
        self.tokens = (self.tokens + refill).min(policy.burst);
        self.touched = now;

        let allowed = self.tokens >= 1.0;
        if allowed {
            self.tokens -= 1.0;
        }
        allowed
    }
}

/// Shared limiter state, cloned into the middleware per request.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    /// Whether a request from `ip` is within its budget right now.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(ip)
            .or_insert_with(|| Bucket::full(self.policy))
            .take(self.policy)
    }

    /// Evict buckets that have been idle longer than `max_idle_secs`.
    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let now = Instant::now();
        self.buckets
            .lock()
            .await
            .retain(|_, b| now.duration_since(b.touched).as_secs_f64() < max_idle_secs);
    }

    #[cfg(test)]
    async fn bucket_count(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    // A request whose client address cannot be determined passes through;
    // behind the expected deployment every request carries one.
    if let Some(ip) = client_ip(&req) {
        if !limiter.allow(ip).await {
            warn!(ip = %ip, "rate limit exceeded");
            let body = serde_json::json!({ "error": "Too many requests" });
            return (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
        }
    }

    next.run(req).await
}

/// ConnectInfo when serving a socket directly, otherwise the proxy headers.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(addr.ip());
    }

    let header_ip = |name: &str| -> Option<IpAddr> {
        let value = req.headers().get(name)?.to_str().ok()?;
        // X-Forwarded-For may be a chain; the first hop is the client.
        value.split(',').next()?.trim().parse().ok()
    };

    header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
}

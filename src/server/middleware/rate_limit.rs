use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::server::AppState;
use crate::utils::response;

/// Outcome of one admission check. Surfaced to the client through the
/// `X-RateLimit-*` headers whether or not the request was admitted.
#[derive(Debug, Clone, Copy)]
pub struct LimitContext {
    pub limit: i64,
    pub remaining: i64,
    /// Unix timestamp at which the current window expires.
    pub reset: i64,
    pub reached: bool,
}

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Rate limit exceeded")]
    ThrottleExceeded,

    #[error("Admission store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Counter storage behind the limiter. A trait seam so tests can swap in
/// a broken store and exercise the fail-open path.
pub trait AdmissionStore: Send + Sync {
    /// Counts one hit for `key` and reports the window state.
    fn incr(&self, key: &str, limit: i64, window: Duration)
        -> Result<LimitContext, AdmissionError>;
}

struct Counter {
    count: i64,
    window_started: Instant,
}

/// In-process fixed-window store keyed by client address. Entries are
/// created lazily on first hit and reset in place when a window expires.
#[derive(Default)]
pub struct MemoryStore {
    counters: DashMap<String, Counter>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AdmissionStore for MemoryStore {
    fn incr(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
    ) -> Result<LimitContext, AdmissionError> {
        let now = Instant::now();
        // The entry guard serializes concurrent updates to the same key;
        // a plain read-modify-write here would let bursts exceed the quota.
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            window_started: now,
        });
        if now.duration_since(counter.window_started) >= window {
            counter.count = 0;
            counter.window_started = now;
        }
        counter.count += 1;

        let elapsed = now.duration_since(counter.window_started);
        Ok(LimitContext {
            limit,
            remaining: (limit - counter.count).max(0),
            reset: unix_now() + (window - elapsed).as_secs() as i64,
            reached: counter.count > limit,
        })
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Per-client-address sliding counter that pre-screens every inbound
/// request before it reaches the validator or business logic.
#[derive(Clone)]
pub struct AdmissionLimiter {
    store: Arc<dyn AdmissionStore>,
    limit: i64,
    window: Duration,
}

impl AdmissionLimiter {
    pub fn new(limit: i64, window: Duration) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), limit, window)
    }

    pub fn with_store(store: Arc<dyn AdmissionStore>, limit: i64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Counts one hit for `key`. `reached = true` means the request must
    /// be rejected; the context is forwarded to the client either way.
    pub fn admit(&self, key: &str) -> Result<LimitContext, AdmissionError> {
        self.store.incr(key, self.limit, self.window)
    }
}

/// Admission layer applied to every route. Rejections carry the same
/// rate-limit headers as admitted requests. A broken store fails open
/// because availability of business functionality outranks throttling.
pub async fn admission_layer(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next<Body>,
) -> Response {
    let key = addr.ip().to_string();
    let context = match state.limiter.admit(&key) {
        Ok(context) => context,
        Err(e) => {
            warn!(client = %key, error = %e, "admission store unavailable, failing open");
            return next.run(req).await;
        }
    };

    let mut response = if context.reached {
        warn!(client = %key, path = %req.uri().path(), "rate limit exceeded");
        response::too_many_requests(
            "Too many requests",
            Some(json!({ "error": "Rate limit exceeded. Please try again later." })),
        )
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(context.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(context.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(context.reset),
    );
    response
}

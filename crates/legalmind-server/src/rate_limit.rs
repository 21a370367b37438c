use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{error::ApiError, AppState};

/// Entries beyond this trigger a sweep of expired windows.
const SWEEP_THRESHOLD: usize = 1024;

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// `max_per_minute == 0` disables limiting.
    pub fn per_minute(max_per_minute: u32) -> Self {
        Self::new(max_per_minute, Duration::from_secs(60))
    }

    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request from `client`. Returns `false` when it is over the
    /// limit for the current window.
    pub fn check(&self, client: &str) -> bool {
        if self.max_requests == 0 {
            return true;
        }
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|p| p.into_inner());

        if clients.len() > SWEEP_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// The peer address, or with `trust_proxy` the last `X-Forwarded-For` hop,
/// which is the one the fronting proxy appended. Earlier hops come from the
/// client and are ignored.
pub fn client_key(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(hop) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return hop.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let client = client_key(&req, state.trust_proxy);
    if !state.limiter.check(&client) {
        warn!(client = %client, path = %req.uri().path(), "rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_allows_up_to_max_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("a"));
    }

    #[test]
    fn zero_disables() {
        let limiter = RateLimiter::per_minute(0);
        for _ in 0..100 {
            assert!(limiter.check("a"));
        }
    }

    fn forwarded(value: &str) -> Request {
        Request::builder()
            .header("x-forwarded-for", value)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[test]
    fn forwarded_header_ignored_unless_trusted() {
        let req = forwarded("203.0.113.7");
        assert_eq!(client_key(&req, false), "unknown");

        let peer: SocketAddr = "198.51.100.4:5000".parse().unwrap();
        let mut req = forwarded("203.0.113.7");
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_key(&req, false), "198.51.100.4");
    }

    #[test]
    fn trusted_proxy_uses_last_hop() {
        let req = forwarded("203.0.113.7, 10.0.0.1");
        assert_eq!(client_key(&req, true), "10.0.0.1");

        let bare = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(client_key(&bare, true), "unknown");
    }
}

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::LimiterConfig;
use crate::error::ApiError;
use crate::state::AppState;

type KeyedLimiter = governor::RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Longest replenish interval; non-positive rates fall back to it.
const MAX_PERIOD: Duration = Duration::from_secs(86_400);

/// Per-IP token buckets backed by a keyed GCRA limiter.
pub struct RateLimiter {
    inner: KeyedLimiter,
    clock: DefaultClock,
}

fn quota(rate: f64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    let period = if rate > 0.0 {
        Duration::try_from_secs_f64(1.0 / rate).unwrap_or(MAX_PERIOD)
    } else {
        MAX_PERIOD
    };
    let period = period.clamp(Duration::from_nanos(1), MAX_PERIOD);
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl RateLimiter {
    pub fn new(rate: f64, burst: u32) -> Self {
        let clock = DefaultClock::default();
        Self {
            inner: KeyedLimiter::new(quota(rate, burst), DefaultKeyedStateStore::default(), &clock),
            clock,
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.max_request_per_second, config.burst)
    }

    /// Takes one cell for `ip`, or reports how long until one is available.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.inner
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drops buckets that have refilled completely; returns how many.
    pub fn evict_idle(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain_recent();
        self.inner.shrink_to_fit();
        before.saturating_sub(self.inner.len())
    }

    pub fn client_count(&self) -> usize {
        self.inner.len()
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let evicted = limiter.evict_idle();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = limiter.client_count(), "evicted idle rate limit buckets");
                }
            }
        })
    }
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.limiter.enabled {
        return next.run(request).await;
    }

    let ip = client_ip(&request, &state.config.limiter.trusted_proxies);
    match state.limiter.check(ip) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            tracing::warn!(client = %ip, wait_ms = wait.as_millis() as u64, "rate limit exceeded");
            ApiError::TooManyRequests.into_response_at(request.uri().path())
        }
    }
}

/// Peer address, or the first `X-Forwarded-For` hop when the peer is a trusted proxy.
pub fn client_ip(request: &Request, trusted_proxies: &[String]) -> IpAddr {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let Some(peer) = peer else {
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };

    let trusted = trusted_proxies
        .iter()
        .filter_map(|p| p.parse::<IpAddr>().ok())
        .any(|p| p == peer);
    if !trusted {
        return peer;
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .unwrap_or(peer)
}

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

/// Route groups with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Read-only catalog, slots, gallery, shop info.
    Public,
    /// Wizard traffic and customer session.
    Booking,
    /// Advice assistant (each message costs a remote call).
    Chat,
    Admin,
}

impl Tier {
    pub fn default_config(self) -> RateLimitConfig {
        let (max_requests, window_secs) = match self {
            Tier::Public => (60, 60),
            Tier::Booking => (30, 60),
            Tier::Chat => (10, 60),
            Tier::Admin => (120, 60),
        };
        RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug)]
struct TierState {
    config: RateLimitConfig,
    hits: DashMap<IpAddr, Vec<Instant>>,
}

/// Per-IP sliding-window limiter, one window per tier.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    tiers: Arc<DashMap<Tier, TierState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiter with every tier at its default budget.
    pub fn with_defaults() -> Self {
        let limiter = Self::new();
        for tier in [Tier::Public, Tier::Booking, Tier::Chat, Tier::Admin] {
            limiter.set_tier(tier, tier.default_config());
        }
        limiter
    }

    pub fn set_tier(&self, tier: Tier, config: RateLimitConfig) {
        self.tiers.insert(
            tier,
            TierState {
                config,
                hits: DashMap::new(),
            },
        );
    }

    /// `Err(retry_after_secs)` when `ip` is over budget. Unconfigured tiers
    /// are not limited.
    pub fn check(&self, tier: Tier, ip: IpAddr) -> Result<(), u64> {
        let Some(state) = self.tiers.get(&tier) else {
            return Ok(());
        };
        let config = state.config;
        let now = Instant::now();

        let mut hits = state.hits.entry(ip).or_default();
        hits.retain(|t| now.duration_since(*t) < config.window);

        if hits.len() >= config.max_requests as usize {
            let oldest = hits[0];
            let retry_after = (oldest + config.window)
                .saturating_duration_since(now)
                .as_secs()
                .max(1);
            return Err(retry_after);
        }

        hits.push(now);
        Ok(())
    }

    /// Drop entries idle for more than two windows.
    pub fn cleanup(&self) {
        let now = Instant::now();
        for state in self.tiers.iter() {
            let cutoff = state.config.window * 2;
            state.hits.retain(|_ip, hits| {
                hits.retain(|t| now.duration_since(*t) < cutoff);
                !hits.is_empty()
            });
        }
    }

    /// Middleware state binding this limiter to one tier.
    pub fn guard(&self, tier: Tier) -> TierGuard {
        TierGuard {
            limiter: self.clone(),
            tier,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TierGuard {
    limiter: RateLimiter,
    tier: Tier,
}

/// Client IP from X-Forwarded-For (reverse proxy) or the socket.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn too_many_requests(retry_after: u64) -> Response {
    let body = ApiResponse::<()>::error(format!(
        "Muitas requisições. Tente novamente em {} segundos",
        retry_after
    ));
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", retry_after.to_string())],
        Json(body),
    )
        .into_response()
}

pub async fn rate_limit(
    State(guard): State<TierGuard>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    if let Err(retry_after) = guard.limiter.check(guard.tier, ip) {
        tracing::warn!(tier = ?guard.tier, %ip, retry_after, "Rate limited");
        return Err(too_many_requests(retry_after));
    }
    Ok(next.run(req).await)
}

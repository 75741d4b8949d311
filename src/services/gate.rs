//! Access gate: bearer authentication and per-client rate admission
//!
//! Runs before any catalog operation. The catalog never sees a request the
//! gate rejected.
//!
//! Budgets are keyed by the peer address of the connection, not by the token
//! subject: login accepts any user name, so a subject can be minted at will.

use std::{net::IpAddr, num::NonZeroU32, sync::Arc, time::Duration};

use governor::{clock::DefaultClock, DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::task::JoinHandle;

use crate::{
    config::{AuthConfig, RateLimitConfig},
    error::{AppError, AppResult},
    models::user::UserClaims,
};

#[derive(Clone)]
pub struct AccessGate {
    jwt_secret: String,
    rate_limit: RateLimitConfig,
    /// One GCRA cell per client address
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl AccessGate {
    pub fn new(auth: &AuthConfig, rate_limit: RateLimitConfig) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(rate_limit.requests_per_minute).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(rate_limit.burst).unwrap_or(NonZeroU32::MIN));

        Self {
            jwt_secret: auth.jwt_secret.clone(),
            rate_limit,
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Validate an `Authorization` header value
    pub fn authenticate(&self, authorization: Option<&str>) -> AppResult<UserClaims> {
        let header = authorization.ok_or_else(|| {
            AppError::Unauthenticated("Missing authorization header".to_string())
        })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthenticated("Invalid authorization header format".to_string())
        })?;

        UserClaims::from_token(token, &self.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthenticated(e.to_string())
        })
    }

    /// Charge one request against the client's budget
    pub fn admit(&self, client: IpAddr) -> AppResult<()> {
        if !self.rate_limit.enabled {
            return Ok(());
        }

        match self.limiter.check_key(&client) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let retry_after = not_until
                    .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                    .as_secs()
                    .max(1);
                tracing::debug!("Rate limited {} for {}s", client, retry_after);
                Err(AppError::RateLimited { retry_after })
            }
        }
    }

    /// Forget clients whose budget has fully refilled
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently holding limiter state
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Prune idle clients every `period` until the runtime shuts down
    pub fn spawn_pruner(&self, period: Duration) -> JoinHandle<()> {
        let gate = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                gate.prune();
                tracing::debug!("Rate limiter tracks {} clients", gate.tracked_clients());
            }
        })
    }
}

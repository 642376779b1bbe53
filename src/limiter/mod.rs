//! Distributed rate limiting: fixed-window counters over a pluggable store.
//!
//! The store exposes one primitive, an atomic increment-with-expiry; all
//! policy (limits, windows, key shape) lives on this side. Store failures are
//! fail-closed: an unreachable limiter blocks the request instead of silently
//! disabling rate limiting.

mod memory;
mod redis;

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

use crate::error::GateError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Whether the caller's source address is folded into the counter key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitType {
    Default,
    Ip,
}

/// Per-guarded-operation configuration, declared at the call site.
#[derive(Clone, Debug)]
pub struct RatePolicy {
    /// Key template prefix for the counter.
    pub key: String,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Max requests admitted per window.
    pub max_requests: u64,
    pub limit_type: LimitType,
}

impl RatePolicy {
    pub fn new(key: impl Into<String>, window_secs: u64, max_requests: u64) -> Self {
        RatePolicy {
            key: key.into(),
            window_secs,
            max_requests,
            limit_type: LimitType::Default,
        }
    }

    /// Same policy, but counted per source address.
    pub fn per_ip(mut self) -> Self {
        self.limit_type = LimitType::Ip;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Derive the counter key for one call: template, then the source address
/// when the policy is IP-scoped, then a stable identifier of the guarded
/// operation. Pure so key composition is testable on its own.
pub fn rate_key(policy: &RatePolicy, client_ip: Option<&str>, operation: &str) -> String {
    let mut key = policy.key.clone();
    if policy.limit_type == LimitType::Ip {
        key.push_str(client_ip.unwrap_or("unknown"));
        key.push('-');
    }
    key.push_str(operation);
    key
}

/// Errors from the counter store itself, distinct from an over-limit result.
#[derive(Error, Debug)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Contract the gateway requires from the shared counter store: one atomic
/// check-and-increment. On first hit for a key the counter is created as 1
/// with `window` expiry; later hits within the window increment and return
/// the new count in the same indivisible operation; an expired key starts a
/// fresh window at 1.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterError>;
}

/// Outcome of a rate admission check, carrying the post-increment count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed(u64),
    Denied(u64),
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed(_))
    }

    pub fn count(&self) -> u64 {
        match *self {
            RateDecision::Allowed(n) | RateDecision::Denied(n) => n,
        }
    }
}

/// Bounded-window admission over a counter store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        RateLimiter { store, timeout }
    }

    /// Atomically count this call against `key` and decide admission: denied
    /// when the post-increment count exceeds `limit`. Store errors and
    /// timeouts block the request (fail-closed).
    pub async fn check(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<RateDecision, GateError> {
        let count = tokio::time::timeout(self.timeout, self.store.increment(key, window))
            .await
            .map_err(|_| GateError::RateLimiterUnavailable("counter store timed out".into()))?
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "rate limiter failing closed");
                GateError::RateLimiterUnavailable(e.to_string())
            })?;
        if count > limit {
            tracing::warn!(key = %key, count, limit, "request denied by rate limit");
            Ok(RateDecision::Denied(count))
        } else {
            tracing::debug!(key = %key, count, limit, "request admitted by rate limit");
            Ok(RateDecision::Allowed(count))
        }
    }

    /// Derive the key for `policy` and check it in one step.
    pub async fn check_policy(
        &self,
        policy: &RatePolicy,
        client_ip: Option<&str>,
        operation: &str,
    ) -> Result<RateDecision, GateError> {
        let key = rate_key(policy, client_ip, operation);
        self.check(&key, policy.max_requests, policy.window()).await
    }
}

//! Admission controller (§4.5): tiered, principal-aware rate limiting in
//! front of every route. Generalizes the teacher's single flat
//! `RateLimiter` (one sliding window per action name) into four tiers
//! (upload/download/api/auth), each checked against both a per-identity
//! limit (anonymous-by-IP or authenticated-by-user) and a per-IP ceiling
//! that catches an authenticated attacker cycling through many accounts
//! from one address.
//!
//! The counter store is pluggable (`CounterStore`) so a single process can
//! run with purely local counters, or share counts across replicas via
//! Redis. If the shared store becomes unreachable the controller degrades
//! to local counters and logs a warning — it never fails open silently
//! (§4.5).

use crate::config::{RateLimitConfig, TierLimit};
use crate::errors::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Upload,
    Download,
    Api,
    Auth,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Upload => "upload",
            Tier::Download => "download",
            Tier::Api => "api",
            Tier::Auth => "auth",
        };
        f.write_str(s)
    }
}

/// Who the request is charged to. Resolved by the session guard before the
/// admission controller is consulted (§4.5, §5.3).
#[derive(Debug, Clone)]
pub enum Principal {
    User(String),
    Anonymous,
}

#[derive(Debug, Clone, Copy)]
pub struct CounterResult {
    pub count: usize,
    pub retry_after_secs: u64,
}

/// A shared or local counter backend for the sliding-window check. `key`
/// already encodes tier + identity; the store only needs to count recent
/// increments within `window` and report enough to compute `Retry-After`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr_and_count(
        &self,
        key: &str,
        window: Duration,
        sub_buckets: usize,
    ) -> Result<CounterResult, AppError>;
}

/// Exact sliding-log counter, generalized from the teacher's
/// `RateLimiter` (`Vec<Instant>` per key, retained against the window).
/// Immune to the burst-then-idle gaming that a fixed window allows, so it
/// ignores `sub_buckets` — a real sliding log needs no approximation.
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr_and_count(
        &self,
        key: &str,
        window: Duration,
        _sub_buckets: usize,
    ) -> Result<CounterResult, AppError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let bucket = entries.entry(key.to_string()).or_default();
        bucket.retain(|t| now.duration_since(*t) < window);
        bucket.push(now);

        let retry_after_secs = match bucket.iter().min() {
            Some(oldest) => {
                let elapsed = now.duration_since(*oldest);
                if elapsed < window { (window - elapsed).as_secs() + 1 } else { 1 }
            }
            None => 1,
        };

        Ok(CounterResult { count: bucket.len(), retry_after_secs })
    }
}

/// Shared counter backend for multi-replica deployments. Approximates a
/// sliding window with `sub_buckets` fixed-size counters per window,
/// each an `INCR` against a key with its own `EXPIRE` — the standard
/// Redis rate-limiter pattern, avoiding a sorted-set entry per request.
pub struct RedisCounterStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            tracing::error!(error = %e, "invalid redis url");
            AppError::Internal
        })?;
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to redis");
            AppError::Unavailable
        })?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_and_count(
        &self,
        key: &str,
        window: Duration,
        sub_buckets: usize,
    ) -> Result<CounterResult, AppError> {
        use redis::AsyncCommands;

        let sub_buckets = sub_buckets.max(1);
        let slot_secs = (window.as_secs() / sub_buckets as u64).max(1);
        let now_secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let current_slot = now_secs / slot_secs;

        let mut conn = self.manager.clone();
        let slot_key = format!("rl:{key}:{current_slot}");
        let ttl_secs = window.as_secs() * 2;

        let _: () = conn.incr(&slot_key, 1).await.map_err(|e| {
            tracing::warn!(error = %e, key, "redis incr failed");
            AppError::Unavailable
        })?;
        let _: () = conn.expire(&slot_key, ttl_secs as i64).await.map_err(|e| {
            tracing::warn!(error = %e, key, "redis expire failed");
            AppError::Unavailable
        })?;

        let slots_in_window = (window.as_secs() / slot_secs).max(1);
        let mut total: usize = 0;
        for i in 0..slots_in_window {
            let slot = current_slot.saturating_sub(i);
            let k = format!("rl:{key}:{slot}");
            let v: Option<usize> = conn.get(&k).await.unwrap_or(None);
            total += v.unwrap_or(0);
        }

        Ok(CounterResult { count: total, retry_after_secs: slot_secs })
    }
}

/// Wraps a primary shared store with a local fallback. A primary failure
/// is logged once per call and the request is charged against the local
/// counter instead — degraded accuracy across replicas, never an
/// unbounded request (§4.5: "never fail open").
pub struct DegradingCounterStore {
    primary: Box<dyn CounterStore>,
    fallback: InMemoryCounterStore,
}

impl DegradingCounterStore {
    pub fn new(primary: Box<dyn CounterStore>) -> Self {
        Self { primary, fallback: InMemoryCounterStore::new() }
    }
}

#[async_trait]
impl CounterStore for DegradingCounterStore {
    async fn incr_and_count(
        &self,
        key: &str,
        window: Duration,
        sub_buckets: usize,
    ) -> Result<CounterResult, AppError> {
        match self.primary.incr_and_count(key, window, sub_buckets).await {
            Ok(r) => Ok(r),
            Err(e) => {
                tracing::warn!(error = %e, key, "shared rate-limit store unavailable, degrading to local counters");
                self.fallback.incr_and_count(key, window, sub_buckets).await
            }
        }
    }
}

pub struct AdmissionController {
    store: Box<dyn CounterStore>,
    config: RateLimitConfig,
}

impl AdmissionController {
    pub fn new(store: Box<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    fn tier_limit(&self, tier: Tier) -> TierLimit {
        match tier {
            Tier::Upload => self.config.upload,
            Tier::Download => self.config.download,
            Tier::Api => self.config.api,
            Tier::Auth => self.config.auth,
        }
    }

    /// Checks the per-identity limit, then the per-IP ceiling. Either one
    /// tripping rejects the request (§4.5).
    pub async fn check(&self, tier: Tier, principal: &Principal, ip: &str) -> Result<(), AppError> {
        let limit = self.tier_limit(tier);

        let (identity_key, identity_max) = match principal {
            Principal::User(user_id) => (format!("{tier}:user:{user_id}"), limit.auth_per_user),
            Principal::Anonymous => (format!("{tier}:ip:{ip}"), limit.anon_per_ip),
        };

        let identity_result = self.store.incr_and_count(&identity_key, limit.window, self.config.sub_buckets).await?;
        if identity_result.count > identity_max {
            return Err(AppError::RateLimited {
                retry_after_secs: identity_result.retry_after_secs,
                limit: identity_max,
            });
        }

        // Per-IP ceiling guards against an attacker spreading requests across
        // many user accounts from one address (§4.5).
        if matches!(principal, Principal::User(_)) {
            let ip_key = format!("{tier}:ipceiling:{ip}");
            let ip_result = self.store.incr_and_count(&ip_key, limit.window, self.config.sub_buckets).await?;
            if ip_result.count > limit.ip_ceiling {
                return Err(AppError::RateLimited {
                    retry_after_secs: ip_result.retry_after_secs,
                    limit: limit.ip_ceiling,
                });
            }
        }

        Ok(())
    }
}
